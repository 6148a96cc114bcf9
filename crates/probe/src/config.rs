//! YAML run configuration.

use crate::catalog;
use crate::orchestrator::{OrchestratorConfig, DEFAULT_WORKERS};
use hostaudit_common::os::local_hostname;
use hostaudit_common::OsType;
use hostaudit_report_schema::{validate_specs, ConfigError, ProbeConfig, ProbeSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Contents of a configuration file. Every field is optional; an empty
/// `probes` list selects the built-in catalog for the OS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsType>,
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            deadline_secs: None,
            host: None,
            os: None,
            probes: Vec::new(),
        }
    }
}

impl AuditConfig {
    pub fn os_type(&self) -> OsType {
        self.os.unwrap_or_else(OsType::current)
    }

    /// Validated probe list, in file order.
    pub fn specs(&self) -> Result<Vec<ProbeSpec>, ConfigError> {
        if self.probes.is_empty() {
            return catalog::builtin_probes(self.os_type());
        }
        let specs = self
            .probes
            .iter()
            .cloned()
            .map(ProbeSpec::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        validate_specs(&specs)?;
        Ok(specs)
    }

    /// Worker count and run deadline, checked.
    fn run_limits(&self) -> Result<(usize, Option<Duration>), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let deadline = match self.deadline_secs {
            None => None,
            Some(secs) => Some(
                Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or(ConfigError::InvalidDeadline(secs))?,
            ),
        };
        Ok((self.workers, deadline))
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        self.orchestrator_config_with(local_hostname)
    }

    /// Build the run settings, calling `resolve_host` only when the file
    /// names no host and the limits are valid.
    fn orchestrator_config_with(
        &self,
        resolve_host: impl FnOnce() -> String,
    ) -> Result<OrchestratorConfig, ConfigError> {
        let (workers, deadline) = self.run_limits()?;
        Ok(OrchestratorConfig {
            workers,
            deadline,
            host: self.host.clone().unwrap_or_else(resolve_host),
            os_type: self.os_type(),
        })
    }

    /// Check everything a run would check before starting its first probe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run_limits()?;
        self.specs()?;
        Ok(())
    }
}

/// Parse and validate configuration text.
pub fn parse_config(text: &str) -> Result<AuditConfig, ConfigFileError> {
    let config: AuditConfig = if text.trim().is_empty() {
        AuditConfig::default()
    } else {
        serde_yaml::from_str(text)?
    };
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<AuditConfig, ConfigFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostaudit_report_schema::Grammar;

    const SAMPLE: &str = r#"
workers: 2
deadline_secs: 600
host: WS-01
os: windows
probes:
  - name: firewall_profiles
    command: netsh
    args: [advfirewall, show, allprofiles]
    timeout_secs: 30
    grammar: { kind: profile_block }
  - name: password_policy
    command: net
    args: [accounts]
    grammar: { kind: key_value, separator: ":" }
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        let specs = config.specs().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].timeout(), Duration::from_secs(30));
        assert_eq!(specs[1].timeout(), Duration::from_secs(60));
        assert_eq!(specs[1].grammar(), &Grammar::key_value(':'));

        let orchestrator = config.orchestrator_config().unwrap();
        assert_eq!(orchestrator.workers, 2);
        assert_eq!(orchestrator.deadline, Some(Duration::from_secs(600)));
        assert_eq!(orchestrator.host, "WS-01");
        assert_eq!(orchestrator.os_type, OsType::Windows);
    }

    #[test]
    fn test_empty_probe_list_uses_catalog() {
        let config = parse_config("os: linux\n").unwrap();
        let specs = config.specs().unwrap();
        assert_eq!(specs[0].name(), "accounts");
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_host_lookup_waits_for_run_settings() {
        let config = parse_config("os: linux\n").unwrap();
        let mut lookups = 0;
        let built = config
            .orchestrator_config_with(|| {
                lookups += 1;
                "resolved-host".to_string()
            })
            .unwrap();
        assert_eq!(lookups, 1);
        assert_eq!(built.host, "resolved-host");

        let named = parse_config("host: WS-01\nos: linux\n").unwrap();
        let built = named
            .orchestrator_config_with(|| panic!("host already configured"))
            .unwrap();
        assert_eq!(built.host, "WS-01");

        let no_workers = AuditConfig {
            workers: 0,
            ..AuditConfig::default()
        };
        assert!(no_workers.validate().is_err());
        assert!(matches!(
            no_workers.orchestrator_config_with(|| panic!("limits are checked first")),
            Err(ConfigError::NoWorkers)
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let zero_timeout = "probes:\n  - name: a\n    command: x\n    timeout_secs: 0\n    grammar: { kind: raw }\n";
        assert!(matches!(
            parse_config(zero_timeout),
            Err(ConfigFileError::Invalid(ConfigError::InvalidTimeout { .. }))
        ));

        let duplicate = "probes:\n  - { name: a, command: x, grammar: { kind: raw } }\n  - { name: a, command: y, grammar: { kind: raw } }\n";
        assert!(matches!(
            parse_config(duplicate),
            Err(ConfigFileError::Invalid(ConfigError::DuplicateName(_)))
        ));

        assert!(matches!(
            parse_config("workers: 0\nos: linux\n"),
            Err(ConfigFileError::Invalid(ConfigError::NoWorkers))
        ));
        assert!(matches!(
            parse_config("deadline_secs: -5\nos: linux\n"),
            Err(ConfigFileError::Invalid(ConfigError::InvalidDeadline(_)))
        ));
        assert!(matches!(
            parse_config("workerz: 3\n"),
            Err(ConfigFileError::Yaml(_))
        ));
    }
}
