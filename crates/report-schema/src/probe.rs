//! Probe definitions: which command to run and how to read its output.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Configuration problems. These are the only run-level fatal conditions and
/// are raised before any probe executes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("probe name must not be empty")]
    EmptyName,

    #[error("probe '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("probe '{name}' has non-positive timeout {timeout_secs}s")]
    InvalidTimeout { name: String, timeout_secs: f64 },

    #[error("duplicate probe name '{0}'")]
    DuplicateName(String),

    #[error("workers must be at least 1")]
    NoWorkers,

    #[error("run deadline must be positive, got {0}s")]
    InvalidDeadline(f64),
}

fn default_min_fields() -> usize {
    2
}

fn default_delimiter() -> char {
    ','
}

fn default_key_value_separator() -> char {
    '='
}

fn default_true() -> bool {
    true
}

/// Output grammar of a probe, selecting the parser applied to its stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Grammar {
    /// `<Name> Profile` headers followed by `key: value` settings.
    ProfileBlock,
    /// Whitespace-aligned columns separated by two or more spaces.
    Table {
        #[serde(default)]
        columns: Vec<String>,
        /// First row carries the column names.
        #[serde(default)]
        header: bool,
        #[serde(default = "default_min_fields")]
        min_fields: usize,
    },
    /// Character-delimited records (CSV and friends).
    Delimited {
        #[serde(default = "default_delimiter")]
        delimiter: char,
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default = "default_true")]
        header: bool,
    },
    /// Blank-line separated paragraphs of `key<sep>value` lines.
    KeyValue {
        #[serde(default = "default_key_value_separator")]
        separator: char,
    },
    /// Key=value paragraphs carrying `displayName` and a packed `productState`.
    SecurityProduct,
    /// Kept as captured, no records.
    Raw,
}

impl Grammar {
    /// Table with configured column names and no header row.
    pub fn table(columns: &[&str]) -> Self {
        Grammar::Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            header: false,
            min_fields: default_min_fields(),
        }
    }

    /// Table whose first row names the columns.
    pub fn table_with_header(min_fields: usize) -> Self {
        Grammar::Table {
            columns: Vec::new(),
            header: true,
            min_fields,
        }
    }

    /// Comma-separated records with a header row.
    pub fn csv() -> Self {
        Grammar::Delimited {
            delimiter: default_delimiter(),
            columns: Vec::new(),
            header: true,
        }
    }

    pub fn key_value(separator: char) -> Self {
        Grammar::KeyValue { separator }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Grammar::ProfileBlock => "profile_block",
            Grammar::Table { .. } => "table",
            Grammar::Delimited { .. } => "delimited",
            Grammar::KeyValue { .. } => "key_value",
            Grammar::SecurityProduct => "security_product",
            Grammar::Raw => "raw",
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_timeout_secs() -> f64 {
    60.0
}

/// Serialized form of a probe, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub grammar: Grammar,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

/// A validated, immutable probe definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProbeConfig", into = "ProbeConfig")]
pub struct ProbeSpec {
    name: String,
    command: String,
    args: Vec<String>,
    grammar: Grammar,
    timeout: Duration,
}

impl ProbeSpec {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        args: &[&str],
        grammar: Grammar,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        ProbeSpec::try_from(ProbeConfig {
            name: name.into(),
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            grammar,
            timeout_secs: timeout.as_secs_f64(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Command line for logs.
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

impl TryFrom<ProbeConfig> for ProbeSpec {
    type Error = ConfigError;

    fn try_from(config: ProbeConfig) -> Result<Self, Self::Error> {
        let name = config.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if config.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand(name));
        }

        let invalid = || ConfigError::InvalidTimeout {
            name: name.clone(),
            timeout_secs: config.timeout_secs,
        };
        // Negative and NaN values fail the conversion itself.
        let timeout = Duration::try_from_secs_f64(config.timeout_secs).map_err(|_| invalid())?;
        if timeout.is_zero() {
            return Err(invalid());
        }

        Ok(ProbeSpec {
            name,
            command: config.command,
            args: config.args,
            grammar: config.grammar,
            timeout,
        })
    }
}

impl From<ProbeSpec> for ProbeConfig {
    fn from(spec: ProbeSpec) -> Self {
        ProbeConfig {
            name: spec.name,
            command: spec.command,
            args: spec.args,
            grammar: spec.grammar,
            timeout_secs: spec.timeout.as_secs_f64(),
        }
    }
}

/// Check run-wide constraints on an ordered probe list.
pub fn validate_specs(specs: &[ProbeSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name()) {
            return Err(ConfigError::DuplicateName(spec.name().to_string()));
        }
    }
    Ok(())
}
