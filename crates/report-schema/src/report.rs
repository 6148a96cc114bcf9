//! The aggregated audit report handed to sinks.

use crate::record::NormalizedRecord;
use crate::result::{ProbeResult, ProbeStatus};
use hostaudit_common::{OsType, Timestamp};
use serde::{Deserialize, Serialize};

pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// A probe's name paired with its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeEntry {
    pub name: String,
    pub result: ProbeResult,
}

/// One full run. Probe order equals configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub schema_version: String,
    pub run_id: String,
    pub host: String,
    pub os_type: OsType,
    pub started_at: Timestamp,
    pub completed_at: Timestamp,
    pub probes: Vec<ProbeEntry>,
}

/// Count of probes per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub ok: usize,
    pub timed_out: usize,
    pub not_found: usize,
    pub execution_failed: usize,
    pub parse_failed: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.ok + self.failed()
    }

    /// Probes whose outcome could not be determined.
    pub fn failed(&self) -> usize {
        self.timed_out + self.not_found + self.execution_failed + self.parse_failed
    }
}

impl AuditReport {
    pub fn new(
        host: impl Into<String>,
        os_type: OsType,
        started_at: Timestamp,
        probes: Vec<ProbeEntry>,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            host: host.into(),
            os_type,
            started_at,
            completed_at: Timestamp::now(),
            probes,
        }
    }

    pub fn entry(&self, name: &str) -> Option<&ProbeEntry> {
        self.probes.iter().find(|e| e.name == name)
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for entry in &self.probes {
            let slot = match entry.result.status {
                ProbeStatus::Ok => &mut summary.ok,
                ProbeStatus::TimedOut => &mut summary.timed_out,
                ProbeStatus::NotFound => &mut summary.not_found,
                ProbeStatus::ExecutionFailed => &mut summary.execution_failed,
                ProbeStatus::ParseFailed => &mut summary.parse_failed,
            };
            *slot += 1;
        }
        summary
    }

    /// Records per probe, without timing or run identity.
    pub fn records(&self) -> Vec<(&str, &[NormalizedRecord])> {
        self.probes
            .iter()
            .map(|e| (e.name.as_str(), e.result.records.as_slice()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Capture;

    fn entry(name: &str, status: ProbeStatus) -> ProbeEntry {
        ProbeEntry {
            name: name.to_string(),
            result: ProbeResult::from_capture(status, Capture::default(), None),
        }
    }

    #[test]
    fn test_summary_counts_each_status() {
        let report = AuditReport::new(
            "WS-01",
            OsType::Windows,
            Timestamp::now(),
            vec![
                entry("firewall_profiles", ProbeStatus::Ok),
                entry("antivirus_products", ProbeStatus::NotFound),
                entry("installed_apps", ProbeStatus::TimedOut),
                entry("local_users", ProbeStatus::Ok),
            ],
        );
        let summary = report.summary();
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.total(), 4);
        assert_eq!(
            report.probe_names(),
            vec!["firewall_profiles", "antivirus_products", "installed_apps", "local_users"]
        );
        assert!(report.entry("antivirus_products").is_some());
    }
}
