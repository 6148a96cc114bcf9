//! Outcome of running a single probe.

use crate::record::NormalizedRecord;
use hostaudit_common::{hash, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a probe ended. Every variant is probe-local; none aborts a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ok,
    /// Exceeded its own timeout or the run deadline.
    TimedOut,
    /// The diagnostic utility is not installed on this host.
    NotFound,
    /// The utility ran (or failed to launch) without producing usable output.
    ExecutionFailed,
    /// Output did not match the expected grammar; raw text is retained.
    ParseFailed,
}

impl ProbeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeStatus::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Ok => "ok",
            ProbeStatus::TimedOut => "timed_out",
            ProbeStatus::NotFound => "not_found",
            ProbeStatus::ExecutionFailed => "execution_failed",
            ProbeStatus::ParseFailed => "parse_failed",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the runner captured from one process.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub started_at: Timestamp,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Result of one probe.
///
/// Results are replaced, not edited: normalization consumes the runner's
/// result and returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub started_at: Timestamp,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    /// Captured stdout, kept even when parsing fails.
    pub raw_output: String,
    pub stderr: String,
    /// `sha256:<hex>` of `raw_output`.
    pub output_digest: String,
    pub records: Vec<NormalizedRecord>,
    /// Input rows the parser rejected.
    pub dropped_rows: usize,
    /// Non-fatal notes (nonzero exit with usable stdout, local decode errors).
    pub diagnostics: Vec<String>,
    pub failure: Option<String>,
}

impl ProbeResult {
    pub fn from_capture(status: ProbeStatus, capture: Capture, failure: Option<String>) -> Self {
        let output_digest = hash::output_digest(&capture.stdout);
        Self {
            status,
            started_at: capture.started_at,
            duration_ms: capture.duration_ms,
            exit_code: capture.exit_code,
            raw_output: capture.stdout,
            stderr: capture.stderr,
            output_digest,
            records: Vec::new(),
            dropped_rows: 0,
            diagnostics: Vec::new(),
            failure,
        }
    }

    /// A probe that produced nothing, e.g. because its utility is missing.
    pub fn without_output(status: ProbeStatus, started_at: Timestamp, failure: impl Into<String>) -> Self {
        Self::from_capture(
            status,
            Capture {
                started_at,
                ..Capture::default()
            },
            Some(failure.into()),
        )
    }

    pub fn with_diagnostic(mut self, note: impl Into<String>) -> Self {
        self.diagnostics.push(note.into());
        self
    }

    /// Attach parsed records to an `Ok` result.
    pub fn normalized(
        mut self,
        records: Vec<NormalizedRecord>,
        dropped_rows: usize,
        diagnostics: Vec<String>,
    ) -> Self {
        self.records = records;
        self.dropped_rows = dropped_rows;
        self.diagnostics.extend(diagnostics);
        self
    }

    /// Turn an `Ok` capture into `ParseFailed`, keeping the raw text.
    pub fn parse_failed(mut self, reason: impl Into<String>) -> Self {
        self.status = ProbeStatus::ParseFailed;
        self.records.clear();
        self.failure = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(stdout: &str) -> Capture {
        Capture {
            stdout: stdout.to_string(),
            exit_code: Some(0),
            ..Capture::default()
        }
    }

    #[test]
    fn test_parse_failed_keeps_raw_text() {
        let result = ProbeResult::from_capture(ProbeStatus::Ok, capture("garbage\n"), None)
            .parse_failed("no profile sections found");
        assert_eq!(result.status, ProbeStatus::ParseFailed);
        assert_eq!(result.raw_output, "garbage\n");
        assert_eq!(result.failure.as_deref(), Some("no profile sections found"));
        assert!(result.records.is_empty());
    }

    #[test]
    fn test_digest_matches_raw_output() {
        let result = ProbeResult::from_capture(ProbeStatus::Ok, capture("hello world"), None);
        assert_eq!(
            result.output_digest,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ProbeStatus::ExecutionFailed).unwrap();
        assert_eq!(json, "\"execution_failed\"");
        assert_eq!(ProbeStatus::TimedOut.to_string(), "timed_out");
    }
}
