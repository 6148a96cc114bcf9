//! Report validation utilities.

use crate::report::AuditReport;
use crate::result::ProbeStatus;
use crate::schema;
use hostaudit_common::hash;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error type.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Duplicate probe entry: {0}")]
    DuplicateProbe(String),

    #[error("Digest mismatch for probe {probe}: expected {expected}, got {actual}")]
    DigestMismatch {
        probe: String,
        expected: String,
        actual: String,
    },

    #[error("Probe {probe} has status {status} but carries {count} records")]
    RecordsOnFailedProbe {
        probe: String,
        status: ProbeStatus,
        count: usize,
    },

    #[error("Probe {0} failed without a failure reason")]
    MissingFailureReason(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result of report validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a serialized report against the JSON schema.
pub fn validate_report_value(report: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = ValidationResult::new();

    let schema_value = schema::report_schema();
    let compiled = JSONSchema::compile(&schema_value)
        .map_err(|e| ValidationError::SchemaError(e.to_string()))?;

    if let Err(errors) = compiled.validate(report) {
        for error in errors {
            result.add_error(ValidationError::SchemaError(format!(
                "{} at {}",
                error, error.instance_path
            )));
        }
    }

    Ok(result)
}

/// Validate a report: schema conformance plus the invariants the schema
/// cannot express.
pub fn validate_report(report: &AuditReport) -> Result<ValidationResult, ValidationError> {
    let mut result = ValidationResult::new();

    let value = serde_json::to_value(report)?;
    let schema_result = validate_report_value(&value)?;
    for error in schema_result.errors {
        result.add_error(error);
    }

    let mut seen = HashSet::new();
    for entry in &report.probes {
        if !seen.insert(entry.name.as_str()) {
            result.add_error(ValidationError::DuplicateProbe(entry.name.clone()));
        }

        let probe = &entry.result;
        let actual = hash::output_digest(&probe.raw_output);
        if actual != probe.output_digest {
            result.add_error(ValidationError::DigestMismatch {
                probe: entry.name.clone(),
                expected: probe.output_digest.clone(),
                actual,
            });
        }

        if probe.status.is_ok() {
            if probe.records.is_empty() && !probe.raw_output.trim().is_empty() {
                result.add_warning(format!("{}: output captured but no records", entry.name));
            }
            continue;
        }

        if !probe.records.is_empty() {
            result.add_error(ValidationError::RecordsOnFailedProbe {
                probe: entry.name.clone(),
                status: probe.status,
                count: probe.records.len(),
            });
        }
        if probe.failure.is_none() {
            result.add_error(ValidationError::MissingFailureReason(entry.name.clone()));
        }
    }

    if report.probes.is_empty() {
        result.add_warning("report contains no probes".to_string());
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NormalizedRecord;
    use crate::report::ProbeEntry;
    use crate::result::{Capture, ProbeResult};
    use hostaudit_common::{OsType, Timestamp};
    use std::collections::BTreeMap;

    fn report_with(result: ProbeResult) -> AuditReport {
        AuditReport::new(
            "WS-01",
            OsType::Windows,
            Timestamp::now(),
            vec![ProbeEntry {
                name: "password_policy".to_string(),
                result,
            }],
        )
    }

    fn ok_result() -> ProbeResult {
        let capture = Capture {
            stdout: "Lockout threshold: Never\n".to_string(),
            exit_code: Some(0),
            ..Capture::default()
        };
        ProbeResult::from_capture(ProbeStatus::Ok, capture, None).normalized(
            vec![NormalizedRecord::KeyValueBlock {
                mapping: BTreeMap::from([("Lockout threshold".to_string(), "Never".to_string())]),
            }],
            0,
            Vec::new(),
        )
    }

    #[test]
    fn test_valid_report() {
        let result = validate_report(&report_with(ok_result())).unwrap();
        assert!(result.valid, "Errors: {:?}", result.errors);
    }

    #[test]
    fn test_tampered_raw_output_detected() {
        let mut probe = ok_result();
        probe.raw_output.push_str("edited later\n");
        let result = validate_report(&report_with(probe)).unwrap();
        assert!(!result.valid);
        assert!(matches!(result.errors[0], ValidationError::DigestMismatch { .. }));
    }

    #[test]
    fn test_failed_probe_must_not_carry_records() {
        let mut probe = ok_result();
        probe.status = ProbeStatus::TimedOut;
        probe.failure = Some("timed out after 30s".to_string());
        let result = validate_report(&report_with(probe)).unwrap();
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::RecordsOnFailedProbe { count: 1, .. })));
    }

    #[test]
    fn test_schema_rejects_missing_fields() {
        let value = serde_json::json!({ "schema_version": "1.0.0" });
        let result = validate_report_value(&value).unwrap();
        assert!(!result.valid);
    }
}
