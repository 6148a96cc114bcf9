//! Report model for hostaudit.
//!
//! Defines what a probe is, what running one yields, the normalized records
//! parsers produce, and the audit report assembled from a run.

pub mod probe;
pub mod record;
pub mod report;
pub mod result;
pub mod schema;
pub mod validation;

pub use probe::{validate_specs, ConfigError, Grammar, ProbeConfig, ProbeSpec};
pub use record::NormalizedRecord;
pub use report::{AuditReport, ProbeEntry, StatusSummary};
pub use result::{Capture, ProbeResult, ProbeStatus};
pub use validation::validate_report;
