//! hostaudit probe engine: runs diagnostic commands, normalizes their
//! output and assembles the audit report.

pub mod catalog;
pub mod config;
pub mod decoder;
pub mod orchestrator;
pub mod parsers;
pub mod runner;
pub mod sink;

pub use config::{load_config, parse_config, AuditConfig, ConfigFileError};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use runner::{ProcessRunner, Runner};
pub use sink::{CollectingSink, JsonFileSink, JsonlSink, ReportSink, TextSummarySink};
