//! Common error type for hostaudit.

use thiserror::Error;

/// Errors that abort a whole command, as opposed to probe-local outcomes
/// which are recorded in the report.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported OS: {0}")]
    UnsupportedOs(String),

    #[error("Invalid report: {0}")]
    InvalidReport(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
