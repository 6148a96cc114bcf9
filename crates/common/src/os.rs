//! Operating system type and local host identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::str::FromStr;

/// Operating system family the probe catalog is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Linux,
    Windows,
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsType::Linux => write!(f, "linux"),
            OsType::Windows => write!(f, "windows"),
        }
    }
}

impl FromStr for OsType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(OsType::Linux),
            "windows" => Ok(OsType::Windows),
            _ => Err(crate::Error::UnsupportedOs(s.to_string())),
        }
    }
}

impl OsType {
    /// The OS this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsType::Windows
        } else {
            OsType::Linux
        }
    }
}

/// Best-effort host identifier for the report header.
///
/// Checks `COMPUTERNAME`/`HOSTNAME`, then asks the `hostname` utility, and
/// falls back to `localhost`.
pub fn local_hostname() -> String {
    for var in ["COMPUTERNAME", "HOSTNAME"] {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    match Command::new("hostname").output() {
        Ok(output) if output.status.success() => {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("hostname utility unavailable: {}", e),
    }

    "localhost".to_string()
}
