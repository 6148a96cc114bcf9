//! Normalized records produced by the format parsers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One typed record extracted from a probe's raw output.
///
/// Maps are ordered so that two runs over unchanged state serialize to the
/// same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedRecord {
    ProfileSettings {
        profile_name: String,
        settings: BTreeMap<String, String>,
    },
    TableRow {
        columns: Vec<String>,
        column_names: Vec<String>,
    },
    SecurityProductState {
        display_name: String,
        product_type: String,
        running_status: String,
        signature_status: String,
        raw_state_value: u32,
    },
    KeyValueBlock {
        mapping: BTreeMap<String, String>,
    },
}

impl NormalizedRecord {
    /// Look up a field by name, whatever the record variant.
    ///
    /// Table rows are addressed by column name; rows with more fields than
    /// names cannot reach the extra fields this way.
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            NormalizedRecord::ProfileSettings { settings, .. } => {
                settings.get(key).map(String::as_str)
            }
            NormalizedRecord::TableRow {
                columns,
                column_names,
            } => column_names
                .iter()
                .position(|name| name == key)
                .and_then(|idx| columns.get(idx))
                .map(String::as_str),
            NormalizedRecord::SecurityProductState {
                display_name,
                product_type,
                running_status,
                signature_status,
                ..
            } => match key {
                "display_name" => Some(display_name),
                "product_type" => Some(product_type),
                "running_status" => Some(running_status),
                "signature_status" => Some(signature_status),
                _ => None,
            },
            NormalizedRecord::KeyValueBlock { mapping } => mapping.get(key).map(String::as_str),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedRecord::ProfileSettings { .. } => "profile_settings",
            NormalizedRecord::TableRow { .. } => "table_row",
            NormalizedRecord::SecurityProductState { .. } => "security_product_state",
            NormalizedRecord::KeyValueBlock { .. } => "key_value_block",
        }
    }
}
