//! JSON schema for serialized audit reports.

/// JSON Schema for report.json.
pub const REPORT_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "$id": "https://hostaudit.dev/schemas/report.json",
  "title": "hostaudit Audit Report",
  "type": "object",
  "required": ["schema_version", "run_id", "host", "os_type", "started_at", "completed_at", "probes"],
  "properties": {
    "schema_version": {
      "type": "string",
      "pattern": "^\\d+\\.\\d+\\.\\d+$"
    },
    "run_id": { "type": "string" },
    "host": { "type": "string", "minLength": 1 },
    "os_type": { "type": "string", "enum": ["linux", "windows"] },
    "started_at": { "type": "string" },
    "completed_at": { "type": "string" },
    "probes": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["name", "result"],
        "properties": {
          "name": { "type": "string", "minLength": 1 },
          "result": { "$ref": "#/definitions/result" }
        }
      }
    }
  },
  "definitions": {
    "result": {
      "type": "object",
      "required": ["status", "started_at", "duration_ms", "raw_output", "stderr", "output_digest", "records", "dropped_rows", "diagnostics"],
      "properties": {
        "status": {
          "type": "string",
          "enum": ["ok", "timed_out", "not_found", "execution_failed", "parse_failed"]
        },
        "started_at": { "type": "string" },
        "duration_ms": { "type": "integer", "minimum": 0 },
        "exit_code": { "type": ["integer", "null"] },
        "raw_output": { "type": "string" },
        "stderr": { "type": "string" },
        "output_digest": { "type": "string", "pattern": "^sha256:[0-9a-f]{64}$" },
        "records": {
          "type": "array",
          "items": { "$ref": "#/definitions/record" }
        },
        "dropped_rows": { "type": "integer", "minimum": 0 },
        "diagnostics": { "type": "array", "items": { "type": "string" } },
        "failure": { "type": ["string", "null"] }
      }
    },
    "record": {
      "type": "object",
      "required": ["type"],
      "properties": {
        "type": {
          "type": "string",
          "enum": ["profile_settings", "table_row", "security_product_state", "key_value_block"]
        },
        "profile_name": { "type": "string" },
        "settings": { "type": "object", "additionalProperties": { "type": "string" } },
        "columns": { "type": "array", "items": { "type": "string" } },
        "column_names": { "type": "array", "items": { "type": "string" } },
        "display_name": { "type": "string" },
        "product_type": { "type": "string" },
        "running_status": { "type": "string" },
        "signature_status": { "type": "string" },
        "raw_state_value": { "type": "integer", "minimum": 0, "maximum": 16777215 },
        "mapping": { "type": "object", "additionalProperties": { "type": "string" } }
      }
    }
  }
}"##;

/// Get the report schema as a parsed JSON value.
pub fn report_schema() -> serde_json::Value {
    serde_json::from_str(REPORT_SCHEMA).expect("Invalid report schema")
}
