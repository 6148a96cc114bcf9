//! Registered security products (`displayName` / `productState` blocks).

use super::key_value::split_blocks;
use super::{ParsedOutcome, ParsedRecords};
use crate::decoder;
use hostaudit_report_schema::NormalizedRecord;
use std::collections::BTreeMap;

const NAME_KEY: &str = "displayName";
const STATE_KEY: &str = "productState";

fn lookup<'a>(block: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    block
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Parse `key=value` blocks into decoded product states.
///
/// A block whose state is missing or cannot be decoded is kept as a plain
/// key/value block and noted in the diagnostics.
pub fn parse_security_products(raw: &str) -> ParsedOutcome {
    let blocks = split_blocks(raw, '=');
    if blocks.is_empty() && !raw.trim_start_matches('\u{feff}').trim().is_empty() {
        return ParsedOutcome::failed("no displayName/productState blocks found");
    }

    let mut parsed = ParsedRecords::default();
    for block in blocks {
        let display_name = lookup(&block, NAME_KEY).unwrap_or_default().to_string();
        let state = match lookup(&block, STATE_KEY) {
            Some(text) => decoder::decode_text(text).map_err(|e| e.to_string()),
            None => Err(format!("{STATE_KEY} missing")),
        };

        match state {
            Ok(state) => parsed.records.push(NormalizedRecord::SecurityProductState {
                display_name,
                product_type: state.category.to_string(),
                running_status: state.running.to_string(),
                signature_status: state.signature.to_string(),
                raw_state_value: state.raw,
            }),
            Err(reason) => {
                let label = if display_name.is_empty() {
                    "unnamed product".to_string()
                } else {
                    display_name
                };
                parsed.diagnostics.push(format!("{label}: {reason}"));
                parsed
                    .records
                    .push(NormalizedRecord::KeyValueBlock { mapping: block });
            }
        }
    }

    ParsedOutcome::Records(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wmic_list_output() {
        let raw = "\r\r\n\r\r\n\
displayName=Windows Defender\r\r\n\
productState=397568\r\r\n\
\r\r\n\r\r\n\
displayName=Contoso AV\r\r\n\
productState=266240\r\r\n\
\r\r\n";
        let outcome = parse_security_products(raw);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            NormalizedRecord::SecurityProductState {
                display_name: "Windows Defender".to_string(),
                product_type: "Antivirus".to_string(),
                running_status: "Running and up to date".to_string(),
                signature_status: "Up to date".to_string(),
                raw_state_value: 397568,
            }
        );
        // 266240 = 0x041000
        assert_eq!(records[1].field("product_type"), Some("Antivirus"));
        assert_eq!(records[1].field("running_status"), Some("Running and up to date"));
    }

    #[test]
    fn test_undecodable_state_is_kept_as_block() {
        let raw = "displayName=Legacy AV\nproductState=enabled\n\ndisplayName=Windows Defender\nproductState=397568\n";
        let outcome = parse_security_products(raw);
        let ParsedOutcome::Records(parsed) = outcome else {
            panic!("expected records");
        };
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].kind(), "key_value_block");
        assert_eq!(parsed.records[0].field("productState"), Some("enabled"));
        assert_eq!(parsed.records[1].kind(), "security_product_state");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.diagnostics[0].starts_with("Legacy AV:"));
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let outcome = parse_security_products("DisplayName=X\nPRODUCTSTATE=0x10\n");
        // Hex text is not decimal.
        assert_eq!(outcome.records()[0].kind(), "key_value_block");

        let outcome = parse_security_products("DisplayName=X\nPRODUCTSTATE=4096\n");
        assert_eq!(outcome.records()[0].field("display_name"), Some("X"));
    }

    #[test]
    fn test_no_products_registered() {
        assert!(parse_security_products("\r\n").records().is_empty());
        assert!(parse_security_products("No Instance(s) Available.\r\n")
            .failure()
            .is_some());
    }
}
