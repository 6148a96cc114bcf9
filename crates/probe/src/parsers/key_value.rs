//! Blank-line separated `key<sep>value` paragraphs.

use super::{clean_lines, ParsedOutcome, ParsedRecords};
use hostaudit_report_schema::NormalizedRecord;
use std::collections::BTreeMap;

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<BTreeMap<String, String>>,
    current: BTreeMap<String, String>,
}

impl BlockBuilder {
    fn push_line(&mut self, line: &str, separator: char) {
        let Some((key, value)) = line.split_once(separator) else {
            return;
        };
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.current.insert(key.to_string(), value.trim().to_string());
    }

    fn end_paragraph(&mut self) {
        if !self.current.is_empty() {
            self.blocks.push(std::mem::take(&mut self.current));
        }
    }

    fn finish(mut self) -> Vec<BTreeMap<String, String>> {
        self.end_paragraph();
        self.blocks
    }
}

/// Split raw text into key/value paragraphs.
///
/// Lines are split on the first `separator`. Paragraphs without a single
/// separator-bearing line are dropped; a repeated key keeps its last value.
pub fn split_blocks(raw: &str, separator: char) -> Vec<BTreeMap<String, String>> {
    let mut builder = BlockBuilder::default();
    for line in clean_lines(raw) {
        if line.trim().is_empty() {
            builder.end_paragraph();
        } else {
            builder.push_line(line, separator);
        }
    }
    builder.finish()
}

pub fn parse_key_value(raw: &str, separator: char) -> ParsedOutcome {
    let blocks = split_blocks(raw, separator);
    if blocks.is_empty() {
        if raw.trim_start_matches('\u{feff}').trim().is_empty() {
            return ParsedOutcome::Records(ParsedRecords::default());
        }
        return ParsedOutcome::failed(format!("no '{separator}' separated lines found"));
    }

    let records = blocks
        .into_iter()
        .map(|mapping| NormalizedRecord::KeyValueBlock { mapping })
        .collect();
    ParsedOutcome::Records(ParsedRecords {
        records,
        ..ParsedRecords::default()
    })
}
