//! Profile block parser (`netsh advfirewall show allprofiles`).

use super::{clean_lines, is_separator_row, ParsedOutcome, ParsedRecords};
use hostaudit_report_schema::NormalizedRecord;
use regex::Regex;
use std::collections::BTreeMap;

const HEADER_PATTERN: &str = r"(?i)^(?P<name>\S.*?)\s+profile(?:\s+settings)?\s*:?$";
// netsh aligns values into a column instead of using a colon.
const GAP_PATTERN: &str = r"\s{2,}";

/// Parse `<Name> Profile` sections and their settings.
///
/// Settings are `key: value` or whitespace-aligned `Key    Value` lines.
/// Anything before the first header, rule lines and lines without a value are
/// skipped. No header at all is a parse failure.
pub fn parse_profiles(raw: &str) -> ParsedOutcome {
    let (header, gap) = match (Regex::new(HEADER_PATTERN), Regex::new(GAP_PATTERN)) {
        (Ok(header), Ok(gap)) => (header, gap),
        (Err(e), _) | (_, Err(e)) => return ParsedOutcome::failed(format!("invalid pattern: {e}")),
    };

    let mut sections: Vec<(String, BTreeMap<String, String>)> = Vec::new();

    for line in clean_lines(raw) {
        let line = line.trim();
        if line.is_empty() || is_separator_row(line) {
            continue;
        }

        if let Some(name) = header_name(line, &header, &gap) {
            sections.push((name, BTreeMap::new()));
            continue;
        }

        let Some((_, settings)) = sections.last_mut() else {
            continue;
        };
        if let Some((key, value)) = split_setting(line, &gap) {
            settings.insert(key, value);
        }
    }

    if sections.is_empty() {
        return ParsedOutcome::failed("no '<Name> Profile' sections found");
    }

    let records = sections
        .into_iter()
        .map(|(profile_name, settings)| NormalizedRecord::ProfileSettings {
            profile_name,
            settings,
        })
        .collect();

    ParsedOutcome::Records(ParsedRecords {
        records,
        ..ParsedRecords::default()
    })
}

/// A header carries no separator: no aligned gap and no colon except a
/// trailing one.
fn header_name(line: &str, header: &Regex, gap: &Regex) -> Option<String> {
    if gap.is_match(line) || line.trim_end_matches(':').contains(':') {
        return None;
    }
    let caps = header.captures(line)?;
    Some(caps["name"].trim().to_string())
}

/// Split at the first colon or the first aligned gap, whichever comes first.
fn split_setting(line: &str, gap: &Regex) -> Option<(String, String)> {
    let colon = line.find(':').map(|at| (at, at + 1));
    let aligned = gap.find(line).map(|m| (m.start(), m.end()));
    let (key_end, value_start) = match (colon, aligned) {
        (Some(c), Some(a)) => c.min(a),
        (Some(c), None) => c,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    let (key, value) = (&line[..key_end], &line[value_start..]);

    let key = key.trim().trim_end_matches(':').trim();
    let value = value.trim();
    // `Logging:` style sub-headings carry no value.
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}
