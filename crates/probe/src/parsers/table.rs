//! Whitespace-aligned table parser.

use super::{clean_lines, is_separator_row, ParsedOutcome, ParsedRecords};
use hostaudit_report_schema::NormalizedRecord;
use regex::Regex;

/// Parse rows whose fields are separated by two or more whitespace
/// characters.
///
/// With `header`, the first accepted row names the columns unless
/// `columns` already does, in which case that row is only consumed. Rows
/// with fewer than `min_fields` fields are dropped and counted.
pub fn parse_table(
    raw: &str,
    columns: &[String],
    header: bool,
    min_fields: usize,
) -> ParsedOutcome {
    let splitter = match Regex::new(r"\s{2,}") {
        Ok(re) => re,
        Err(e) => return ParsedOutcome::failed(format!("invalid pattern: {e}")),
    };

    let mut column_names: Vec<String> = columns.to_vec();
    let mut awaiting_header = header;
    let mut parsed = ParsedRecords::default();

    for line in clean_lines(raw) {
        let line = line.trim();
        if line.is_empty() || is_separator_row(line) {
            continue;
        }

        let fields: Vec<String> = splitter.split(line).map(str::to_string).collect();

        if awaiting_header {
            awaiting_header = false;
            if column_names.is_empty() {
                column_names = fields;
            }
            continue;
        }

        // Some tools repeat the header after a page break.
        if is_header_repeat(&fields, &column_names) {
            continue;
        }

        if fields.len() < min_fields {
            parsed.dropped_rows += 1;
            continue;
        }

        parsed.records.push(NormalizedRecord::TableRow {
            columns: fields,
            column_names: column_names.clone(),
        });
    }

    if parsed.dropped_rows > 0 {
        parsed.diagnostics.push(format!(
            "dropped {} row(s) with fewer than {} fields",
            parsed.dropped_rows, min_fields
        ));
    }

    ParsedOutcome::Records(parsed)
}

fn is_header_repeat(fields: &[String], column_names: &[String]) -> bool {
    !column_names.is_empty()
        && fields.len() == column_names.len()
        && fields
            .iter()
            .zip(column_names)
            .all(|(field, name)| field.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    fn row_fields(record: &NormalizedRecord) -> &[String] {
        match record {
            NormalizedRecord::TableRow { columns, .. } => columns,
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_one_field_row_is_dropped_and_counted() {
        let raw = "Administrator  False  \nGuest\nalice  True  10/2/2024 9:14:07 AM\n";
        let outcome = parse_table(raw, &names(&["Name", "Enabled", "LastLogon"]), false, 2);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(outcome.dropped_rows(), 1);
        assert!(records.iter().all(|r| row_fields(r).len() >= 2));
        assert_eq!(records[1].field("LastLogon"), Some("10/2/2024 9:14:07 AM"));

        match &outcome {
            ParsedOutcome::Records(parsed) => assert_eq!(parsed.diagnostics.len(), 1),
            ParsedOutcome::Failed { reason } => panic!("unexpected failure: {reason}"),
        }
    }

    #[test]
    fn test_header_row_supplies_column_names() {
        let raw = "\
HotFixID   InstalledOn  Description\r\n\
KB5034441  1/9/2024     Security Update\r\n\
KB5033375  12/12/2023   Update\r\n";
        let outcome = parse_table(raw, &[], true, 1);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("HotFixID"), Some("KB5034441"));
        assert_eq!(records[1].field("Description"), Some("Update"));
    }

    #[test]
    fn test_configured_columns_take_precedence_over_header() {
        let raw = "Name  StartMode  State\nDhcp  Auto  Running\n";
        let outcome = parse_table(raw, &names(&["Service", "Start", "Status"]), true, 2);
        assert_eq!(outcome.records().len(), 1);
        assert_eq!(outcome.records()[0].field("Status"), Some("Running"));
    }

    #[test]
    fn test_separator_and_repeated_header_rows_are_skipped() {
        let raw = "\
Name           PrincipalSource\n\
----           ---------------\n\
WS-01\\Admin    Local\n\
\n\
Name           PrincipalSource\n\
----           ---------------\n\
CORP\\Domain Admins  ActiveDirectory\n";
        let outcome = parse_table(raw, &[], true, 2);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(outcome.dropped_rows(), 0);
        assert_eq!(records[1].field("Name"), Some("CORP\\Domain Admins"));
    }

    #[test]
    fn test_netstat_rows() {
        let raw = "\
\r\n\
Active Connections\r\n\
\r\n\
  Proto  Local Address          Foreign Address        State\r\n\
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING\r\n\
  UDP    0.0.0.0:5353           *:*                    \r\n";
        let outcome = parse_table(
            raw,
            &names(&["Proto", "Local Address", "Foreign Address", "State"]),
            false,
            3,
        );
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("State"), Some("LISTENING"));
        assert_eq!(records[1].field("Foreign Address"), Some("*:*"));
        assert_eq!(outcome.dropped_rows(), 1);
    }

    #[test]
    fn test_empty_input_is_empty_records() {
        let outcome = parse_table("\n\n", &names(&["Name"]), false, 1);
        assert!(outcome.failure().is_none());
        assert!(outcome.records().is_empty());
    }
}
