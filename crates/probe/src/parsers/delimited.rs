//! Character-delimited records, as emitted by `wmic ... /format:csv`,
//! `schtasks /fo csv` and the colon-separated `getent` databases.

use super::{clean_lines, ParsedOutcome, ParsedRecords};
use hostaudit_report_schema::NormalizedRecord;

/// Split one line on `delimiter`, honoring double-quoted fields.
///
/// Inside quotes, `""` is a literal quote and the delimiter is ordinary text.
/// Unquoted fields are trimmed; quoted fields are kept verbatim.
pub fn split_delimited(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                _ => current.push(c),
            }
            continue;
        }

        match c {
            '"' if current.trim().is_empty() => {
                current.clear();
                quoted = true;
                was_quoted = true;
            }
            c if c == delimiter => {
                fields.push(finish_field(&mut current, was_quoted));
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    fields.push(finish_field(&mut current, was_quoted));
    fields
}

fn finish_field(current: &mut String, was_quoted: bool) -> String {
    let field = std::mem::take(current);
    if was_quoted {
        field
    } else {
        field.trim().to_string()
    }
}

/// Parse delimited records into table rows.
///
/// With `header`, the first non-blank line names the columns (configured
/// `columns` win if present) and later copies of it are skipped. Rows whose
/// field count differs from the column count are dropped and counted.
pub fn parse_delimited(
    raw: &str,
    delimiter: char,
    columns: &[String],
    header: bool,
) -> ParsedOutcome {
    let mut column_names: Vec<String> = columns.to_vec();
    let mut header_line: Option<Vec<String>> = None;
    let mut parsed = ParsedRecords::default();

    for line in clean_lines(raw) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_delimited(line, delimiter);

        if header {
            if header_line.is_none() {
                if column_names.is_empty() {
                    column_names = fields.clone();
                }
                header_line = Some(fields);
                continue;
            }
            if header_line.as_ref() == Some(&fields) {
                continue;
            }
        }

        if !column_names.is_empty() && fields.len() != column_names.len() {
            parsed.dropped_rows += 1;
            continue;
        }

        parsed.records.push(NormalizedRecord::TableRow {
            columns: fields,
            column_names: column_names.clone(),
        });
    }

    if header_line.is_none() && parsed.records.is_empty() && parsed.dropped_rows == 0 {
        return ParsedOutcome::failed("no delimited rows or header found");
    }

    if parsed.dropped_rows > 0 {
        parsed.diagnostics.push(format!(
            "dropped {} row(s) not matching {} columns",
            parsed.dropped_rows,
            column_names.len()
        ));
    }

    ParsedOutcome::Records(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_honors_quotes() {
        assert_eq!(
            split_delimited(r#"WS-01,"\Microsoft\Windows\Defrag","Ready","runs ""weekly"", Sunday""#, ','),
            vec![
                "WS-01",
                r"\Microsoft\Windows\Defrag",
                "Ready",
                r#"runs "weekly", Sunday"#,
            ]
        );
        assert_eq!(split_delimited("a,,b", ','), vec!["a", "", "b"]);
        assert_eq!(split_delimited(" a : b ", ':'), vec!["a", "b"]);
    }

    #[test]
    fn test_wmic_csv_output() {
        let raw = "\r\r\n\
Node,Disabled,Lockout,Name,PasswordRequired,SID\r\r\n\
WS-01,FALSE,FALSE,Administrator,TRUE,S-1-5-21-1-500\r\r\n\
WS-01,TRUE,FALSE,Guest,FALSE,S-1-5-21-1-501\r\r\n";
        let outcome = parse_delimited(raw, ',', &[], true);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("SID"), Some("S-1-5-21-1-500"));
        assert_eq!(records[1].field("PasswordRequired"), Some("FALSE"));
    }

    #[test]
    fn test_repeated_schtasks_headers_are_skipped() {
        let raw = "\
\"TaskName\",\"Next Run Time\",\"Status\"\n\
\"\\Updater\",\"10/15/2026 3:00:00 AM\",\"Ready\"\n\
\n\
\"TaskName\",\"Next Run Time\",\"Status\"\n\
\"\\Microsoft\\Windows\\Defrag\\ScheduledDefrag\",\"N/A\",\"Disabled\"\n";
        let outcome = parse_delimited(raw, ',', &[], true);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].field("Status"), Some("Disabled"));
        assert_eq!(outcome.dropped_rows(), 0);
    }

    #[test]
    fn test_mismatched_rows_are_dropped() {
        let raw = "Name,State\nDhcp,Running\nbroken\nSpooler,Stopped,extra\n";
        let outcome = parse_delimited(raw, ',', &[], true);
        assert_eq!(outcome.records().len(), 1);
        assert_eq!(outcome.dropped_rows(), 2);
    }

    #[test]
    fn test_passwd_without_header() {
        let columns: Vec<String> = ["user", "password", "uid", "gid", "gecos", "home", "shell"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let raw = "root:x:0:0:root:/root:/bin/bash\nnobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin\n";
        let outcome = parse_delimited(raw, ':', &columns, false);
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("shell"), Some("/bin/bash"));
        assert_eq!(records[1].field("uid"), Some("65534"));
    }

    #[test]
    fn test_header_only_is_empty_records() {
        let outcome = parse_delimited("Name,State\n", ',', &[], true);
        assert!(outcome.failure().is_none());
        assert!(outcome.records().is_empty());
    }

    #[test]
    fn test_blank_input_fails() {
        assert!(parse_delimited("\r\n\r\n", ',', &[], true).failure().is_some());
    }
}
