//! Parsers for diagnostic command output.
//!
//! Each grammar has its own parser; [`parse`] dispatches on the probe's
//! grammar tag. Parsers never panic on unexpected input: a mismatch comes
//! back as [`ParsedOutcome::Failed`] so the probe can be recorded as
//! `ParseFailed` with its raw text intact.

mod delimited;
mod key_value;
mod profile;
mod security;
mod table;

pub use delimited::{parse_delimited, split_delimited};
pub use key_value::{parse_key_value, split_blocks};
pub use profile::parse_profiles;
pub use security::parse_security_products;
pub use table::parse_table;

use hostaudit_report_schema::{Grammar, NormalizedRecord, ProbeResult};

/// Records a parser accepted, plus what it had to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecords {
    pub records: Vec<NormalizedRecord>,
    pub dropped_rows: usize,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutcome {
    Records(ParsedRecords),
    Failed { reason: String },
}

impl ParsedOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ParsedOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        match self {
            ParsedOutcome::Records(parsed) => &parsed.records,
            ParsedOutcome::Failed { .. } => &[],
        }
    }

    pub fn dropped_rows(&self) -> usize {
        match self {
            ParsedOutcome::Records(parsed) => parsed.dropped_rows,
            ParsedOutcome::Failed { .. } => 0,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ParsedOutcome::Records(_) => None,
            ParsedOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// Parse raw output according to a grammar.
pub fn parse(grammar: &Grammar, raw: &str) -> ParsedOutcome {
    match grammar {
        Grammar::ProfileBlock => parse_profiles(raw),
        Grammar::Table {
            columns,
            header,
            min_fields,
        } => parse_table(raw, columns, *header, *min_fields),
        Grammar::Delimited {
            delimiter,
            columns,
            header,
        } => parse_delimited(raw, *delimiter, columns, *header),
        Grammar::KeyValue { separator } => parse_key_value(raw, *separator),
        Grammar::SecurityProduct => parse_security_products(raw),
        Grammar::Raw => ParsedOutcome::Records(ParsedRecords::default()),
    }
}

/// Attach parsed records to a runner result.
///
/// Only `Ok` results are parsed; anything else is returned as is. A parse
/// failure yields a `ParseFailed` result that keeps the raw output.
pub fn normalize(result: ProbeResult, grammar: &Grammar) -> ProbeResult {
    if !result.status.is_ok() {
        return result;
    }

    match parse(grammar, &result.raw_output) {
        ParsedOutcome::Records(parsed) => {
            result.normalized(parsed.records, parsed.dropped_rows, parsed.diagnostics)
        }
        ParsedOutcome::Failed { reason } => result.parse_failed(reason),
    }
}

/// Lines with a leading BOM removed and trailing whitespace (including the
/// doubled `\r` some Windows tools emit) stripped.
fn clean_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.trim_start_matches('\u{feff}').lines().map(str::trim_end)
}

/// `-----  ----` style rule lines under table headers.
fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c == '-' || c == '=' || c.is_whitespace())
}
