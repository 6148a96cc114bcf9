//! Report sinks.
//!
//! The orchestrator hands every finished entry, in configuration order, to
//! a [`ReportSink`] and then the complete report. Sinks are owned by the
//! caller.

use hostaudit_common::{Error, Result, Timestamp};
use hostaudit_report_schema::{AuditReport, ProbeEntry, ProbeStatus};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub trait ReportSink {
    /// Called once per probe, in configuration order.
    fn probe_finished(&mut self, _entry: &ProbeEntry) -> Result<()> {
        Ok(())
    }

    /// Called once with the assembled report.
    fn finish(&mut self, report: &AuditReport) -> Result<()>;
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn probe_finished(&mut self, entry: &ProbeEntry) -> Result<()> {
        (**self).probe_finished(entry)
    }

    fn finish(&mut self, report: &AuditReport) -> Result<()> {
        (**self).finish(report)
    }
}

/// Writes the whole report as pretty-printed JSON.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonFileSink {
    fn finish(&mut self, report: &AuditReport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!("Report written to {:?}", self.path);
        Ok(())
    }
}

/// Read a report previously written by [`JsonFileSink`].
pub fn read_report(path: &Path) -> Result<AuditReport> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidReport(format!("{}: {}", path.display(), e)))
}

#[derive(Serialize)]
struct JsonlLine<'a> {
    seq: u64,
    name: &'a str,
    status: ProbeStatus,
    started_at: &'a Timestamp,
    duration_ms: u64,
    exit_code: Option<i32>,
    output_digest: &'a str,
    records: usize,
    dropped_rows: usize,
    failure: Option<&'a str>,
}

/// One JSON line per probe entry, written as the entries arrive.
pub struct JsonlSink<W: Write> {
    writer: W,
    next_seq: u64,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_seq: 1,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonlSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ReportSink for JsonlSink<W> {
    fn probe_finished(&mut self, entry: &ProbeEntry) -> Result<()> {
        let result = &entry.result;
        let line = JsonlLine {
            seq: self.next_seq,
            name: &entry.name,
            status: result.status,
            started_at: &result.started_at,
            duration_ms: result.duration_ms,
            exit_code: result.exit_code,
            output_digest: &result.output_digest,
            records: result.records.len(),
            dropped_rows: result.dropped_rows,
            failure: result.failure.as_deref(),
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.next_seq += 1;
        Ok(())
    }

    fn finish(&mut self, _report: &AuditReport) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Human-readable status table.
pub struct TextSummarySink<W: Write> {
    writer: W,
}

impl<W: Write> TextSummarySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for TextSummarySink<W> {
    fn finish(&mut self, report: &AuditReport) -> Result<()> {
        let width = report
            .probes
            .iter()
            .map(|e| e.name.len())
            .max()
            .unwrap_or(0)
            .max("PROBE".len());

        writeln!(
            self.writer,
            "Audit of {} ({}) run {} at {}",
            report.host, report.os_type, report.run_id, report.started_at
        )?;
        writeln!(
            self.writer,
            "{:<width$}  {:<16}  {:>7}  {:>9}  DETAIL",
            "PROBE", "STATUS", "RECORDS", "MS"
        )?;
        for entry in &report.probes {
            let result = &entry.result;
            let detail = match (&result.failure, result.dropped_rows) {
                (Some(reason), _) => reason.lines().next().unwrap_or_default().to_string(),
                (None, 0) => String::new(),
                (None, dropped) => format!("{} rows dropped", dropped),
            };
            writeln!(
                self.writer,
                "{:<width$}  {:<16}  {:>7}  {:>9}  {}",
                entry.name,
                result.status,
                result.records.len(),
                result.duration_ms,
                detail
            )?;
        }

        let summary = report.summary();
        writeln!(
            self.writer,
            "{} probes: {} ok, {} failed",
            summary.total(),
            summary.ok,
            summary.failed()
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub entries: Vec<ProbeEntry>,
    pub report: Option<AuditReport>,
}

impl ReportSink for CollectingSink {
    fn probe_finished(&mut self, entry: &ProbeEntry) -> Result<()> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn finish(&mut self, report: &AuditReport) -> Result<()> {
        self.report = Some(report.clone());
        Ok(())
    }
}

/// Forwards to several sinks in order, stopping at the first error.
#[derive(Default)]
pub struct FanoutSink<'a> {
    sinks: Vec<Box<dyn ReportSink + 'a>>,
}

impl<'a> FanoutSink<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn push(&mut self, sink: impl ReportSink + 'a) {
        self.sinks.push(Box::new(sink));
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink<'_> {
    fn probe_finished(&mut self, entry: &ProbeEntry) -> Result<()> {
        self.sinks
            .iter_mut()
            .try_for_each(|sink| sink.probe_finished(entry))
    }

    fn finish(&mut self, report: &AuditReport) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|sink| sink.finish(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostaudit_common::OsType;
    use hostaudit_report_schema::{Capture, ProbeResult};

    fn report() -> AuditReport {
        let ok = ProbeResult::from_capture(
            ProbeStatus::Ok,
            Capture {
                stdout: "State ON\n".to_string(),
                exit_code: Some(0),
                ..Capture::default()
            },
            None,
        );
        let missing = ProbeResult::without_output(
            ProbeStatus::NotFound,
            Timestamp::now(),
            "command not found: wmic",
        );
        AuditReport::new(
            "WS-01",
            OsType::Windows,
            Timestamp::now(),
            vec![
                ProbeEntry {
                    name: "firewall_profiles".to_string(),
                    result: ok,
                },
                ProbeEntry {
                    name: "antivirus_products".to_string(),
                    result: missing,
                },
            ],
        )
    }

    #[test]
    fn test_jsonl_one_line_per_entry() {
        let report = report();
        let mut sink = JsonlSink::new(Vec::new());
        for entry in &report.probes {
            sink.probe_finished(entry).unwrap();
        }
        sink.finish(&report).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["seq"], 1);
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[1]["name"], "antivirus_products");
        assert_eq!(lines[1]["failure"], "command not found: wmic");
    }

    #[test]
    fn test_text_summary_lists_every_probe() {
        let report = report();
        let mut sink = TextSummarySink::new(Vec::new());
        sink.finish(&report).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text
            .lines()
            .next()
            .is_some_and(|header| header.ends_with(&format!("at {}", report.started_at))));
        assert!(text.contains("firewall_profiles"));
        assert!(text.contains("not_found"));
        assert!(text.contains("command not found: wmic"));
        assert!(text.ends_with("2 probes: 1 ok, 1 failed\n"));
    }

    #[test]
    fn test_fanout_reaches_all_sinks() {
        let report = report();
        let mut first = CollectingSink::default();
        let mut second = CollectingSink::default();
        {
            let mut fanout = FanoutSink::new();
            fanout.push(&mut first);
            fanout.push(&mut second);
            fanout.probe_finished(&report.probes[0]).unwrap();
            fanout.finish(&report).unwrap();
        }
        assert_eq!(first.entries.len(), 1);
        assert_eq!(second.report.as_ref(), Some(&report));
    }
}
