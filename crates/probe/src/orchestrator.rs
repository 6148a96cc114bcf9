//! Concurrent execution of a probe list into one report.

use crate::parsers;
use crate::runner::{ProcessRunner, Runner};
use crate::sink::ReportSink;
use anyhow::Context;
use hostaudit_common::os::local_hostname;
use hostaudit_common::{OsType, Timestamp};
use hostaudit_report_schema::{
    validate_specs, AuditReport, ConfigError, ProbeEntry, ProbeResult, ProbeSpec, ProbeStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_WORKERS: usize = 4;

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of probes running at once.
    pub workers: usize,
    /// Wall-clock budget for the whole run, counted from `run_all`.
    pub deadline: Option<Duration>,
    pub host: String,
    pub os_type: OsType,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if let Some(deadline) = self.deadline {
            if deadline.is_zero() {
                return Err(ConfigError::InvalidDeadline(0.0));
            }
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            deadline: None,
            host: local_hostname(),
            os_type: OsType::current(),
        }
    }
}

/// Runs probes through a [`Runner`] and assembles the report.
pub struct Orchestrator {
    runner: Arc<dyn Runner>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn Runner>, config: OrchestratorConfig) -> Self {
        Self { runner, config }
    }

    pub fn with_process_runner(config: OrchestratorConfig) -> Self {
        Self::new(Arc::new(ProcessRunner::new()), config)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every probe and return the report, entries in input order.
    ///
    /// Only invalid configuration fails the run, and it does so before any
    /// probe starts.
    pub async fn run_all(&self, specs: &[ProbeSpec]) -> Result<AuditReport, ConfigError> {
        self.execute(specs, |_| {}).await
    }

    /// Like [`run_all`](Self::run_all), also streaming each entry to `sink`
    /// in input order and finally the report itself.
    ///
    /// A sink failure does not stop the probes; the first one is returned
    /// once the run is over.
    pub async fn run_all_with_sink(
        &self,
        specs: &[ProbeSpec],
        sink: &mut dyn ReportSink,
    ) -> anyhow::Result<AuditReport> {
        let mut sink_error: Option<anyhow::Error> = None;
        let report = self
            .execute(specs, |entry| {
                if sink_error.is_none() {
                    if let Err(e) = sink.probe_finished(entry) {
                        warn!(probe = %entry.name, "Sink rejected entry: {}", e);
                        sink_error = Some(e.into());
                    }
                }
            })
            .await?;

        if let Some(e) = sink_error {
            return Err(e.context("failed to write probe entry"));
        }
        sink.finish(&report).context("failed to finish report")?;
        Ok(report)
    }

    async fn execute<F>(&self, specs: &[ProbeSpec], mut on_entry: F) -> Result<AuditReport, ConfigError>
    where
        F: FnMut(&ProbeEntry),
    {
        self.config.validate()?;
        validate_specs(specs)?;

        let started_at = Timestamp::now();
        let deadline = self.config.deadline.map(|budget| Instant::now() + budget);
        info!(
            "Starting audit of {} ({}): {} probes, {} workers",
            self.config.host,
            self.config.os_type,
            specs.len(),
            self.config.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        for (idx, spec) in specs.iter().cloned().enumerate() {
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = run_probe(runner.as_ref(), &spec, deadline).await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<ProbeResult>> = specs.iter().map(|_| None).collect();
        let mut entries = Vec::with_capacity(specs.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!("Probe task failed: {}", e),
            }
            // Emit the completed prefix so sinks see configuration order.
            while let Some(result) = slots.get_mut(entries.len()).and_then(Option::take) {
                let entry = ProbeEntry {
                    name: specs[entries.len()].name().to_string(),
                    result,
                };
                on_entry(&entry);
                entries.push(entry);
            }
        }

        for (spec, slot) in specs.iter().zip(slots).skip(entries.len()) {
            let result = slot.unwrap_or_else(|| {
                ProbeResult::without_output(
                    ProbeStatus::ExecutionFailed,
                    started_at,
                    "probe task aborted before reporting",
                )
            });
            let entry = ProbeEntry {
                name: spec.name().to_string(),
                result,
            };
            on_entry(&entry);
            entries.push(entry);
        }

        let report = AuditReport::new(
            self.config.host.clone(),
            self.config.os_type,
            started_at,
            entries,
        );
        let summary = report.summary();
        info!(
            "Audit complete: {} ok, {} failed ({} timed out, {} not found, {} execution failed, {} parse failed)",
            summary.ok,
            summary.failed(),
            summary.timed_out,
            summary.not_found,
            summary.execution_failed,
            summary.parse_failed
        );
        Ok(report)
    }
}

async fn run_probe(runner: &dyn Runner, spec: &ProbeSpec, deadline: Option<Instant>) -> ProbeResult {
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        warn!(probe = spec.name(), "Run deadline reached before start");
        return ProbeResult::without_output(
            ProbeStatus::TimedOut,
            Timestamp::now(),
            "run deadline reached before probe started",
        );
    }

    debug!(probe = spec.name(), grammar = %spec.grammar(), "Starting probe");
    let raw = runner.run(spec, deadline).await;
    let result = parsers::normalize(raw, spec.grammar());

    match result.status {
        ProbeStatus::Ok => info!(
            probe = spec.name(),
            records = result.records.len(),
            dropped = result.dropped_rows,
            "Probe ok in {}ms",
            result.duration_ms
        ),
        status => warn!(
            probe = spec.name(),
            "Probe {}: {}",
            status,
            result.failure.as_deref().unwrap_or("no reason recorded")
        ),
    }
    result
}
