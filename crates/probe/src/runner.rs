//! Running a probe's command and classifying how it ended.

use async_trait::async_trait;
use hostaudit_common::Timestamp;
use hostaudit_report_schema::{Capture, ProbeResult, ProbeSpec, ProbeStatus};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-stream capture limit.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;

/// How long pipe readers may keep draining once the process is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Executes one probe.
///
/// Implementations never return an error: every way a probe can end is a
/// [`ProbeStatus`] on the result.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `spec`, giving up at its timeout or at `deadline`, whichever
    /// comes first.
    async fn run(&self, spec: &ProbeSpec, deadline: Option<Instant>) -> ProbeResult;
}

/// Runs probes as local child processes, without a shell.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct StreamBuffer {
    bytes: Vec<u8>,
    truncated: bool,
}

type SharedBuffer = Arc<Mutex<StreamBuffer>>;

async fn drain<R>(mut pipe: R, buffer: SharedBuffer, cap: usize) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let mut buffer = buffer.lock().await;
        let room = cap.saturating_sub(buffer.bytes.len());
        if n > room {
            buffer.truncated = true;
        }
        buffer.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
}

fn spawn_drain<R>(pipe: Option<R>, buffer: &SharedBuffer, cap: usize) -> Option<JoinHandle<io::Result<()>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|pipe| tokio::spawn(drain(pipe, Arc::clone(buffer), cap)))
}

/// Wait for a reader until `until`, then abandon it. Whatever it had read
/// stays in its buffer. Returns whether the reader was abandoned.
async fn settle(handle: Option<JoinHandle<io::Result<()>>>, until: Instant) -> bool {
    let Some(mut handle) = handle else {
        return false;
    };
    match tokio::time::timeout_at(until, &mut handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => debug!("pipe read failed: {}", e),
        Ok(Err(e)) => debug!("pipe reader task failed: {}", e),
        Err(_) => {
            handle.abort();
            return true;
        }
    }
    false
}

/// Decode captured bytes. PowerShell redirections may produce UTF-16LE with
/// a BOM; everything else is read as UTF-8, replacing invalid sequences.
pub fn decode_output(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

async fn take_text(buffer: &SharedBuffer, stream: &str, diagnostics: &mut Vec<String>) -> String {
    let buffer = buffer.lock().await;
    if buffer.truncated {
        diagnostics.push(format!(
            "{} truncated at {} bytes",
            stream,
            buffer.bytes.len()
        ));
    }
    decode_output(&buffer.bytes)
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    }
}

enum Ending {
    Exited(Option<i32>),
    TimedOut,
    WaitFailed(io::Error),
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, spec: &ProbeSpec, deadline: Option<Instant>) -> ProbeResult {
        let started_at = Timestamp::now();
        let clock = Instant::now();

        let own_limit = clock + spec.timeout();
        let (limit, by_deadline) = match deadline {
            Some(deadline) if deadline < own_limit => (deadline, true),
            _ => (own_limit, false),
        };
        let timeout_reason = || {
            if by_deadline {
                "run deadline reached".to_string()
            } else {
                format!("timed out after {:.1}s", spec.timeout().as_secs_f64())
            }
        };

        if limit <= clock {
            warn!(probe = spec.name(), "Skipped, run deadline already passed");
            return ProbeResult::without_output(ProbeStatus::TimedOut, started_at, timeout_reason());
        }

        debug!(probe = spec.name(), "Exec: {}", spec.display_command());

        let mut child = match Command::new(spec.command())
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(probe = spec.name(), "Command not found: {}", spec.command());
                return ProbeResult::without_output(
                    ProbeStatus::NotFound,
                    started_at,
                    format!("command not found: {}", spec.command()),
                );
            }
            Err(e) => {
                warn!(probe = spec.name(), "Failed to launch {}: {}", spec.command(), e);
                return ProbeResult::without_output(
                    ProbeStatus::ExecutionFailed,
                    started_at,
                    format!("failed to launch {}: {}", spec.command(), e),
                );
            }
        };

        let stdout_buf = SharedBuffer::default();
        let stderr_buf = SharedBuffer::default();
        let stdout_task = spawn_drain(child.stdout.take(), &stdout_buf, self.max_output_bytes);
        let stderr_task = spawn_drain(child.stderr.take(), &stderr_buf, self.max_output_bytes);

        let ending = match tokio::time::timeout_at(limit, child.wait()).await {
            Ok(Ok(status)) => Ending::Exited(status.code()),
            Ok(Err(e)) => Ending::WaitFailed(e),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!(probe = spec.name(), "kill failed: {}", e);
                }
                Ending::TimedOut
            }
        };

        // Descendants may still hold the pipes open after the child exits.
        let drain_until = Instant::now() + DRAIN_GRACE;
        let mut diagnostics = Vec::new();
        for (stream, task) in [("stdout", stdout_task), ("stderr", stderr_task)] {
            if settle(task, drain_until).await {
                debug!(probe = spec.name(), "{} reader abandoned", stream);
                diagnostics.push(format!(
                    "{} still open {}ms after exit; reading stopped",
                    stream,
                    DRAIN_GRACE.as_millis()
                ));
            }
        }

        let stdout = take_text(&stdout_buf, "stdout", &mut diagnostics).await;
        let stderr = take_text(&stderr_buf, "stderr", &mut diagnostics).await;

        let exit_code = match ending {
            Ending::Exited(code) => code,
            _ => None,
        };
        let capture = Capture {
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            exit_code,
            stdout,
            stderr,
        };

        let result = match ending {
            Ending::TimedOut => {
                warn!(probe = spec.name(), "{}", timeout_reason());
                ProbeResult::from_capture(ProbeStatus::TimedOut, capture, Some(timeout_reason()))
            }
            Ending::WaitFailed(e) => ProbeResult::from_capture(
                ProbeStatus::ExecutionFailed,
                capture,
                Some(format!("failed waiting for {}: {}", spec.command(), e)),
            ),
            Ending::Exited(Some(0)) => ProbeResult::from_capture(ProbeStatus::Ok, capture, None),
            Ending::Exited(code) if !capture.stdout.trim().is_empty() => {
                ProbeResult::from_capture(ProbeStatus::Ok, capture, None)
                    .with_diagnostic(format!("{}; output kept", exit_description(code)))
            }
            Ending::Exited(code) => {
                let stderr = capture.stderr.trim();
                let reason = if stderr.is_empty() {
                    exit_description(code)
                } else {
                    format!("{}: {}", exit_description(code), stderr)
                };
                ProbeResult::from_capture(ProbeStatus::ExecutionFailed, capture, Some(reason))
            }
        };

        diagnostics
            .into_iter()
            .fold(result, |result, note| result.with_diagnostic(note))
    }
}
