// src/exec/backend.rs

//! Pluggable process runner abstraction.
//!
//! The orchestrator talks to a `ProcessRunner` instead of spawning processes
//! directly. This makes it easy to swap in a scripted fake in tests while
//! keeping the production implementation here.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{PrunecheckError, Result};

use super::command::{CommandOutput, CommandSpec};

/// Default per-command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default capture limit, per stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Exit code reported for a command killed by the timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// How long to keep draining pipes after a timed-out child was killed.
/// Grandchildren may hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Trait abstracting how shell commands are executed.
///
/// Implementations must allow concurrent calls with independent working
/// directories.
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion.
    ///
    /// Non-zero exits and timeouts are reported through
    /// [`CommandOutput::exit_code`]; `Err` is reserved for commands that
    /// could not be started at all.
    fn run(
        &self,
        spec: CommandSpec,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>>;
}

/// Real runner used in production: `sh -c` (or `cmd /C`) via tokio.
#[derive(Debug, Clone)]
pub struct RealProcessRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl RealProcessRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }
}

impl Default for RealProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_MAX_OUTPUT_BYTES)
    }
}

impl ProcessRunner for RealProcessRunner {
    fn run(
        &self,
        spec: CommandSpec,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>> {
        Box::pin(run_command(spec, self.timeout, self.max_output_bytes))
    }
}

async fn run_command(
    spec: CommandSpec,
    timeout: Duration,
    max_output_bytes: usize,
) -> Result<CommandOutput> {
    debug!(cmd = %spec.command, cwd = ?spec.cwd, "spawning command");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.command);
        c
    };

    cmd.current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| PrunecheckError::Spawn {
        command: spec.command.clone(),
        source,
    })?;

    let mut stdout = child.stdout.take().map(|s| Capture::spawn(s, max_output_bytes));
    let mut stderr = child.stderr.take().map(|s| Capture::spawn(s, max_output_bytes));

    // One deadline covers both the exit and the pipes closing: a background
    // grandchild can keep stdout/stderr open long after the shell exits.
    let deadline = Instant::now() + timeout;
    let finished = tokio::time::timeout_at(deadline, async {
        let status = child.wait().await?;
        for capture in [stdout.as_mut(), stderr.as_mut()].into_iter().flatten() {
            capture.finish().await;
        }
        Ok::<_, std::io::Error>(status)
    })
    .await;

    let (exit_code, timed_out) = match finished {
        Ok(status) => (status?.code().unwrap_or(-1), false),
        Err(_) => {
            warn!(cmd = %spec.command, ?timeout, "command timed out; killing");
            if let Err(e) = child.kill().await {
                debug!(cmd = %spec.command, error = %e, "kill after timeout failed");
            }
            for capture in [stdout.as_mut(), stderr.as_mut()].into_iter().flatten() {
                capture.drain().await;
            }
            (TIMEOUT_EXIT_CODE, true)
        }
    };

    let stdout = stdout.map(|c| c.text()).unwrap_or_default();
    let mut stderr = stderr.map(|c| c.text()).unwrap_or_default();
    if timed_out {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("command timed out after {timeout:?}"));
    }

    debug!(cmd = %spec.command, exit_code, "command finished");

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Background reader for one output stream.
///
/// Bytes land in a shared buffer as they arrive, so whatever was read
/// before an abort is still reported.
struct Capture {
    buf: Arc<Mutex<Captured>>,
    /// `None` once the reader has finished and been joined.
    task: Option<JoinHandle<()>>,
}

impl Capture {
    fn spawn<R>(reader: R, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Captured::default()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            if let Err(e) = read_bounded(reader, limit, &sink).await {
                debug!(error = %e, "error reading command output");
            }
        });
        Self {
            buf,
            task: Some(task),
        }
    }

    /// Wait for the reader to hit end of stream.
    async fn finish(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }

    /// After a kill: give the pipes `DRAIN_GRACE` to close, then stop reading.
    async fn drain(&mut self) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        if tokio::time::timeout(DRAIN_GRACE, task).await.is_ok() {
            self.task = None;
        } else if let Some(task) = self.task.take() {
            debug!("output still open after kill; abandoning capture");
            task.abort();
        }
    }

    fn text(&self) -> String {
        let captured = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let mut text = String::from_utf8_lossy(&captured.bytes).into_owned();
        if captured.truncated {
            text.push_str("\n[output truncated]");
        }
        text
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Read everything from `reader` into `sink`, keeping at most `limit` bytes.
///
/// The remainder is drained so the child never blocks on a full pipe.
async fn read_bounded<R>(mut reader: R, limit: usize, sink: &Mutex<Captured>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = sink.lock().unwrap_or_else(PoisonError::into_inner);
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.bytes.extend_from_slice(&chunk[..room]);
            captured.truncated = true;
        } else {
            captured.bytes.extend_from_slice(&chunk[..n]);
        }
    }
}
