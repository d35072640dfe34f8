//! Completion tracking for one streamed run
//!
//! The tracker owns a request's child process from launch to reaping. It
//! emits `Started`, launches, drives both drains concurrently, waits for the
//! exit status and only then emits `Completed`, so no output frame can follow
//! the terminal one.

use crate::config::DEFAULT_MAX_LINE_BYTES;
use crate::execution::launcher::launch;
use crate::execution::sink::ResponseSink;
use crate::execution::spec::ExecutionSpec;
use crate::execution::stream::{drain, Channel, DrainOutcome, OutputEvent};
use log::{debug, error, info, warn};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::Child;

/// How long an abandoned child gets to die after being killed
pub const DEFAULT_REAP_GRACE: Duration = Duration::from_secs(5);

/// What happened during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Process started successfully
    pub launched: bool,
    /// Exit code, when the process exited normally and was reaped
    pub exit_code: Option<i32>,
    /// Terminating signal, when known
    pub signal: Option<i32>,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
    /// Client went away before the run finished
    pub abandoned: bool,
    /// `Completed` reached the sink
    pub completed: bool,
    pub wall_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CompletionTracker {
    report_exit_status: bool,
    reap_grace: Duration,
    max_line_bytes: usize,
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CompletionTracker {
    pub fn new(report_exit_status: bool) -> Self {
        Self {
            report_exit_status,
            reap_grace: DEFAULT_REAP_GRACE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn reap_grace(mut self, grace: Duration) -> Self {
        self.reap_grace = grace;
        self
    }

    /// Longest piece of a line buffered before it is sent
    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    /// Run `spec` to completion, streaming every event into `sink`
    pub async fn run(&self, spec: ExecutionSpec, sink: ResponseSink) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        if sink.send(&OutputEvent::Started).await.is_err() {
            debug!("Client left before launch of {}", spec.program());
            summary.abandoned = true;
            return summary;
        }

        let process = match launch(&spec) {
            Ok(process) => process,
            Err(e) => {
                error!("{}", e);
                summary.completed = sink.send(&OutputEvent::failed(e.to_string())).await.is_ok()
                    && sink.send(&OutputEvent::Completed).await.is_ok();
                summary.abandoned = !summary.completed;
                summary.wall_time_ms = start.elapsed().as_millis() as u64;
                return summary;
            }
        };
        summary.launched = true;

        let pid = process.id();
        let (mut child, stdout, stderr) = process.into_parts();

        let drains = async {
            futures::join!(
                drain(stdout, Channel::Stdout, self.max_line_bytes, &sink),
                drain(stderr, Channel::Stderr, self.max_line_bytes, &sink)
            )
        };

        let outcomes: Option<(DrainOutcome, DrainOutcome)> = tokio::select! {
            outcomes = drains => Some(outcomes),
            _ = sink.closed() => None,
        };

        let abandoned = match &outcomes {
            Some((out, err)) => {
                summary.stdout_lines = out.lines();
                summary.stderr_lines = err.lines();
                out.sink_closed() || err.sink_closed()
            }
            None => true,
        };

        if abandoned {
            warn!("Client disconnected, killing pid {:?}", pid);
            self.abandon(&mut child).await;
            summary.abandoned = true;
            summary.wall_time_ms = start.elapsed().as_millis() as u64;
            return summary;
        }

        // Pipes can close while the child keeps running
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = sink.closed() => None,
        };
        let Some(waited) = waited else {
            warn!("Client disconnected while waiting on pid {:?}, killing it", pid);
            self.abandon(&mut child).await;
            summary.abandoned = true;
            summary.wall_time_ms = start.elapsed().as_millis() as u64;
            return summary;
        };

        match waited {
            Ok(status) => {
                let (code, signal) = exit_parts(status);
                summary.exit_code = code;
                summary.signal = signal;
                info!(
                    "pid {:?} exited (code={:?}, signal={:?}) after {} stdout / {} stderr lines",
                    pid, code, signal, summary.stdout_lines, summary.stderr_lines
                );

                if self.report_exit_status
                    && sink.send(&OutputEvent::Exited { code, signal }).await.is_err()
                {
                    debug!("Client left before exit status of pid {:?}", pid);
                    summary.abandoned = true;
                    summary.wall_time_ms = start.elapsed().as_millis() as u64;
                    return summary;
                }
            }
            Err(e) => {
                error!("Failed to wait on pid {:?}: {}", pid, e);
            }
        }

        summary.completed = sink.send(&OutputEvent::Completed).await.is_ok();
        if !summary.completed {
            debug!("Client left before DONE for pid {:?}", pid);
            summary.abandoned = true;
        }
        summary.wall_time_ms = start.elapsed().as_millis() as u64;
        summary
    }

    async fn abandon(&self, child: &mut Child) {
        kill_group(child);
        if let Err(e) = child.start_kill() {
            debug!("Kill failed (already exited?): {}", e);
        }

        match tokio::time::timeout(self.reap_grace, child.wait()).await {
            Ok(Ok(status)) => debug!("Abandoned child reaped: {}", status),
            Ok(Err(e)) => warn!("Failed to reap abandoned child: {}", e),
            Err(_) => warn!(
                "Abandoned child not reaped within {:?}, left to kill_on_drop",
                self.reap_grace
            ),
        }
    }
}

/// SIGKILL the child's process group; the launcher made the child its leader
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("killpg({}) failed: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

#[cfg(unix)]
fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    use std::os::unix::process::ExitStatusExt;
    (status.code(), status.signal())
}

#[cfg(not(unix))]
fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    (status.code(), None)
}
