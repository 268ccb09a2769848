// src/engine/run.rs

//! A single transfer run: relays lines, folds them into progress, and
//! reconciles end-of-data with process exit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::outcome::{FailureCause, RunOutcome, reconcile};
use crate::engine::{RunPhase, RunSnapshot};
use crate::errors::{Result, RobomonError};
use crate::exec::process::{ProcessHandle, ProcessState, StderrCapture, wait_for_exit};
use crate::exec::stream::{ChunkStream, LineStream, LogLine};
use crate::parse::ProgressState;
use crate::types::TransferJob;

/// How long stderr may stay open after the process has exited.
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Live run of one [`TransferJob`].
///
/// Lines are pulled with [`next_line`](Self::next_line). Each line is folded
/// into the published progress before it is returned, so observers and the
/// caller see lines in the same order. After the last line the run waits for
/// the process and produces its [`RunOutcome`]; a failure is reported only
/// once every line has been handed out.
pub struct TransferRun {
    job: TransferJob,
    pid: Option<u32>,
    lines: LineStream,
    process: watch::Receiver<ProcessState>,
    stderr: Option<StderrCapture>,
    log: String,
    snapshot: Arc<watch::Sender<RunSnapshot>>,
    outcome: Option<RunOutcome>,
}

impl fmt::Debug for TransferRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRun")
            .field("job", &self.job)
            .field("pid", &self.pid)
            .field("outcome", &self.outcome.as_ref().map(RunOutcome::is_success))
            .finish_non_exhaustive()
    }
}

impl TransferRun {
    /// Wrap a started process. `snapshot` receives progress updates and the
    /// final phase.
    pub fn new(
        job: TransferJob,
        handle: ProcessHandle,
        channel_capacity: usize,
        snapshot: Arc<watch::Sender<RunSnapshot>>,
    ) -> Self {
        let parts = handle.into_parts();

        let stdout = parts.stdout.unwrap_or_else(|| Box::new(tokio::io::empty()));
        let chunks = ChunkStream::spawn(stdout, channel_capacity, Some(parts.kill));

        snapshot.send_modify(|s| {
            s.phase = RunPhase::Running;
            s.progress = ProgressState::new();
            s.exit_code = None;
        });

        Self {
            job,
            pid: parts.pid,
            lines: LineStream::new(chunks),
            process: parts.state,
            stderr: parts.stderr,
            log: String::new(),
            snapshot,
            outcome: None,
        }
    }

    /// Standalone run with its own snapshot channel.
    pub fn standalone(job: TransferJob, handle: ProcessHandle, channel_capacity: usize) -> Self {
        let (tx, _rx) = watch::channel(RunSnapshot::default());
        Self::new(job, handle, channel_capacity, Arc::new(tx))
    }

    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle of the underlying process.
    pub fn process_state(&self) -> ProcessState {
        *self.process.borrow()
    }

    /// Latest progress, as observers see it.
    pub fn progress(&self) -> ProgressState {
        self.snapshot.borrow().progress.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot.subscribe()
    }

    /// The terminal outcome, once produced.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Pull the next line.
    ///
    /// - `Ok(Some(line))` while output flows.
    /// - `Ok(None)` once, after end-of-data and a successful exit, and on
    ///   every call after the outcome exists.
    /// - `Err(RuntimeFailure)` after end-of-data when the exit code fails.
    /// - `Err(StreamError)` as soon as reading stdout fails.
    pub async fn next_line(&mut self) -> Result<Option<LogLine>> {
        if self.outcome.is_some() {
            return Ok(None);
        }

        match self.lines.next_line().await {
            Some(Ok(line)) => {
                self.record(&line);
                Ok(Some(line))
            }
            Some(Err(e)) => {
                warn!(pid = self.pid, error = %e, "stdout read failed; killing transfer process");
                if let Some(mut kill) = self.lines.take_kill_switch() {
                    kill.fire();
                }
                let state = wait_for_exit(&mut self.process).await;
                let stderr = self.abort_stderr();
                self.conclude(RunOutcome::Failure {
                    cause: FailureCause::Stream,
                    exit_code: state.code(),
                    stderr,
                    partial_log: self.log.clone(),
                });
                Err(RobomonError::StreamError(e))
            }
            None => {
                debug!(pid = self.pid, "stdout drained; waiting for process exit");
                let state = wait_for_exit(&mut self.process).await;
                let stderr = self.collect_stderr().await;
                let outcome = reconcile(state, stderr, self.log.clone());

                let result = match &outcome {
                    RunOutcome::Success { .. } => Ok(None),
                    RunOutcome::Failure {
                        exit_code, stderr, ..
                    } => Err(RobomonError::RuntimeFailure {
                        code: *exit_code,
                        stderr: stderr.clone(),
                    }),
                };
                self.conclude(outcome);
                result
            }
        }
    }

    /// Drain the remaining lines and return the outcome.
    pub async fn finish(&mut self) -> RunOutcome {
        loop {
            match self.next_line().await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
        self.outcome
            .clone()
            .unwrap_or_else(|| self.failure(FailureCause::Cancelled, None, String::new()))
    }

    /// Stop the run: no more lines, process terminated and reaped.
    ///
    /// Lines already returned stay returned. Returns the final process state.
    pub async fn cancel(&mut self) -> ProcessState {
        if self.outcome.is_some() {
            return self.process_state();
        }

        info!(pid = self.pid, "cancelling transfer run");
        self.lines.cancel();
        let state = wait_for_exit(&mut self.process).await;
        let stderr = self.abort_stderr();

        let outcome = self.failure(FailureCause::Cancelled, state.code(), stderr);
        self.conclude(outcome);
        state
    }

    fn record(&mut self, line: &LogLine) {
        self.log.push_str(&line.text);
        self.log.push('\n');
        self.snapshot.send_modify(|s| s.progress.apply(&line.text));
    }

    async fn collect_stderr(&mut self) -> String {
        match self.stderr.take() {
            Some(capture) => capture.collect_within(STDERR_GRACE).await,
            None => String::new(),
        }
    }

    /// The process was killed; whatever still holds stderr is not waited for.
    fn abort_stderr(&mut self) -> String {
        self.stderr.take().map(StderrCapture::abort).unwrap_or_default()
    }

    fn failure(&self, cause: FailureCause, exit_code: Option<i32>, stderr: String) -> RunOutcome {
        RunOutcome::Failure {
            cause,
            exit_code,
            stderr,
            partial_log: self.log.clone(),
        }
    }

    fn conclude(&mut self, outcome: RunOutcome) {
        let phase = if outcome.is_success() {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed
        };
        let exit_code = outcome.exit_code();

        info!(
            pid = self.pid,
            exit_code = ?exit_code,
            success = outcome.is_success(),
            lines = self.lines.delivered(),
            "transfer run finished"
        );

        self.snapshot.send_modify(|s| {
            s.phase = phase;
            s.exit_code = exit_code;
        });
        self.outcome = Some(outcome);
    }
}

impl Drop for TransferRun {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            debug!(pid = self.pid, "transfer run dropped before completion; killing process");
            self.lines.cancel();
            self.snapshot.send_modify(|s| s.phase = RunPhase::Failed);
        }
    }
}
