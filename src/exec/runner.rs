// src/exec/runner.rs

//! Spawns the transfer executable for a single job.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::{Result, RobomonError};
use crate::exec::args::build_args;
use crate::exec::process::{ProcessHandle, ProcessState};
use crate::types::TransferJob;

/// Default executable, resolved through `PATH`.
pub const DEFAULT_PROGRAM: &str = "robocopy";

/// Launches the external transfer command.
///
/// The program is executed directly with an argument vector; no shell is
/// involved, so path strings are never interpreted.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Validate `job`, spawn the process and return its live handle.
    ///
    /// Spawn failures become [`RobomonError::StartFailed`] before any output
    /// is produced.
    pub fn start(&self, job: &TransferJob) -> Result<ProcessHandle> {
        let args = build_args(job)?;
        self.spawn_with_args(&args)
    }

    /// Spawn with an already validated argument vector.
    pub fn spawn_with_args(&self, args: &[String]) -> Result<ProcessHandle> {
        info!(program = %self.program, ?args, "starting transfer process");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RobomonError::StartFailed {
            program: self.program.clone(),
            source,
        })?;

        let pid = child.id();
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(RobomonError::StartFailed {
                program: self.program.clone(),
                source: std::io::Error::other("stdout/stderr pipes were not created"),
            });
        };

        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(supervise(child, pid, state_tx, kill_rx));

        Ok(ProcessHandle::new(
            pid,
            Box::new(stdout),
            Box::new(stderr),
            state_rx,
            kill_tx,
        ))
    }
}

/// Own the child until it exits or the kill switch fires, then publish the
/// final lifecycle state.
async fn supervise(
    mut child: Child,
    pid: Option<u32>,
    state_tx: watch::Sender<ProcessState>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let final_state = tokio::select! {
        status = child.wait() => exited(pid, status),

        cancel = &mut kill_rx => {
            match cancel {
                Ok(()) => info!(pid, "kill requested; terminating transfer process"),
                Err(_) => debug!(pid, "kill switch dropped; terminating transfer process"),
            }
            if let Err(e) = child.kill().await {
                warn!(pid, error = %e, "failed to kill transfer process");
                match child.try_wait() {
                    Ok(Some(status)) => exited(pid, Ok(status)),
                    _ => ProcessState::Killed,
                }
            } else {
                ProcessState::Killed
            }
        }
    };

    // Nobody listening is fine: the run was dropped.
    let _ = state_tx.send(final_state);
}

fn exited(pid: Option<u32>, status: std::io::Result<ExitStatus>) -> ProcessState {
    match status {
        Ok(status) => {
            let code = status.code();
            info!(pid, exit_code = ?code, "transfer process exited");
            ProcessState::Exited { code }
        }
        Err(e) => {
            warn!(pid, error = %e, "waiting for transfer process failed");
            ProcessState::Exited { code: None }
        }
    }
}
