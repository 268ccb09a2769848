// src/exec/backend.rs

//! Pluggable launcher abstraction.
//!
//! The monitor talks to a `ProcessLauncher` instead of spawning processes
//! itself. Production uses [`ProcessRunner`]; tests swap in a launcher that
//! builds a `ProcessHandle` over in-memory pipes.

use crate::errors::Result;
use crate::exec::process::ProcessHandle;
use crate::exec::runner::ProcessRunner;
use crate::types::TransferJob;

/// Trait abstracting how a job's process is started.
pub trait ProcessLauncher: Send {
    /// Start the process for `job`. Must fail before producing any output if
    /// the process cannot be started.
    fn launch(&mut self, job: &TransferJob) -> Result<ProcessHandle>;
}

impl ProcessLauncher for ProcessRunner {
    fn launch(&mut self, job: &TransferJob) -> Result<ProcessHandle> {
        self.start(job)
    }
}
