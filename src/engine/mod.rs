// src/engine/mod.rs

//! Run orchestration.
//!
//! - [`monitor`] holds the explicit run state machine and launches runs.
//! - [`run`] drives one run: line relay, progress folding and completion
//!   reconciliation.
//! - [`outcome`] defines the terminal outcome and the exit-code policy.

use crate::parse::ProgressState;

/// Lifecycle of the monitor's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// What observers see at any point during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSnapshot {
    pub phase: RunPhase,
    pub progress: ProgressState,
    pub exit_code: Option<i32>,
}

pub mod monitor;
pub mod outcome;
pub mod run;

pub use monitor::Monitor;
pub use outcome::{FailureCause, RunOutcome, describe_exit_code, is_success_code, reconcile};
pub use run::TransferRun;
