// src/engine/monitor.rs

//! Single-run state machine: Idle → Running → {Succeeded, Failed}.
//!
//! The monitor owns the launcher and the snapshot channel. Starting a run
//! hands the caller a [`TransferRun`], which advances the shared snapshot as
//! it is driven. Only one run may be active at a time.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::engine::run::TransferRun;
use crate::engine::{RunPhase, RunSnapshot};
use crate::errors::{Result, RobomonError};
use crate::exec::ProcessLauncher;
use crate::exec::stream::DEFAULT_CHANNEL_CAPACITY;
use crate::parse::ProgressState;
use crate::types::TransferJob;

pub struct Monitor<L: ProcessLauncher> {
    launcher: L,
    channel_capacity: usize,
    snapshot: Arc<watch::Sender<RunSnapshot>>,
}

impl<L: ProcessLauncher> std::fmt::Debug for Monitor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("channel_capacity", &self.channel_capacity)
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

impl<L: ProcessLauncher> Monitor<L> {
    pub fn new(launcher: L) -> Self {
        Self::with_capacity(launcher, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(launcher: L, channel_capacity: usize) -> Self {
        let (tx, _rx) = watch::channel(RunSnapshot::default());
        Self {
            launcher,
            channel_capacity: channel_capacity.max(1),
            snapshot: Arc::new(tx),
        }
    }

    /// Observe phase and progress of the current (or last) run.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.snapshot.borrow().phase
    }

    /// Start `job`. Progress is reset before the process is launched.
    ///
    /// Fails with [`RobomonError::AlreadyRunning`] while another run is
    /// active. A launch failure moves the monitor to `Failed`.
    pub fn start(&mut self, job: TransferJob) -> Result<TransferRun> {
        if self.phase() == RunPhase::Running {
            return Err(RobomonError::AlreadyRunning);
        }

        self.snapshot.send_modify(|s| {
            s.phase = RunPhase::Idle;
            s.progress = ProgressState::new();
            s.exit_code = None;
        });

        let handle = match self.launcher.launch(&job) {
            Ok(handle) => handle,
            Err(err) => {
                error!(source = %job.source, destination = %job.destination, error = %err, "failed to launch transfer");
                self.snapshot.send_modify(|s| s.phase = RunPhase::Failed);
                return Err(err);
            }
        };

        info!(
            source = %job.source,
            destination = %job.destination,
            operation = %job.operation,
            scope = %job.scope,
            pid = handle.pid(),
            "transfer started"
        );

        Ok(TransferRun::new(
            job,
            handle,
            self.channel_capacity,
            Arc::clone(&self.snapshot),
        ))
    }
}
