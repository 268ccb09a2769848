// src/exec/process.rs

//! Live process handle shared by the real runner and test fakes.
//!
//! A [`ProcessHandle`] is built from plain async pipes plus a lifecycle
//! channel, so the rest of the pipeline never touches `tokio::process`
//! directly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Boxed byte source for stdout / stderr.
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// Lifecycle of the external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited on its own. `None` when the OS reported no code (signal).
    Exited { code: Option<i32> },
    /// Terminated through the kill switch.
    Killed,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    /// Exit code as seen by the reconciler; killed processes have none.
    pub fn code(&self) -> Option<i32> {
        match self {
            ProcessState::Exited { code } => *code,
            _ => None,
        }
    }
}

/// One-shot request to terminate the process.
///
/// Dropping an unfired switch also ends the process: the lifecycle task sees
/// the closed channel and lets `kill_on_drop` take care of the child.
#[derive(Debug)]
pub struct KillSwitch {
    tx: Option<oneshot::Sender<()>>,
}

impl KillSwitch {
    pub fn new(tx: oneshot::Sender<()>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Fire the switch. Returns `false` if it was already fired or the
    /// process is already gone.
    pub fn fire(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Stderr accumulated by its own task, readable once the process has exited.
///
/// The reader appends into a shared buffer, so text captured so far survives
/// when the reader is abandoned. A descendant of the process can keep the
/// pipe open long after the process itself is gone.
#[derive(Debug)]
pub struct StderrCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl StderrCapture {
    pub fn spawn(mut pipe: OutputPipe) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);

        let handle = tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "stderr read ended with error");
                        break;
                    }
                }
            }
        });

        Self { buf, handle }
    }

    /// Wait for stderr to reach end-of-data and take its text.
    pub async fn collect(self) -> String {
        let Self { buf, handle } = self;
        let _ = handle.await;
        take_text(&buf)
    }

    /// Like [`collect`](Self::collect), but give up after `grace` and keep
    /// what was read until then.
    pub async fn collect_within(self, grace: Duration) -> String {
        let Self { buf, mut handle } = self;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            debug!(?grace, "stderr still open after process exit; abandoning reader");
            handle.abort();
        }
        take_text(&buf)
    }

    /// Stop reading now and take what was captured so far.
    pub fn abort(self) -> String {
        self.handle.abort();
        take_text(&self.buf)
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_text(buf: &Mutex<Vec<u8>>) -> String {
    let bytes = std::mem::take(&mut *lock(buf));
    String::from_utf8_lossy(&bytes).into_owned()
}

/// The live external process of exactly one run.
pub struct ProcessHandle {
    pid: Option<u32>,
    stdout: Option<OutputPipe>,
    stderr: Option<StderrCapture>,
    state: watch::Receiver<ProcessState>,
    kill: KillSwitch,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ProcessHandle {
    /// Assemble a handle. Stderr capture starts immediately.
    pub fn new(
        pid: Option<u32>,
        stdout: OutputPipe,
        stderr: OutputPipe,
        state: watch::Receiver<ProcessState>,
        kill: oneshot::Sender<()>,
    ) -> Self {
        Self {
            pid,
            stdout: Some(stdout),
            stderr: Some(StderrCapture::spawn(stderr)),
            state,
            kill: KillSwitch::new(kill),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// A receiver that observers can poll for the lifecycle.
    pub fn state_receiver(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    /// Take the stdout pipe. Only the stream adapter should call this.
    pub fn take_stdout(&mut self) -> Option<OutputPipe> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<StderrCapture> {
        self.stderr.take()
    }

    pub fn kill(&mut self) -> bool {
        self.kill.fire()
    }

    /// Split into the parts a run owns separately.
    pub fn into_parts(self) -> ProcessParts {
        ProcessParts {
            pid: self.pid,
            stdout: self.stdout,
            stderr: self.stderr,
            state: self.state,
            kill: self.kill,
        }
    }
}

/// Owned pieces of a [`ProcessHandle`].
pub struct ProcessParts {
    pub pid: Option<u32>,
    pub stdout: Option<OutputPipe>,
    pub stderr: Option<StderrCapture>,
    pub state: watch::Receiver<ProcessState>,
    pub kill: KillSwitch,
}

/// Wait until the lifecycle leaves `Running`.
///
/// If the sender side disappears without a final state, the process is
/// treated as exited without a code.
pub async fn wait_for_exit(state: &mut watch::Receiver<ProcessState>) -> ProcessState {
    let finished = state.wait_for(|s| !s.is_running()).await.map(|s| *s);
    match finished {
        Ok(s) => s,
        Err(_) => {
            let last = *state.borrow();
            if last.is_running() {
                ProcessState::Exited { code: None }
            } else {
                last
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn collect_reads_until_end_of_data() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let capture = StderrCapture::spawn(Box::new(reader));

        writer.write_all(b"ERROR : Invalid Parameter").await.unwrap();
        drop(writer);

        assert_eq!(capture.collect().await, "ERROR : Invalid Parameter");
    }

    #[tokio::test]
    async fn pipe_held_open_keeps_text_read_so_far() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let capture = StderrCapture::spawn(Box::new(reader));

        writer.write_all(b"partial").await.unwrap();

        // `writer` stays alive, as if a grandchild inherited the pipe.
        let text = tokio::time::timeout(
            Duration::from_secs(2),
            capture.collect_within(Duration::from_millis(200)),
        )
        .await
        .expect("bounded collect must not hang");
        assert_eq!(text, "partial");
        drop(writer);
    }

    #[tokio::test]
    async fn abort_returns_immediately() {
        let (_writer, reader) = tokio::io::duplex(64);
        let capture = StderrCapture::spawn(Box::new(reader));
        assert_eq!(capture.abort(), "");
    }
}
