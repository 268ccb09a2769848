//! Scripted stand-ins for the transfer executable.
//!
//! A [`FakeProcess`] produces a real [`ProcessHandle`] whose stdout and
//! stderr are in-memory pipes fed by a background task, so runs can be
//! driven end to end without spawning anything.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::{oneshot, watch};

use robomon::errors::{Result, RobomonError};
use robomon::exec::ProcessLauncher;
use robomon::exec::args::validate_job;
use robomon::exec::{ProcessHandle, ProcessState};
use robomon::types::TransferJob;

static NEXT_PID: AtomicU32 = AtomicU32::new(40_000);

const PIPE_CAPACITY: usize = 64 * 1024;

/// Builder for a scripted process.
#[derive(Debug, Clone)]
pub struct FakeProcess {
    chunks: Vec<Vec<u8>>,
    exit_code: Option<i32>,
    stderr: String,
    hold_open: bool,
    chunk_delay: Option<Duration>,
    read_error: Option<String>,
}

impl Default for FakeProcess {
    fn default() -> Self {
        Self {
            chunks: Vec::new(),
            exit_code: Some(0),
            stderr: String::new(),
            hold_open: false,
            chunk_delay: None,
            read_error: None,
        }
    }
}

impl FakeProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit each line terminated by CRLF, one write per line.
    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.chunks.extend(
            lines
                .into_iter()
                .map(|l| format!("{}\r\n", l.as_ref()).into_bytes()),
        );
        self
    }

    /// Emit raw byte chunks exactly as given.
    pub fn chunks<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        self.chunks.extend(chunks.into_iter().map(Into::into));
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Exit without an exit code, as a process ended by a signal would.
    pub fn no_exit_code(mut self) -> Self {
        self.exit_code = None;
        self
    }

    pub fn stderr(mut self, text: impl Into<String>) -> Self {
        self.stderr = text.into();
        self
    }

    /// Keep stdout open after the scripted output until the kill switch
    /// fires.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Fail the stdout read with `message` once the scripted output is
    /// consumed.
    pub fn read_error(mut self, message: impl Into<String>) -> Self {
        self.read_error = Some(message.into());
        self
    }

    /// Start playing the script. Must be called inside a tokio runtime.
    pub fn spawn(self) -> ProcessHandle {
        let (stdout_w, stdout_r) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_w, stderr_r) = tokio::io::duplex(PIPE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (kill_tx, kill_rx) = oneshot::channel();

        let stdout: robomon::exec::process::OutputPipe = match self.read_error.clone() {
            Some(message) => Box::new(FailAtEof {
                inner: stdout_r,
                message: Some(message),
            }),
            None => Box::new(stdout_r),
        };

        let pid = NEXT_PID.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(play(self, stdout_w, stderr_w, state_tx, kill_rx));

        ProcessHandle::new(Some(pid), stdout, Box::new(stderr_r), state_rx, kill_tx)
    }
}

async fn play(
    script: FakeProcess,
    mut stdout: DuplexStream,
    mut stderr: DuplexStream,
    state_tx: watch::Sender<ProcessState>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let FakeProcess {
        chunks,
        exit_code,
        stderr: stderr_text,
        hold_open,
        chunk_delay,
        ..
    } = script;

    let feed = async move {
        for chunk in chunks {
            if let Some(delay) = chunk_delay {
                tokio::time::sleep(delay).await;
            }
            if stdout.write_all(&chunk).await.is_err() {
                return;
            }
        }
        let _ = stderr.write_all(stderr_text.as_bytes()).await;
        drop(stderr);
        if hold_open {
            std::future::pending::<()>().await;
        }
        drop(stdout);
    };

    let final_state = tokio::select! {
        _ = feed => ProcessState::Exited { code: exit_code },
        _ = &mut kill_rx => ProcessState::Killed,
    };

    let _ = state_tx.send(final_state);
}

/// Stdout reader that reports an I/O error where end-of-data would be.
struct FailAtEof {
    inner: DuplexStream,
    message: Option<String>,
}

impl AsyncRead for FailAtEof {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before => match self.message.take() {
                Some(message) => Poll::Ready(Err(io::Error::other(message))),
                None => Poll::Ready(Ok(())),
            },
            other => other,
        }
    }
}

/// Launcher that hands out scripted processes in order and records jobs.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    scripts: VecDeque<FakeProcess>,
    launched: Arc<Mutex<Vec<TransferJob>>>,
}

impl FakeLauncher {
    pub fn new<I>(scripts: I) -> Self
    where
        I: IntoIterator<Item = FakeProcess>,
    {
        Self {
            scripts: scripts.into_iter().collect(),
            launched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared list of jobs launched so far.
    pub fn launched(&self) -> Arc<Mutex<Vec<TransferJob>>> {
        Arc::clone(&self.launched)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&mut self, job: &TransferJob) -> Result<ProcessHandle> {
        validate_job(job)?;

        let Some(script) = self.scripts.pop_front() else {
            return Err(RobomonError::StartFailed {
                program: "fake-robocopy".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no scripted process left"),
            });
        };

        self.launched
            .lock()
            .expect("launched jobs lock poisoned")
            .push(job.clone());
        Ok(script.spawn())
    }
}
