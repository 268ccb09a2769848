// src/exec/mod.rs

//! Process execution layer.
//!
//! This module starts the transfer executable with `tokio::process::Command`
//! and turns its stdout into a pull-based line sequence.
//!
//! - [`args`] builds and validates the argument vector.
//! - [`runner`] spawns the process and supervises its lifecycle.
//! - [`process`] is the process handle shared by the runner and test fakes.
//! - [`stream`] adapts stdout into backpressured chunk and line streams.
//! - [`backend`] provides the `ProcessLauncher` trait so tests can replace
//!   the real runner.

pub mod args;
pub mod backend;
pub mod process;
pub mod runner;
pub mod stream;

pub use backend::ProcessLauncher;
pub use process::{ProcessHandle, ProcessState};
pub use runner::ProcessRunner;
pub use stream::{ChunkStream, LineSplitter, LineStream, LogLine};
