// src/parse/mod.rs

//! Incremental, best-effort parsing of the transfer log.
//!
//! - [`classify`] turns a single line into zero or more [`LineEvent`]s.
//! - [`summary`] assembles the fixed-width terminal summary table.
//! - [`progress`] folds events into a [`ProgressState`].
//!
//! Parsing is single pass and never fails: unrecognized lines only count
//! towards `counters.lines`.

pub mod classify;
pub mod progress;
pub mod summary;

pub use classify::{LineEvent, classify};
pub use progress::{LineCounters, ProgressState, fold, parse};
pub use summary::{SummaryCounts, SummaryTimes, TerminalSummary};
