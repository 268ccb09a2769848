// src/parse/progress.rs

//! Live progress state folded from log lines.

use tracing::trace;

use crate::parse::classify::{FileDisposition, LineEvent, classify, is_item_candidate};
use crate::parse::summary::{SummaryBuilder, SummaryUpdate, TerminalSummary};

/// Running tallies of what the log has reported so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounters {
    pub lines: u64,
    pub dirs: u64,
    pub files: u64,
    pub extras: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Progress of the current run as far as the log tells.
///
/// The percentage follows the latest valid token, so a noisy or
/// out-of-order line can move it backwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    pub percent: f64,
    pub current_item: String,
    pub summary: Option<TerminalSummary>,
    pub counters: LineCounters,
    table: SummaryBuilder,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one line into the state.
    pub fn apply(&mut self, line: &str) {
        self.counters.lines += 1;

        let events = classify(line);
        if events.is_empty() {
            trace!(line, "line not recognized; kept in raw log only");
        }
        for event in events {
            self.apply_event(event);
        }
    }

    pub fn apply_event(&mut self, event: LineEvent) {
        match event {
            LineEvent::Dir { .. } => self.counters.dirs += 1,
            LineEvent::File { class, path, .. } => match class.disposition() {
                FileDisposition::Copied => {
                    self.counters.files += 1;
                    if is_item_candidate(&path) {
                        self.current_item = path;
                    }
                }
                FileDisposition::Skipped => self.counters.skipped += 1,
                FileDisposition::Extra => self.counters.extras += 1,
            },
            LineEvent::Percent(p) => self.percent = p,
            LineEvent::Error { .. } => self.counters.errors += 1,
            LineEvent::SummaryHeader { column_ends } => self.table.header(column_ends),
            LineEvent::SummaryRow { kind, cells } => match self.table.row(kind, &cells) {
                SummaryUpdate::Complete(summary) if self.summary.is_none() => {
                    self.summary = Some(summary);
                }
                SummaryUpdate::Times(times) => {
                    if let Some(summary) = self.summary.as_mut() {
                        summary.times = Some(times);
                    }
                }
                _ => {}
            },
            LineEvent::PathHint(path) => {
                if is_item_candidate(&path) {
                    self.current_item = path;
                }
            }
        }
    }

    /// File name part of the current item, for compact display.
    pub fn current_file_name(&self) -> &str {
        self.current_item
            .rsplit(['\\', '/'])
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

/// Pure step: `prior` plus `line`.
pub fn parse(line: &str, prior: ProgressState) -> ProgressState {
    let mut next = prior;
    next.apply(line);
    next
}

/// Replay a whole line sequence from a fresh state.
pub fn fold<I, S>(lines: I) -> ProgressState
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .fold(ProgressState::new(), |state, line| parse(line.as_ref(), state))
}
