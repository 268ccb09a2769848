// src/parse/summary.rs

//! Terminal summary table printed by robocopy at the end of a run:
//!
//! ```text
//!                Total    Copied   Skipped  Mismatch    FAILED    Extras
//!     Dirs :         3         3         0         0         0         0
//!    Files :         7         6         0         0         1         1
//!    Bytes :   422.1 m   420.6 m         0         0     1.5 m     1.5 m
//!    Times :   0:00:15   0:00:10                       0:00:00   0:00:05
//! ```
//!
//! The table is fixed width. The `Times` row leaves columns blank, so cells
//! are matched to the column whose header ends closest to where the cell
//! ends.

use std::time::Duration;

use crate::parse::classify::{SummaryCell, SummaryRowKind, parse_size};

const COLUMNS: usize = 6;

/// One numeric row (`Dirs`, `Files` or `Bytes`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    pub total: u64,
    pub copied: u64,
    pub skipped: u64,
    pub mismatch: u64,
    pub failed: u64,
    pub extras: u64,
}

impl SummaryCounts {
    fn from_columns(cols: [Option<u64>; COLUMNS]) -> Self {
        let [total, copied, skipped, mismatch, failed, extras] = cols.map(|c| c.unwrap_or(0));
        Self {
            total,
            copied,
            skipped,
            mismatch,
            failed,
            extras,
        }
    }
}

/// The `Times` row. Robocopy leaves `skipped` and `mismatch` blank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryTimes {
    pub total: Option<Duration>,
    pub copied: Option<Duration>,
    pub failed: Option<Duration>,
    pub extras: Option<Duration>,
}

/// Parsed summary table. Byte counts are in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalSummary {
    pub dirs: SummaryCounts,
    pub files: SummaryCounts,
    pub bytes: SummaryCounts,
    pub times: Option<SummaryTimes>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TablePhase {
    #[default]
    Waiting,
    Collecting,
    Published,
    Closed,
}

/// Collects header and rows across lines until the table is complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SummaryBuilder {
    phase: TablePhase,
    column_ends: Vec<usize>,
    dirs: Option<SummaryCounts>,
    files: Option<SummaryCounts>,
    bytes: Option<SummaryCounts>,
}

/// What feeding a summary line produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SummaryUpdate {
    None,
    /// Dirs, Files and Bytes are all known.
    Complete(TerminalSummary),
    /// Times row for an already published table.
    Times(SummaryTimes),
}

impl SummaryBuilder {
    pub(crate) fn header(&mut self, column_ends: Vec<usize>) {
        match self.phase {
            TablePhase::Waiting | TablePhase::Collecting => {
                self.phase = TablePhase::Collecting;
                self.column_ends = column_ends;
                self.dirs = None;
                self.files = None;
                self.bytes = None;
            }
            // A second table after publication is ignored.
            TablePhase::Published | TablePhase::Closed => self.phase = TablePhase::Closed,
        }
    }

    pub(crate) fn row(&mut self, kind: SummaryRowKind, cells: &[SummaryCell]) -> SummaryUpdate {
        match (self.phase, kind) {
            (TablePhase::Published, SummaryRowKind::Times) => {
                self.phase = TablePhase::Closed;
                return SummaryUpdate::Times(self.times(cells));
            }
            (TablePhase::Published | TablePhase::Closed, _) => return SummaryUpdate::None,
            _ => {}
        }

        match kind {
            SummaryRowKind::Dirs => self.dirs = Some(self.counts(cells, parse_count)),
            SummaryRowKind::Files => self.files = Some(self.counts(cells, parse_count)),
            SummaryRowKind::Bytes => self.bytes = Some(self.counts(cells, parse_size)),
            SummaryRowKind::Times => return SummaryUpdate::None,
        }

        match (self.dirs, self.files, self.bytes) {
            (Some(dirs), Some(files), Some(bytes)) => {
                self.phase = TablePhase::Published;
                SummaryUpdate::Complete(TerminalSummary {
                    dirs,
                    files,
                    bytes,
                    times: None,
                })
            }
            _ => SummaryUpdate::None,
        }
    }

    fn counts(&self, cells: &[SummaryCell], parse: fn(&str) -> Option<u64>) -> SummaryCounts {
        let mut cols = [None; COLUMNS];
        for (col, cell) in self.assign(cells) {
            cols[col] = parse(&cell.text);
        }
        SummaryCounts::from_columns(cols)
    }

    fn times(&self, cells: &[SummaryCell]) -> SummaryTimes {
        let mut cols: [Option<Duration>; COLUMNS] = [None; COLUMNS];
        for (col, cell) in self.assign(cells) {
            cols[col] = parse_hms(&cell.text);
        }
        SummaryTimes {
            total: cols[0],
            copied: cols[1],
            failed: cols[4],
            extras: cols[5],
        }
    }

    /// Map each cell to a column index.
    fn assign<'a>(&self, cells: &'a [SummaryCell]) -> Vec<(usize, &'a SummaryCell)> {
        let header_usable = self.column_ends.len() == COLUMNS;

        if cells.len() >= COLUMNS || !header_usable {
            return cells.iter().take(COLUMNS).enumerate().collect();
        }

        cells
            .iter()
            .map(|cell| {
                let col = self
                    .column_ends
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, end)| end.abs_diff(cell.end))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                (col, cell)
            })
            .collect()
    }
}

fn parse_count(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}

/// Parse `h:mm:ss`.
pub fn parse_hms(text: &str) -> Option<Duration> {
    let mut parts = text.trim().split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let s: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || m >= 60 || s >= 60 {
        return None;
    }
    let secs = h.checked_mul(3600)?.checked_add(m * 60 + s)?;
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::classify::{LineEvent, classify};

    const TABLE: [&str; 5] = [
        "               Total    Copied   Skipped  Mismatch    FAILED    Extras",
        "    Dirs :         3         3         0         0         0         0",
        "   Files :         7         6         0         0         1         1",
        "   Bytes :   422.1 m   420.6 m         0         0     1.5 m     1.5 m",
        "   Times :   0:00:15   0:00:10                       0:00:00   0:00:05",
    ];

    fn feed(builder: &mut SummaryBuilder, line: &str) -> SummaryUpdate {
        match classify(line).into_iter().next() {
            Some(LineEvent::SummaryHeader { column_ends }) => {
                builder.header(column_ends);
                SummaryUpdate::None
            }
            Some(LineEvent::SummaryRow { kind, cells }) => builder.row(kind, &cells),
            other => panic!("not a summary line: {other:?}"),
        }
    }

    #[test]
    fn full_table_is_published_then_gets_times() {
        let mut b = SummaryBuilder::default();
        let updates: Vec<_> = TABLE.iter().map(|l| feed(&mut b, l)).collect();

        let SummaryUpdate::Complete(summary) = updates[3] else {
            panic!("expected completion on the Bytes row, got {:?}", updates[3]);
        };
        assert_eq!(summary.dirs.total, 3);
        assert_eq!(summary.files.failed, 1);
        assert_eq!(summary.files.extras, 1);
        assert_eq!(summary.bytes.copied, (420.6f64 * 1024.0 * 1024.0).round() as u64);

        let SummaryUpdate::Times(times) = updates[4] else {
            panic!("expected times update, got {:?}", updates[4]);
        };
        assert_eq!(times.total, Some(Duration::from_secs(15)));
        assert_eq!(times.copied, Some(Duration::from_secs(10)));
        assert_eq!(times.failed, Some(Duration::ZERO));
        assert_eq!(times.extras, Some(Duration::from_secs(5)));
    }

    #[test]
    fn second_table_is_ignored() {
        let mut b = SummaryBuilder::default();
        for l in TABLE {
            feed(&mut b, l);
        }
        for l in TABLE {
            assert_eq!(feed(&mut b, l), SummaryUpdate::None);
        }
    }

    #[test]
    fn hms_parsing() {
        assert_eq!(parse_hms("1:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_hms("0:61:00"), None);
        assert_eq!(parse_hms("nope"), None);
    }
}
