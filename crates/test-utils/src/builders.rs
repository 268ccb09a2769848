#![allow(dead_code)]

//! Canned robocopy output for tests.

use robomon::types::{Operation, Scope, TransferJob};

/// Builder for `TransferJob` with harmless Windows-style defaults.
pub struct JobBuilder {
    job: TransferJob,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self {
            job: TransferJob::new("C:\\src", "D:\\dst"),
        }
    }

    pub fn source(mut self, source: &str) -> Self {
        self.job.source = source.to_string();
        self
    }

    pub fn destination(mut self, destination: &str) -> Self {
        self.job.destination = destination.to_string();
        self
    }

    pub fn moving(mut self) -> Self {
        self.job.operation = Operation::Move;
        self
    }

    pub fn latest_only(mut self) -> Self {
        self.job.scope = Scope::Latest;
        self
    }

    pub fn build(self) -> TransferJob {
        self.job
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary table with the given `Files` row; dirs and bytes are fixed.
pub fn summary_table(files: [u64; 6]) -> Vec<String> {
    let row = |label: &str, cells: [String; 6]| {
        format!(
            "{label:>8} :{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
            cells[0], cells[1], cells[2], cells[3], cells[4], cells[5]
        )
    };

    vec![
        "------------------------------------------------------------------------------"
            .to_string(),
        String::new(),
        "               Total    Copied   Skipped  Mismatch    FAILED    Extras".to_string(),
        row("Dirs", ["1", "1", "0", "0", "0", "0"].map(String::from)),
        row("Files", files.map(|n| n.to_string())),
        row("Bytes", ["2.4 m", "2.4 m", "0", "0", "0", "0"].map(String::from)),
        "   Times :   0:00:03   0:00:02                       0:00:00   0:00:00".to_string(),
        String::new(),
    ]
}

/// Log of a successful two-file copy, ending with its summary table.
pub fn two_file_copy_log() -> Vec<String> {
    let mut lines: Vec<String> = [
        "New Dir\t\\a\\",
        "New File\t1.2 m\t\\a\\f1.txt",
        "45.5%",
        "100%",
        "New File\t1.2 m\t\\a\\f2.txt",
        "100%",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    lines.extend(summary_table([2, 2, 0, 0, 0, 0]));
    lines
}
