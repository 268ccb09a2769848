#![allow(dead_code)]
#![allow(unused_imports)]

pub use robomon_test_utils::builders::{JobBuilder, summary_table, two_file_copy_log};
pub use robomon_test_utils::{FakeLauncher, FakeProcess, init_tracing, with_timeout};

use robomon::engine::TransferRun;
use robomon::errors::RobomonError;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Pull every line of `run`, stopping at the first error.
pub async fn drain(run: &mut TransferRun) -> (Vec<String>, Option<RobomonError>) {
    let mut lines = Vec::new();
    loop {
        match run.next_line().await {
            Ok(Some(line)) => lines.push(line.text),
            Ok(None) => return (lines, None),
            Err(e) => return (lines, Some(e)),
        }
    }
}
