mod common;
use crate::common::{FakeProcess, JobBuilder, drain, two_file_copy_log};

use proptest::prelude::*;

use robomon::engine::{TransferRun, is_success_code};
use robomon::exec::LineSplitter;
use robomon::exec::stream::split_lines;
use robomon::parse::{ProgressState, fold, parse};

/// Bytes that look like robocopy output: text, tabs, CR, LF and a few
/// multi-byte characters.
fn log_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![
            Just("\r\n".to_string()),
            Just("\n".to_string()),
            Just("\t".to_string()),
            Just("%".to_string()),
            Just("é".to_string()),
            Just("ñ".to_string()),
            "[ -~]{1,12}",
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat().into_bytes())
}

/// Sorted cut points into a buffer of length `len`.
fn cuts(len: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0..=len, 0..8).prop_map(|mut v| {
        v.sort_unstable();
        v
    })
}

fn fragment(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        out.push(bytes[start..cut].to_vec());
        start = cut;
    }
    out.push(bytes[start..].to_vec());
    out
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("New Dir\t\\a\\".to_string()),
        Just("New File\t1.2 m\t\\a\\f1.txt".to_string()),
        Just("\t*EXTRA File\t\t1.5 m\tD:\\dst\\tmp.log".to_string()),
        Just("2024-05-01 10:00:00 ERROR 5 (0x00000005) Copying File C:\\x".to_string()),
        (0u32..=120).prop_map(|p| format!("{p}%")),
        "[ -~]{0,30}",
    ]
}

proptest! {
    #[test]
    fn splitting_is_independent_of_fragmentation(
        (bytes, cuts) in log_bytes().prop_flat_map(|b| {
            let len = b.len();
            (Just(b), cuts(len))
        })
    ) {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();
        for chunk in fragment(&bytes, &cuts) {
            splitter.push(&chunk, &mut out);
        }
        out.extend(splitter.finish());

        prop_assert_eq!(out, split_lines(&bytes));
    }

    #[test]
    fn parsing_is_deterministic_and_bounded(lines in proptest::collection::vec(line_strategy(), 0..30)) {
        let once = fold(&lines);
        let again = fold(&lines);
        prop_assert_eq!(&once, &again);

        let stepwise = lines
            .iter()
            .fold(ProgressState::new(), |state, line| parse(line, state));
        prop_assert_eq!(&once, &stepwise);

        prop_assert!((0.0..=100.0).contains(&once.percent));
        prop_assert_eq!(once.counters.lines, lines.len() as u64);
    }

    #[test]
    fn arbitrary_text_never_panics_the_parser(line in any::<String>()) {
        let state = parse(&line, ProgressState::new());
        prop_assert!((0.0..=100.0).contains(&state.percent));
    }

    #[test]
    fn success_is_exactly_below_eight(code in -100i32..100) {
        prop_assert_eq!(is_success_code(Some(code)), (0..8).contains(&code));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn run_lines_survive_any_chunking(cut_points in cuts(512)) {
        let text: String = two_file_copy_log()
            .iter()
            .map(|l| format!("{l}\r\n"))
            .collect();
        let bytes = text.as_bytes();
        let cut_points: Vec<usize> = cut_points.into_iter().map(|c| c.min(bytes.len())).collect();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (lines, err) = rt.block_on(async {
            let script = FakeProcess::new().chunks(fragment(bytes, &cut_points)).exit_code(1);
            let mut run = TransferRun::standalone(JobBuilder::new().build(), script.spawn(), 2);
            drain(&mut run).await
        });

        prop_assert!(err.is_none());
        prop_assert_eq!(lines, two_file_copy_log());
    }
}
