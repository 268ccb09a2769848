#![cfg(unix)]

mod common;
use crate::common::{JobBuilder, TestResult, drain, init_tracing, with_timeout};

use std::time::{Duration, Instant};

use robomon::engine::{FailureCause, Monitor, RunOutcome, RunPhase, TransferRun};
use robomon::errors::RobomonError;
use robomon::exec::{ProcessRunner, ProcessState};

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn shell_script_output_and_exit_code_flow_through() -> TestResult {
    init_tracing();

    let handle = ProcessRunner::new("sh").spawn_with_args(&sh(
        r"printf 'New File\t1 k\tC:\\src\\a.txt\r\n42%%\r\n'; echo 'warning on stderr' >&2; exit 3",
    ))?;
    assert!(handle.pid().is_some());

    let mut run = TransferRun::standalone(JobBuilder::new().build(), handle, 4);
    let (lines, err) = with_timeout(drain(&mut run)).await;

    assert!(err.is_none(), "unexpected error: {err:?}");
    assert_eq!(lines, ["New File\t1 k\tC:\\src\\a.txt", "42%"]);
    assert_eq!(run.progress().percent, 42.0);
    assert_eq!(run.progress().current_file_name(), "a.txt");
    assert_eq!(run.outcome().and_then(RunOutcome::exit_code), Some(3));
    Ok(())
}

#[tokio::test]
async fn shell_failure_carries_stderr() -> TestResult {
    init_tracing();

    let handle = ProcessRunner::new("sh")
        .spawn_with_args(&sh("echo partial; echo 'ERROR : Invalid Parameter' >&2; exit 16"))?;
    let mut run = TransferRun::standalone(JobBuilder::new().build(), handle, 4);

    let (lines, err) = with_timeout(drain(&mut run)).await;
    assert_eq!(lines, ["partial"]);
    match err {
        Some(RobomonError::RuntimeFailure { code, stderr }) => {
            assert_eq!(code, Some(16));
            assert!(stderr.contains("Invalid Parameter"));
        }
        other => panic!("expected RuntimeFailure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn cancel_kills_a_long_running_process() -> TestResult {
    init_tracing();

    let handle = ProcessRunner::new("sh").spawn_with_args(&sh("echo started; sleep 30"))?;
    let mut run = TransferRun::standalone(JobBuilder::new().build(), handle, 4);

    let first = with_timeout(run.next_line()).await?.expect("first line");
    assert_eq!(first.text, "started");

    let state = with_timeout(run.cancel()).await;
    assert_eq!(state, ProcessState::Killed);
    match run.outcome() {
        Some(RunOutcome::Failure { cause, .. }) => assert_eq!(*cause, FailureCause::Cancelled),
        other => panic!("expected cancelled outcome, got {other:?}"),
    }
    assert!(run.next_line().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn cancel_does_not_wait_for_a_grandchild_holding_the_pipes() -> TestResult {
    init_tracing();

    // The subshell forks, so `sleep` outlives the killed `sh` and keeps
    // stdout and stderr open.
    let handle = ProcessRunner::new("sh").spawn_with_args(&sh(
        "echo started; echo 'about to wait' >&2; (sleep 30; true); true",
    ))?;
    let mut run = TransferRun::standalone(JobBuilder::new().build(), handle, 4);

    let first = with_timeout(run.next_line()).await?.expect("first line");
    assert_eq!(first.text, "started");

    let started = Instant::now();
    let state = tokio::time::timeout(Duration::from_secs(2), run.cancel())
        .await
        .expect("cancel must return while a grandchild holds the pipes");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(state, ProcessState::Killed);

    match run.outcome() {
        Some(RunOutcome::Failure { cause, .. }) => assert_eq!(*cause, FailureCause::Cancelled),
        other => panic!("expected cancelled outcome, got {other:?}"),
    }
    assert!(run.next_line().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn missing_program_fails_before_any_output() {
    init_tracing();

    let mut monitor = Monitor::new(ProcessRunner::new("robomon-no-such-robocopy"));
    let err = monitor.start(JobBuilder::new().build()).unwrap_err();

    assert!(matches!(err, RobomonError::StartFailed { .. }));
    assert_eq!(monitor.phase(), RunPhase::Failed);
}
