// src/engine/outcome.rs

//! Terminal outcome of a run and the exit-code policy.

use crate::exec::process::ProcessState;

/// Robocopy exit codes below this are benign: bits 0..=2 only report that
/// files were copied, extra files exist, or mismatches were seen.
pub const FAILURE_THRESHOLD: i32 = 8;

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The process could not be spawned.
    StartFailed,
    /// The process exited with a failing or missing exit code.
    ExitCode,
    /// Reading stdout failed mid-transfer.
    Stream,
    /// The consumer cancelled the run.
    Cancelled,
}

/// Produced exactly once per run, after stdout hit end-of-data and the
/// process has exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success {
        exit_code: i32,
        log: String,
    },
    Failure {
        cause: FailureCause,
        exit_code: Option<i32>,
        stderr: String,
        partial_log: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Success { exit_code, .. } => Some(*exit_code),
            RunOutcome::Failure { exit_code, .. } => *exit_code,
        }
    }

    /// Everything stdout produced, complete or partial.
    pub fn log(&self) -> &str {
        match self {
            RunOutcome::Success { log, .. } => log,
            RunOutcome::Failure { partial_log, .. } => partial_log,
        }
    }
}

/// Exit code policy: `0..8` is success, anything else (including a missing
/// code) is failure.
pub fn is_success_code(code: Option<i32>) -> bool {
    matches!(code, Some(c) if (0..FAILURE_THRESHOLD).contains(&c))
}

/// Combine the final process state with the captured output.
pub fn reconcile(state: ProcessState, stderr: String, log: String) -> RunOutcome {
    match state {
        ProcessState::Exited { code: Some(code) } if is_success_code(Some(code)) => {
            RunOutcome::Success {
                exit_code: code,
                log,
            }
        }
        ProcessState::Killed => RunOutcome::Failure {
            cause: FailureCause::Cancelled,
            exit_code: None,
            stderr,
            partial_log: log,
        },
        other => RunOutcome::Failure {
            cause: FailureCause::ExitCode,
            exit_code: other.code(),
            stderr,
            partial_log: log,
        },
    }
}

/// Human-readable meaning of the bits set in a robocopy exit code.
pub fn describe_exit_code(code: i32) -> Vec<&'static str> {
    if code == 0 {
        return vec!["no files were copied; source and destination are in sync"];
    }
    if code < 0 {
        return vec!["abnormal termination"];
    }

    const BITS: [(i32, &str); 5] = [
        (1, "files were copied"),
        (2, "extra files or directories exist in the destination"),
        (4, "mismatched files or directories were detected"),
        (8, "some files or directories could not be copied"),
        (16, "fatal error; no files were copied"),
    ];

    BITS.iter()
        .filter(|(bit, _)| code & bit != 0)
        .map(|(_, text)| *text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_boundary() {
        assert!(is_success_code(Some(0)));
        assert!(is_success_code(Some(7)));
        assert!(!is_success_code(Some(8)));
        assert!(!is_success_code(Some(16)));
        assert!(!is_success_code(None));
    }

    #[test]
    fn reconcile_maps_states() {
        let ok = reconcile(
            ProcessState::Exited { code: Some(1) },
            String::new(),
            "log\n".into(),
        );
        assert_eq!(
            ok,
            RunOutcome::Success {
                exit_code: 1,
                log: "log\n".into()
            }
        );

        let failed = reconcile(
            ProcessState::Exited { code: Some(16) },
            "boom".into(),
            "part\n".into(),
        );
        match failed {
            RunOutcome::Failure {
                cause,
                exit_code,
                stderr,
                partial_log,
            } => {
                assert_eq!(cause, FailureCause::ExitCode);
                assert_eq!(exit_code, Some(16));
                assert_eq!(stderr, "boom");
                assert_eq!(partial_log, "part\n");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let no_code = reconcile(ProcessState::Exited { code: None }, String::new(), String::new());
        assert!(!no_code.is_success());
        assert_eq!(no_code.exit_code(), None);

        let killed = reconcile(ProcessState::Killed, String::new(), String::new());
        assert!(matches!(
            killed,
            RunOutcome::Failure {
                cause: FailureCause::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn exit_code_bits_are_described() {
        assert_eq!(describe_exit_code(3).len(), 2);
        assert_eq!(describe_exit_code(16), vec!["fatal error; no files were copied"]);
    }
}
