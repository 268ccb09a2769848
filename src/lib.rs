// src/lib.rs

pub mod analyze;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod parse;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analyze::{HeuristicSummarizer, Severity, summarize_best_effort};
use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::{ConfigFile, RunnerSettings};
use crate::engine::{Monitor, RunOutcome, RunSnapshot, TransferRun, describe_exit_code};
use crate::exec::ProcessRunner;
use crate::exec::args::{build_args, validate_job};
use crate::parse::TerminalSummary;
use crate::types::TransferJob;

/// Everything needed to start one run, after merging config file and CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub runner: RunnerSettings,
    pub job: TransferJob,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the process runner and the run monitor
/// - a progress observer
/// - Ctrl-C and timeout handling
/// - post-run log analysis
pub async fn run(args: CliArgs) -> Result<()> {
    let inv = resolve_invocation(&args)?;

    if args.dry_run {
        print_dry_run(&inv)?;
        return Ok(());
    }

    let runner = ProcessRunner::new(inv.runner.program.clone());
    let mut monitor = Monitor::with_capacity(runner, inv.runner.channel_capacity);
    let observer = spawn_progress_observer(monitor.subscribe());

    let mut run = monitor.start(inv.job.clone())?;
    let outcome = drive(&mut run, inv.runner.timeout).await;
    let progress = run.progress();
    drop(run);

    if let Err(e) = observer.await {
        debug!(error = %e, "progress observer ended abnormally");
    }

    if let Some(summary) = &progress.summary {
        print_summary(summary);
    }
    print_outcome(&outcome);

    if !args.no_analyze && !outcome.log().is_empty() {
        let alerts = summarize_best_effort(&HeuristicSummarizer, outcome.log()).await;
        if !alerts.is_empty() {
            println!();
            println!("alerts ({}):", alerts.len());
            for alert in &alerts {
                println!("  [{}] {}", alert.severity, alert.message);
            }
        }
        let error_alerts = alerts
            .iter()
            .filter(|a| a.severity == Severity::Error)
            .count();
        debug!(alerts = alerts.len(), error_alerts, "log analysis complete");
    }

    match outcome {
        RunOutcome::Success { .. } => Ok(()),
        RunOutcome::Failure {
            cause,
            exit_code,
            stderr,
            ..
        } => {
            let code = exit_code.map_or_else(|| "<none>".to_string(), |c| c.to_string());
            if stderr.trim().is_empty() {
                bail!("transfer failed ({cause:?}, exit code {code})")
            }
            bail!(
                "transfer failed ({cause:?}, exit code {code}): {}",
                stderr.trim()
            )
        }
    }
}

/// Merge the config file with CLI overrides.
///
/// An explicit `--config` must exist; otherwise `Robomon.toml` is used when
/// present. A job must come from one of the two.
pub fn resolve_invocation(args: &CliArgs) -> Result<Invocation> {
    let cfg = load_config(args)?;
    let mut runner = cfg.runner;

    if let Some(program) = &args.program {
        runner.program = program.clone();
    }
    if let Some(timeout) = args.timeout {
        runner.timeout = Some(timeout);
    }

    let mut job = match (cfg.job, &args.source, &args.destination) {
        (Some(job), _, _) => job,
        (None, Some(source), Some(destination)) => {
            TransferJob::new(source.clone(), destination.clone())
        }
        (None, _, _) => bail!(
            "no transfer job: pass --source and --destination or add a [job] section to the config"
        ),
    };

    if let Some(source) = &args.source {
        job.source = source.clone();
    }
    if let Some(destination) = &args.destination {
        job.destination = destination.clone();
    }
    if let Some(operation) = args.operation {
        job.operation = operation;
    }
    if let Some(scope) = args.scope {
        job.scope = scope;
    }

    validate_job(&job)?;
    Ok(Invocation { runner, job })
}

fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    let path = match &args.config {
        Some(path) => PathBuf::from(path),
        None => {
            let fallback = default_config_path();
            if !fallback.exists() {
                debug!(path = %fallback.display(), "no config file; using defaults");
                return Ok(ConfigFile::default());
            }
            fallback
        }
    };

    load_and_validate(&path).with_context(|| format!("loading config {}", path.display()))
}

/// Pull lines until the run ends, printing each one to stdout. Ctrl-C and
/// the optional timeout cancel the run.
async fn drive(run: &mut TransferRun, timeout: Option<Duration>) -> RunOutcome {
    enum Step {
        Line(errors::Result<Option<exec::LogLine>>),
        Interrupted,
        TimedOut,
    }

    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let step = tokio::select! {
            line = run.next_line() => Step::Line(line),
            _ = &mut ctrl_c => Step::Interrupted,
            _ = &mut deadline => Step::TimedOut,
        };

        match step {
            Step::Line(Ok(Some(line))) => println!("{}", line.text),
            Step::Line(Ok(None)) => break,
            Step::Line(Err(e)) => {
                warn!(error = %e, "transfer run ended with an error");
                break;
            }
            Step::Interrupted => {
                warn!(pid = run.pid(), "interrupted; cancelling transfer");
                run.cancel().await;
                break;
            }
            Step::TimedOut => {
                warn!(pid = run.pid(), ?timeout, "timeout elapsed; cancelling transfer");
                run.cancel().await;
                break;
            }
        }
    }

    run.finish().await
}

/// Log progress changes until the run reaches a terminal phase.
fn spawn_progress_observer(mut rx: watch::Receiver<RunSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_percent = f64::NAN;
        let mut last_item = String::new();

        while rx.changed().await.is_ok() {
            let (phase, percent, item) = {
                let snap = rx.borrow_and_update();
                (
                    snap.phase,
                    snap.progress.percent,
                    snap.progress.current_item.clone(),
                )
            };

            if percent != last_percent || item != last_item {
                debug!(percent, item = %item, "progress");
                last_percent = percent;
                last_item = item;
            }

            if phase.is_terminal() {
                info!(?phase, percent = last_percent, "run reached terminal phase");
                break;
            }
        }
    })
}

/// Print the resolved program and argument vector.
fn print_dry_run(inv: &Invocation) -> Result<()> {
    let args = build_args(&inv.job)?;

    println!("robomon dry-run");
    println!("  program: {}", inv.runner.program);
    println!("  args:    {args:?}");
    println!("  channel_capacity = {}", inv.runner.channel_capacity);
    if let Some(timeout) = inv.runner.timeout {
        println!("  timeout = {timeout:?}");
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(summary: &TerminalSummary) {
    println!();
    println!(
        "{:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "", "Total", "Copied", "Skipped", "Mismatch", "FAILED", "Extras"
    );
    for (label, row) in [
        ("Dirs", summary.dirs),
        ("Files", summary.files),
        ("Bytes", summary.bytes),
    ] {
        println!(
            "{:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            label, row.total, row.copied, row.skipped, row.mismatch, row.failed, row.extras
        );
    }
    if let Some(times) = summary.times {
        let show = |d: Option<Duration>| d.map_or_else(String::new, |d| format!("{}s", d.as_secs()));
        println!(
            "{:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "Times",
            show(times.total),
            show(times.copied),
            "",
            "",
            show(times.failed),
            show(times.extras)
        );
    }
}

fn print_outcome(outcome: &RunOutcome) {
    println!();
    match outcome {
        RunOutcome::Success { exit_code, .. } => {
            println!("transfer succeeded (exit code {exit_code})");
            for meaning in describe_exit_code(*exit_code) {
                println!("  - {meaning}");
            }
        }
        RunOutcome::Failure {
            cause, exit_code, ..
        } => {
            match exit_code {
                Some(code) => println!("transfer failed: {cause:?} (exit code {code})"),
                None => println!("transfer failed: {cause:?} (no exit code)"),
            }
            for meaning in exit_code.map(describe_exit_code).unwrap_or_default() {
                println!("  - {meaning}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::types::{Operation, Scope};

    #[test]
    fn explicit_missing_config_is_an_error() {
        let args = CliArgs::try_parse_from([
            "robomon",
            "--config",
            "/definitely/missing/robomon.toml",
        ])
        .unwrap();
        assert!(resolve_invocation(&args).is_err());
    }

    #[test]
    fn cli_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Robomon.toml");
        std::fs::write(
            &path,
            "[runner]\ntimeout = \"1h\"\n\n[job]\nsource = 'C:\\a'\ndestination = 'D:\\b'\n",
        )
        .unwrap();

        let args = CliArgs::try_parse_from([
            "robomon",
            "--config",
            path.to_str().unwrap(),
            "--destination",
            "E:\\c",
            "--operation",
            "move",
            "--program",
            "rc.exe",
        ])
        .unwrap();

        let inv = resolve_invocation(&args).unwrap();
        assert_eq!(inv.runner.program, "rc.exe");
        assert_eq!(inv.runner.timeout, Some(Duration::from_secs(3600)));
        assert_eq!(inv.job.source, "C:\\a");
        assert_eq!(inv.job.destination, "E:\\c");
        assert_eq!(inv.job.operation, Operation::Move);
        assert_eq!(inv.job.scope, Scope::All);
    }

    #[test]
    fn missing_job_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let args =
            CliArgs::try_parse_from(["robomon", "--config", path.to_str().unwrap(), "--source", "a"])
                .unwrap();
        let err = resolve_invocation(&args).unwrap_err();
        assert!(err.to_string().contains("no transfer job"));
    }

    #[test]
    fn injected_cli_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let args = CliArgs::try_parse_from([
            "robomon",
            "--config",
            path.to_str().unwrap(),
            "--source",
            "C:\\a",
            "--destination=/PURGE",
        ])
        .unwrap();
        assert!(resolve_invocation(&args).is_err());
    }
}
