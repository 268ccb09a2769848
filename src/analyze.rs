// src/analyze.rs

//! Post-run log analysis.
//!
//! The analyzer is an external collaborator behind [`LogSummarizer`]. Its
//! failure never fails the run: [`summarize_best_effort`] replaces it with a
//! single error alert. [`HeuristicSummarizer`] is the built-in analyzer that
//! replays the log through the parser.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::warn;

use crate::parse::{LineEvent, ProgressState, classify};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Message of the alert substituted for a failed analysis.
pub const ANALYSIS_FAILED: &str = "Failed to analyze log file.";

/// Turns a full transfer log into alerts.
pub trait LogSummarizer: Send + Sync {
    fn summarize<'a>(
        &'a self,
        log: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Alert>>> + Send + 'a>>;
}

/// Run `summarizer`, mapping any failure to one synthetic error alert.
pub async fn summarize_best_effort(summarizer: &dyn LogSummarizer, log: &str) -> Vec<Alert> {
    match summarizer.summarize(log).await {
        Ok(alerts) => alerts,
        Err(e) => {
            warn!(error = %e, "log analysis failed");
            vec![Alert::new(Severity::Error, ANALYSIS_FAILED)]
        }
    }
}

/// Rule-based analyzer over the parsed log.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSummarizer;

impl HeuristicSummarizer {
    pub fn analyze(&self, log: &str) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let mut state = ProgressState::new();
        let mut lines = log.lines().peekable();

        while let Some(line) = lines.next() {
            state.apply(line);

            let Some(LineEvent::Error { code, message }) = classify(line).into_iter().next()
            else {
                continue;
            };

            // The reason ("Access is denied.") follows on its own line.
            let reason = lines
                .peek()
                .filter(|next| !next.trim().is_empty() && classify(next).is_empty())
                .map(|next| next.trim().to_string());

            let text = match reason {
                Some(reason) => format!("ERROR {code}: {message} ({reason})"),
                None => format!("ERROR {code}: {message}"),
            };
            alerts.push(Alert::new(Severity::Error, text));
        }

        let Some(summary) = state.summary else {
            alerts.push(Alert::new(
                Severity::Warning,
                "The log has no summary table; the transfer may have been interrupted.",
            ));
            return alerts;
        };

        if summary.files.failed > 0 || summary.dirs.failed > 0 {
            alerts.push(Alert::new(
                Severity::Error,
                format!(
                    "{} file(s) and {} directorie(s) failed to copy.",
                    summary.files.failed, summary.dirs.failed
                ),
            ));
        }
        if summary.files.extras > 0 || summary.dirs.extras > 0 {
            alerts.push(Alert::new(
                Severity::Warning,
                format!(
                    "{} extra file(s) and {} extra directorie(s) exist only in the destination.",
                    summary.files.extras, summary.dirs.extras
                ),
            ));
        }
        if summary.files.mismatch > 0 || summary.dirs.mismatch > 0 {
            alerts.push(Alert::new(
                Severity::Warning,
                format!(
                    "{} mismatched file(s) detected between source and destination.",
                    summary.files.mismatch + summary.dirs.mismatch
                ),
            ));
        }

        alerts.push(Alert::new(
            Severity::Info,
            format!(
                "Copied {} of {} file(s), {} of {} byte(s); {} skipped.",
                summary.files.copied,
                summary.files.total,
                summary.bytes.copied,
                summary.bytes.total,
                summary.files.skipped
            ),
        ));

        alerts
    }
}

impl LogSummarizer for HeuristicSummarizer {
    fn summarize<'a>(
        &'a self,
        log: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Alert>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.analyze(log)) })
    }
}
