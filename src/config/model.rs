// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::runner::DEFAULT_PROGRAM;
use crate::exec::stream::DEFAULT_CHANNEL_CAPACITY;
use crate::types::{Operation, Scope, TransferJob};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [runner]
/// program = "robocopy"
/// channel_capacity = 32
/// timeout = "2h"
///
/// [job]
/// source = '\\server\share\data'
/// destination = 'D:\backup'
/// operation = "copy"
/// scope = "all"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub job: Option<JobSection>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Executable to launch, resolved via `PATH`.
    #[serde(default = "default_program")]
    pub program: String,

    /// Capacity of the bounded stdout chunk channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Optional watchdog, e.g. `"2h"`. The run is cancelled when it expires.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            channel_capacity: default_channel_capacity(),
            timeout: None,
        }
    }
}

/// `[job]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSection {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default)]
    pub scope: Scope,
}

impl From<JobSection> for TransferJob {
    fn from(section: JobSection) -> Self {
        TransferJob::new(section.source, section.destination)
            .with_operation(section.operation)
            .with_scope(section.scope)
    }
}

/// Validated runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub program: String,
    pub channel_capacity: usize,
    pub timeout: Option<Duration>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            channel_capacity: default_channel_capacity(),
            timeout: None,
        }
    }
}

/// Validated configuration.
///
/// Only built through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// [`ConfigFile::new_unchecked`] by callers that validated on their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub runner: RunnerSettings,
    pub job: Option<TransferJob>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(runner: RunnerSettings, job: Option<TransferJob>) -> Self {
        Self { runner, job }
    }
}
