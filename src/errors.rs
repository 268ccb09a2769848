// src/errors.rs

//! Crate-wide error type.
//!
//! Parse anomalies never show up here: the log parser absorbs them locally.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RobomonError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid transfer job: {0}")]
    InvalidJob(String),

    #[error("failed to start '{program}': {source}")]
    StartFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer failed with exit code {}", display_code(.code))]
    RuntimeFailure { code: Option<i32>, stderr: String },

    #[error("output stream error: {0}")]
    StreamError(#[source] std::io::Error),

    #[error("a transfer is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "<none>".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RobomonError>;
