// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, RunnerSection, RunnerSettings};
use crate::errors::{Result, RobomonError};
use crate::exec::args::validate_job;
use crate::types::TransferJob;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RobomonError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let runner = validate_runner(raw.runner)?;
        let job = raw.job.map(TransferJob::from);
        if let Some(job) = &job {
            validate_job(job).map_err(|e| RobomonError::ConfigError(format!("[job]: {e}")))?;
        }
        Ok(ConfigFile::new_unchecked(runner, job))
    }
}

fn validate_runner(section: RunnerSection) -> Result<RunnerSettings> {
    if section.program.trim().is_empty() {
        return Err(RobomonError::ConfigError(
            "[runner].program must not be empty".to_string(),
        ));
    }

    if section.channel_capacity == 0 {
        return Err(RobomonError::ConfigError(
            "[runner].channel_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    let timeout = section
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(|e| RobomonError::ConfigError(format!("[runner].timeout: {e}")))?;

    Ok(RunnerSettings {
        program: section.program,
        channel_capacity: section.channel_capacity,
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::{Operation, Scope};

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.runner, RunnerSettings::default());
        assert!(cfg.job.is_none());
    }

    #[test]
    fn full_file() {
        let cfg = parse(
            r#"
            [runner]
            program = "robocopy.exe"
            channel_capacity = 4
            timeout = "90s"

            [job]
            source = 'C:\data'
            destination = 'D:\backup'
            operation = "move"
            scope = "latest"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.runner.program, "robocopy.exe");
        assert_eq!(cfg.runner.channel_capacity, 4);
        assert_eq!(cfg.runner.timeout, Some(Duration::from_secs(90)));

        let job = cfg.job.unwrap();
        assert_eq!(job.source, "C:\\data");
        assert_eq!(job.operation, Operation::Move);
        assert_eq!(job.scope, Scope::Latest);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = parse("[runner]\nchannel_capacity = 0\n").unwrap_err();
        assert!(matches!(err, RobomonError::ConfigError(_)));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = parse("[runner]\ntimeout = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn injected_job_path_is_rejected() {
        let err = parse("[job]\nsource = \"/MIR\"\ndestination = 'D:\\x'\n").unwrap_err();
        assert!(matches!(err, RobomonError::ConfigError(_)));
    }

    #[test]
    fn unknown_operation_fails_to_deserialize() {
        let err = parse("[job]\nsource = 'a'\ndestination = 'b'\noperation = \"sync\"\n")
            .unwrap_err();
        assert!(matches!(err, RobomonError::TomlError(_)));
    }
}
