// src/exec/args.rs

//! Argument vector construction for the transfer executable.
//!
//! The vector is fully determined by the job: only `source` and
//! `destination` come from the caller, and both are validated so they can
//! never be read as options. The program is always executed directly, never
//! through a shell.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::errors::{Result, RobomonError};
use crate::types::{Operation, Scope, TransferJob};

/// Flags appended to every invocation: verbose listing, 3 retries,
/// 10s between retries, estimated time of arrival.
pub const FIXED_FLAGS: [&str; 4] = ["/V", "/R:3", "/W:10", "/ETA"];

/// Reject paths that are empty or could be parsed as an option by the
/// transfer executable.
pub fn validate_path(label: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(RobomonError::InvalidJob(format!("{label} path is empty")));
    }

    if let Some(lead) = path.trim_start().chars().next().filter(|c| matches!(c, '/' | '-')) {
        return Err(RobomonError::InvalidJob(format!(
            "{label} path '{path}' starts with '{lead}' and would be read as an option"
        )));
    }

    if let Some(bad) = path.chars().find(|c| matches!(c, '\0' | '\r' | '\n' | '"')) {
        return Err(RobomonError::InvalidJob(format!(
            "{label} path contains forbidden character {bad:?}"
        )));
    }

    Ok(())
}

/// Validate both endpoints of a job.
pub fn validate_job(job: &TransferJob) -> Result<()> {
    validate_path("source", &job.source)?;
    validate_path("destination", &job.destination)?;
    Ok(())
}

/// Build the full argument vector for `job`.
///
/// For `Scope::Latest` this touches the filesystem to find the most recently
/// modified file in the source root.
pub fn build_args(job: &TransferJob) -> Result<Vec<String>> {
    validate_job(job)?;

    let latest = match job.scope {
        Scope::All => None,
        Scope::Latest => Some(latest_file_name(Path::new(&job.source))?),
    };

    Ok(assemble(job, latest.as_deref()))
}

/// Pure part of [`build_args`]: `latest` is the file name selected for
/// `Scope::Latest` and ignored otherwise.
pub fn assemble(job: &TransferJob, latest: Option<&str>) -> Vec<String> {
    let mut args = vec![job.source.clone(), job.destination.clone()];

    match (job.operation, job.scope) {
        (Operation::Copy, Scope::All) => args.push("/E".to_string()),
        (Operation::Move, Scope::All) => {
            args.push("/E".to_string());
            args.push("/MOVE".to_string());
        }
        (Operation::Copy, Scope::Latest) => {}
        (Operation::Move, Scope::Latest) => args.push("/MOV".to_string()),
    }

    if job.scope == Scope::Latest {
        if let Some(name) = latest {
            args.push(name.to_string());
        }
    }

    args.extend(FIXED_FLAGS.iter().map(|s| s.to_string()));
    args
}

/// Name of the most recently modified regular file directly inside `root`.
pub fn latest_file_name(root: &Path) -> Result<String> {
    let entries = fs::read_dir(root).map_err(|e| {
        RobomonError::InvalidJob(format!(
            "cannot list source root '{}': {e}",
            root.display()
        ))
    })?;

    let mut best: Option<(SystemTime, String)> = None;

    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }

        let modified = meta.modified()?;
        let name = entry.file_name().to_string_lossy().into_owned();

        let newer = match &best {
            None => true,
            // Ties resolve by name so the choice is stable across listings.
            Some((t, n)) => modified > *t || (modified == *t && name > *n),
        };
        if newer {
            best = Some((modified, name));
        }
    }

    match best {
        Some((_, name)) => {
            validate_path("latest file", &name)?;
            debug!(root = %root.display(), file = %name, "selected latest file");
            Ok(name)
        }
        None => Err(RobomonError::InvalidJob(format!(
            "source root '{}' contains no files",
            root.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn job(op: Operation, scope: Scope) -> TransferJob {
        TransferJob::new(r"\\host\share", r"C:\dest")
            .with_operation(op)
            .with_scope(scope)
    }

    #[test]
    fn copy_all_uses_recursive_flag() {
        let args = assemble(&job(Operation::Copy, Scope::All), None);
        assert_eq!(
            args,
            vec![r"\\host\share", r"C:\dest", "/E", "/V", "/R:3", "/W:10", "/ETA"]
        );
    }

    #[test]
    fn move_toggles_delete_source_flag() {
        let all = assemble(&job(Operation::Move, Scope::All), None);
        assert_eq!(&all[2..4], &["/E", "/MOVE"]);

        let latest = assemble(&job(Operation::Move, Scope::Latest), Some("x.bak"));
        assert_eq!(&latest[2..4], &["/MOV", "x.bak"]);
        assert!(!latest.contains(&"/E".to_string()));
    }

    #[test]
    fn option_looking_paths_are_rejected() {
        for bad in ["", "   ", "/PURGE", "-rf", " /PURGE", "\t-rf", "a\"b", "a\nb"] {
            let j = TransferJob::new(bad, r"C:\dest");
            match validate_job(&j) {
                Err(RobomonError::InvalidJob(_)) => {}
                other => panic!("expected InvalidJob for {bad:?}, got {other:?}"),
            }
        }

        let j = TransferJob::new(r"C:\src", "/MIR");
        assert!(matches!(validate_job(&j), Err(RobomonError::InvalidJob(_))));
    }

    #[test]
    fn latest_file_picks_newest_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);

        for (i, name) in ["old.txt", "newest.txt", "middle.txt"].iter().enumerate() {
            let f = File::create(dir.path().join(name)).unwrap();
            let offset = match i {
                0 => 0,
                1 => 120,
                _ => 60,
            };
            f.set_modified(base + Duration::from_secs(offset)).unwrap();
        }
        fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(latest_file_name(dir.path()).unwrap(), "newest.txt");
    }

    #[test]
    fn latest_file_in_empty_root_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            latest_file_name(dir.path()),
            Err(RobomonError::InvalidJob(_))
        ));
    }
}
