use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What happens to the source files once they reach the destination.
///
/// - `Copy`: leave the source untouched (default).
/// - `Move`: delete from the source after a successful copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Copy,
    Move,
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(Operation::Copy),
            "move" => Ok(Operation::Move),
            other => Err(format!(
                "invalid operation: {other} (expected \"copy\" or \"move\")"
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Copy => f.write_str("copy"),
            Operation::Move => f.write_str("move"),
        }
    }
}

/// Which part of the source tree a job transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The whole tree, subdirectories included.
    #[default]
    All,
    /// Only the most recently modified file in the source root.
    Latest,
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Scope::All),
            "latest" | "latest-file" => Ok(Scope::Latest),
            other => Err(format!(
                "invalid scope: {other} (expected \"all\" or \"latest\")"
            )),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all"),
            Scope::Latest => f.write_str("latest"),
        }
    }
}

/// A single transfer request. Immutable once a run has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub source: String,
    pub destination: String,
    pub operation: Operation,
    pub scope: Scope,
}

impl TransferJob {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            operation: Operation::default(),
            scope: Scope::default(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}
