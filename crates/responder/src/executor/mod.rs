//! Recovery Executor
//!
//! Runs the playbook behind a recovery action and reports the outcome as a
//! value. Nothing past this boundary ever sees an error from a run.

mod ansible;

pub use ansible::AnsibleExecutor;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::actions::Playbook;

/// Output text reported when a run exceeds its time budget.
pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Context handed to the playbook as a single `--extra-vars` JSON object.
pub type ExtraVars = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("exited with status {code:?}")]
    NonZeroExit { code: Option<i32> },
    #[error("failed to launch: {0}")]
    Launch(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result of one playbook run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// True only for a zero exit status inside the timeout.
    pub success: bool,
    /// Stdout on success, diagnostic text otherwise.
    pub output: String,
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: ExecutionError, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error),
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self::failed(ExecutionError::Timeout(after), TIMEOUT_MESSAGE)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, Some(ExecutionError::Timeout(_)))
    }
}

/// Anything able to run a recovery playbook.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybookRunner: Send + Sync {
    async fn run(&self, playbook: &Playbook, extra_vars: &ExtraVars) -> ExecutionResult;
}
