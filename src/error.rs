use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::Stage;

/// Failures raised by the individual update steps.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("network error: {context}")]
    Network {
        context: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("unexpected release URL '{0}': no version marker '/v' found")]
    MalformedResponse(String),

    #[error(
        "no installed version found (state file {}, server log {})",
        .state_file.display(),
        .log_file.display()
    )]
    StateUnavailable {
        state_file: PathBuf,
        log_file: PathBuf,
    },

    #[error("failed to {action} {}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive {}: {reason}", .path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("backup of {} failed: {reason}", .path.display())]
    Backup { path: PathBuf, reason: String },
}

impl UpdateError {
    pub(crate) fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            context: context.into(),
            source: Some(source),
        }
    }

    pub(crate) fn http_status(url: &str, status: reqwest::StatusCode) -> Self {
        Self::Network {
            context: format!("GET {} returned {}", url, status),
            source: None,
        }
    }

    pub(crate) fn filesystem(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn backup(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Backup {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// An update that stopped part-way, with enough context for manual recovery.
#[derive(Debug, Error)]
#[error("{} failed; {}", .failed.label(), recovery_note(.completed))]
pub struct UpdateFailure {
    pub failed: Stage,
    pub completed: Option<Stage>,
    #[source]
    pub source: UpdateError,
}

fn recovery_note(completed: &Option<Stage>) -> &'static str {
    match completed {
        Some(stage) => stage.recovery_note(),
        None => "nothing was changed",
    }
}
