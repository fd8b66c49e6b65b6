use std::path::PathBuf;

use session_files::SessionStoreError;
use thiserror::Error;

use crate::session::CommitAction;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session save directory {path} does not exist; it must be created before use")]
    MissingSaveDirectory { path: PathBuf },

    #[error("rejected session id from the request: {0}")]
    InvalidSessionId(#[source] SessionStoreError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("{}", describe_failures(.failures))]
    Commit { failures: Vec<CommitFailure> },
}

#[derive(Debug, Error)]
#[error("{action} failed: {source}")]
pub struct CommitFailure {
    pub action: CommitAction,
    #[source]
    pub source: SessionStoreError,
}

impl SessionError {
    /// The failed commit actions, empty for any other error.
    #[must_use]
    pub fn commit_failures(&self) -> &[CommitFailure] {
        match self {
            Self::Commit { failures } => failures,
            _ => &[],
        }
    }
}

fn describe_failures(failures: &[CommitFailure]) -> String {
    let details = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "session commit failed ({} of its actions): {details}",
        failures.len()
    )
}
