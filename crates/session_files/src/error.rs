use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode session data in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode session data for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("session id '{id}' must be 1..={max} ASCII alphanumeric characters", max = crate::id::MAX_SESSION_ID_LEN)]
    InvalidSessionId { id: String },

    #[error("session id '{id}' already has a file on disk")]
    IdentifierTaken { id: String },

    #[error("gave up claiming a fresh session file under {root} after {attempts} attempts")]
    ClaimExhausted { root: PathBuf, attempts: usize },
}

impl SessionStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn decode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn encode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    /// True when the failure means the file is absent rather than unusable.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
