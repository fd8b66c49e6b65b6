use std::path::{Path, PathBuf};

use crate::id::SessionId;

pub const SESSION_EXTENSION: &str = "sess";

#[must_use]
pub fn session_file_name(session_id: &SessionId) -> String {
    format!("{session_id}.{SESSION_EXTENSION}")
}

/// Resolves a configured save directory against the application's content root.
///
/// Absolute paths are returned unchanged.
#[must_use]
pub fn resolve_save_path(content_root: &Path, save_path: &Path) -> PathBuf {
    if save_path.is_absolute() {
        save_path.to_path_buf()
    } else {
        content_root.join(save_path)
    }
}

/// Recovers the session id from a `<id>.sess` file name.
#[must_use]
pub fn session_id_from_path(path: &Path) -> Option<SessionId> {
    if path.extension()? != SESSION_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    SessionId::parse(stem).ok()
}
