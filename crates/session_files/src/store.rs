use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;

use crate::error::SessionStoreError;
use crate::id::SessionId;
use crate::paths::{session_file_name, session_id_from_path};
use crate::schema::{self, SessionData};

/// Bound on fresh-id attempts before [`SessionFiles::claim`] gives up.
pub const MAX_CLAIM_ATTEMPTS: usize = 64;

/// One directory holding a `<id>.sess` file per session.
///
/// Every mutation is either an exclusive create or a whole-file replace, so
/// concurrent readers see the previous contents or the new ones, never a mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    root: PathBuf,
}

impl SessionFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the save directory has been provisioned.
    #[must_use]
    pub fn root_exists(&self) -> bool {
        self.root.is_dir()
    }

    #[must_use]
    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_file_name(session_id))
    }

    #[must_use]
    pub fn exists(&self, session_id: &SessionId) -> bool {
        self.path_for(session_id).is_file()
    }

    /// Allocates a fresh id and reserves it with an empty placeholder file.
    pub fn claim(&self) -> Result<SessionId, SessionStoreError> {
        self.claim_with(SessionId::generate)
    }

    /// Like [`claim`](Self::claim) with a caller-supplied id source.
    ///
    /// Only an `AlreadyExists` failure leads to another attempt; any other I/O
    /// error is returned immediately.
    pub fn claim_with(
        &self,
        mut next_id: impl FnMut() -> SessionId,
    ) -> Result<SessionId, SessionStoreError> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let session_id = next_id();
            match self.reserve(&session_id) {
                Ok(()) => {
                    tracing::debug!(session_id = %session_id, "claimed session file");
                    return Ok(session_id);
                }
                Err(SessionStoreError::IdentifierTaken { .. }) => {
                    tracing::debug!(session_id = %session_id, "session id collision, retrying");
                }
                Err(error) => return Err(error),
            }
        }

        Err(SessionStoreError::ClaimExhausted {
            root: self.root.clone(),
            attempts: MAX_CLAIM_ATTEMPTS,
        })
    }

    /// Creates the placeholder for `session_id`, failing if any file already holds the name.
    pub fn reserve(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let path = self.path_for(session_id);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(()),
            Err(source) if source.kind() == ErrorKind::AlreadyExists => {
                Err(SessionStoreError::IdentifierTaken {
                    id: session_id.to_string(),
                })
            }
            Err(source) => Err(SessionStoreError::io(
                "creating session placeholder",
                path,
                source,
            )),
        }
    }

    pub fn load(&self, session_id: &SessionId) -> Result<SessionData, SessionStoreError> {
        let path = self.path_for(session_id);
        let bytes = fs::read(&path)
            .map_err(|source| SessionStoreError::io("reading session file", &path, source))?;
        schema::decode(&bytes).map_err(|source| SessionStoreError::decode(&path, source))
    }

    /// Replaces the session file with the encoding of `data`.
    ///
    /// The bytes go to a temporary file in the same directory which is then
    /// renamed over the target.
    pub fn write(
        &self,
        session_id: &SessionId,
        data: &SessionData,
    ) -> Result<(), SessionStoreError> {
        let path = self.path_for(session_id);
        let bytes =
            schema::encode(data).map_err(|source| SessionStoreError::encode(&path, source))?;

        let mut staged = NamedTempFile::new_in(&self.root).map_err(|source| {
            SessionStoreError::io("creating staging file", &self.root, source)
        })?;
        staged
            .write_all(&bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|source| {
                SessionStoreError::io("writing staging file", staged.path(), source)
            })?;
        staged
            .persist(&path)
            .map_err(|error| SessionStoreError::io("replacing session file", &path, error.error))?;

        tracing::debug!(session_id = %session_id, bytes = bytes.len(), "wrote session file");
        Ok(())
    }

    /// Deletes the session file. Returns `false` when there was nothing to delete.
    pub fn remove(&self, session_id: &SessionId) -> Result<bool, SessionStoreError> {
        let path = self.path_for(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SessionStoreError::io("removing session file", path, source)),
        }
    }

    /// Moves the file for `from` to the name for `to`.
    ///
    /// `to` is reserved exclusively first so the move can never clobber
    /// another live session. If the move fails the reservation is released.
    pub fn relocate(&self, from: &SessionId, to: &SessionId) -> Result<(), SessionStoreError> {
        self.reserve(to)?;

        let source_path = self.path_for(from);
        let target_path = self.path_for(to);
        if let Err(source) = fs::rename(&source_path, &target_path) {
            if let Err(cleanup) = fs::remove_file(&target_path) {
                tracing::warn!(
                    path = %target_path.display(),
                    error = %cleanup,
                    "failed to release session reservation"
                );
            }
            return Err(SessionStoreError::io(
                "renaming session file",
                source_path,
                source,
            ));
        }

        tracing::debug!(from = %from, to = %to, "relocated session file");
        Ok(())
    }

    /// Ids of every `.sess` file in the directory.
    pub fn ids(&self) -> Result<Vec<SessionId>, SessionStoreError> {
        let entries = fs::read_dir(&self.root).map_err(|source| {
            SessionStoreError::io("listing session directory", &self.root, source)
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("listing session directory", &self.root, source)
            })?;
            if let Some(session_id) = session_id_from_path(&entry.path()) {
                ids.push(session_id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Deletes session files not modified within `max_idle`. Returns how many were removed.
    ///
    /// Files that vanish or cannot be inspected mid-sweep are skipped.
    pub fn sweep(&self, max_idle: Duration) -> Result<usize, SessionStoreError> {
        self.sweep_at(SystemTime::now(), max_idle)
    }

    pub fn sweep_at(
        &self,
        now: SystemTime,
        max_idle: Duration,
    ) -> Result<usize, SessionStoreError> {
        let mut removed = 0;
        for session_id in self.ids()? {
            let path = self.path_for(&session_id);
            let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(error) => {
                    tracing::debug!(
                        path = %path.display(),
                        error = %error,
                        "skipping session file during sweep"
                    );
                    continue;
                }
            };

            let idle = now.duration_since(modified).unwrap_or_default();
            if idle <= max_idle {
                continue;
            }

            match self.remove(&session_id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %error,
                        "failed to sweep session file"
                    );
                }
            }
        }

        tracing::info!(root = %self.root.display(), removed, "swept idle session files");
        Ok(removed)
    }
}
