use std::path::Path;

use session_files::{resolve_save_path, SessionFiles};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::request::RequestContext;
use crate::session::SessionStore;

/// Builds a [`SessionStore`] for each request from one fixed configuration.
///
/// Construct one factory per distinct [`SessionConfig`] at startup and hand it
/// (or a clone) to request handling. A different configuration needs a new
/// factory; an existing one never changes.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    files: SessionFiles,
    config: SessionConfig,
}

impl SessionFactory {
    /// Resolves a relative `save_path` against `content_root` once, up front.
    pub fn new(config: &SessionConfig, content_root: &Path) -> Self {
        let root = resolve_save_path(content_root, &config.save_path);
        tracing::debug!(
            root = %root.display(),
            key = %config.session_key_name,
            "session factory configured"
        );
        Self {
            files: SessionFiles::new(root),
            config: config.clone(),
        }
    }

    pub fn create<C: RequestContext>(&self, context: C) -> SessionStore<C> {
        SessionStore::new(
            context,
            self.files.clone(),
            self.config.session_key_name.clone(),
            self.config.expiry_seconds,
        )
    }

    /// The configuration this factory was built from.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The session directory after resolving against the content root.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        self.files.root()
    }

    /// Deletes session files idle for longer than the configured retention.
    ///
    /// Returns the number removed. Without a retention window this does nothing.
    pub fn sweep_expired(&self) -> Result<usize, SessionError> {
        let Some(retention) = self.config.retention else {
            return Ok(0);
        };
        if !self.files.root_exists() {
            return Err(SessionError::MissingSaveDirectory {
                path: self.files.root().to_path_buf(),
            });
        }
        Ok(self.files.sweep(retention)?)
    }
}
