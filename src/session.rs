//! The per-request session object.
//!
//! A [`SessionStore`] starts out unresolved. The first data access runs
//! [`init`](SessionStore::init), which either restores the file named by the
//! request's session id or claims a fresh id and queues its cookie. Mutations
//! stay in memory and only reach disk when the request pipeline calls
//! [`commit`](SessionStore::commit).
//!
//! Two requests carrying the same id each load their own copy of the data and
//! the later commit wins; nothing merges or locks across requests.

use std::cell::OnceCell;
use std::fmt;

use session_files::{SessionData, SessionFiles, SessionId, SessionStoreError, SessionValue};
use time::OffsetDateTime;

use crate::cookie::SetCookie;
use crate::error::{CommitFailure, SessionError};
use crate::request::RequestContext;

/// A side effect applied by [`SessionStore::commit`], listed in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitAction {
    Regenerate,
    WriteData,
    UpdateExpiry,
    Close,
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Regenerate => "regenerate",
            Self::WriteData => "write data",
            Self::UpdateExpiry => "update expiry",
            Self::Close => "close",
        })
    }
}

/// The actions a successful [`SessionStore::commit`] carried out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    applied: Vec<CommitAction>,
}

impl CommitReport {
    #[must_use]
    pub fn applied(&self) -> &[CommitAction] {
        &self.applied
    }

    #[must_use]
    pub fn contains(&self, action: CommitAction) -> bool {
        self.applied.contains(&action)
    }

    /// True when nothing was pending.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Regeneration {
    from: SessionId,
    to: SessionId,
}

pub struct SessionStore<C> {
    context: C,
    files: SessionFiles,
    key_name: String,
    expiry_seconds: u64,

    /// Raw id from the request, looked up at most once.
    requested: OnceCell<Option<String>>,
    current: Option<SessionId>,
    data: Option<SessionData>,

    started: bool,
    closed: bool,
    commit_pending: bool,
    close_pending: bool,
    regenerate_pending: bool,
    expiry_change_pending: bool,

    regeneration: Option<Regeneration>,
    closing: Vec<SessionId>,
}

impl<C: RequestContext> SessionStore<C> {
    pub(crate) fn new(
        context: C,
        files: SessionFiles,
        key_name: String,
        expiry_seconds: u64,
    ) -> Self {
        Self {
            context,
            files,
            key_name,
            expiry_seconds,
            requested: OnceCell::new(),
            current: None,
            data: None,
            started: false,
            closed: false,
            commit_pending: false,
            close_pending: false,
            regenerate_pending: false,
            expiry_change_pending: false,
            regeneration: None,
            closing: Vec::new(),
        }
    }

    /// The active session id.
    ///
    /// Before `init` this is the raw value of the session cookie, or of the
    /// request parameter with the same name when there is no cookie. It has not
    /// been validated yet. After `close` there is no id until a new session starts.
    pub fn get_id(&self) -> Option<&str> {
        if let Some(current) = &self.current {
            return Some(current.as_str());
        }
        if self.closed {
            return None;
        }
        self.requested
            .get_or_init(|| self.lookup_request_id())
            .as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.get_id().is_some()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The id recorded by [`regenerate_id`](Self::regenerate_id), until the next commit.
    #[must_use]
    pub fn previous_id(&self) -> Option<&str> {
        self.regeneration
            .as_ref()
            .map(|regeneration| regeneration.from.as_str())
    }

    /// The in-memory mapping, `None` before `init` and after `close`.
    #[must_use]
    pub fn data(&self) -> Option<&SessionData> {
        self.data.as_ref()
    }

    /// Actions the next [`commit`](Self::commit) will evaluate.
    #[must_use]
    pub fn pending_actions(&self) -> Vec<CommitAction> {
        [
            (self.regenerate_pending, CommitAction::Regenerate),
            (self.commit_pending, CommitAction::WriteData),
            (self.expiry_change_pending, CommitAction::UpdateExpiry),
            (self.close_pending, CommitAction::Close),
        ]
        .into_iter()
        .filter_map(|(pending, action)| pending.then_some(action))
        .collect()
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Restores or creates the session. Calling it again once started does nothing.
    ///
    /// A requested id whose file is missing, unreadable or undecodable is
    /// dropped and a new session takes its place. A requested id containing
    /// anything but ASCII letters and digits is rejected outright.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if self.started {
            return Ok(());
        }

        if !self.files.root_exists() {
            return Err(SessionError::MissingSaveDirectory {
                path: self.files.root().to_path_buf(),
            });
        }

        if let Some(raw) = self.get_id().map(str::to_owned) {
            let session_id = SessionId::parse(&raw).map_err(SessionError::InvalidSessionId)?;
            if self.restore(session_id) {
                return Ok(());
            }
        }

        self.start_new_session()
    }

    /// Value stored under `key`.
    ///
    /// # Panics
    ///
    /// Panics if the session has not been started with [`init`](Self::init).
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.require_started("get");
        self.data.as_ref().and_then(|data| data.get(key))
    }

    /// Stores `value` under `key`, starting the session first if needed.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SessionValue>,
    ) -> Result<(), SessionError> {
        self.init()?;
        if let Some(data) = self.data.as_mut() {
            data.insert(key.into(), value.into());
        }
        self.commit_pending = true;
        Ok(())
    }

    /// Whether `key` is stored. Always false when the request carries no session id.
    ///
    /// # Panics
    ///
    /// Panics if a session id is present but [`init`](Self::init) has not run.
    pub fn exists(&self, key: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        self.require_started("exists");
        self.data
            .as_ref()
            .is_some_and(|data| data.contains_key(key))
    }

    /// # Panics
    ///
    /// Panics if the session has not been started with [`init`](Self::init).
    pub fn remove(&mut self, key: &str) -> Option<SessionValue> {
        self.require_started("remove");
        self.commit_pending = true;
        self.data.as_mut().and_then(|data| data.remove(key))
    }

    /// Empties the mapping of an active session. Does nothing otherwise.
    pub fn clear(&mut self) {
        if self.data.is_some() && self.is_active() {
            self.data = Some(SessionData::new());
            self.commit_pending = true;
        }
    }

    /// Assigns a new id to the session and returns it.
    ///
    /// The file keeps its old name until [`commit`](Self::commit) moves it.
    /// Calling this twice before a commit replaces the first new id but keeps
    /// the original one as the file to move.
    pub fn regenerate_id(&mut self) -> Result<SessionId, SessionError> {
        self.init()?;

        let to = SessionId::generate();
        let from = match self.regeneration.take() {
            Some(pending) => pending.from,
            None => match self.current.clone() {
                Some(current) => current,
                None => return Ok(to),
            },
        };

        tracing::debug!(from = %from, to = %to, "queued session id regeneration");
        self.current = Some(to.clone());
        self.regeneration = Some(Regeneration { from, to: to.clone() });
        self.regenerate_pending = true;
        Ok(to)
    }

    /// Tears the session down: drops the data and id now, and deletes the file
    /// and expires the client's cookie at commit.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.closed && !self.started {
            return Ok(());
        }
        self.init()?;

        // A pending regeneration never moved the file, so it still lives under `from`.
        if let Some(pending) = self.regeneration.take() {
            self.regenerate_pending = false;
            self.current = None;
            self.closing.push(pending.from);
        } else if let Some(current) = self.current.take() {
            self.closing.push(current);
        }
        self.data = None;
        self.started = false;
        self.closed = true;
        self.close_pending = true;
        self.commit_pending = true;
        Ok(())
    }

    /// Changes the cookie lifetime; the cookie is re-issued at commit.
    ///
    /// Does not start the session. Without an active id, or after `close`,
    /// there is no cookie to re-issue and commit skips the update.
    pub fn set_expiry(&mut self, expiry_seconds: u64) {
        self.expiry_seconds = expiry_seconds;
        self.expiry_change_pending = true;
    }

    /// Flushes pending work to disk and to the response.
    ///
    /// Runs regeneration, the data write, the expiry update and close in that
    /// order. A failing step does not stop the ones after it; every failure is
    /// collected into [`SessionError::Commit`]. All pending flags are cleared.
    pub fn commit(&mut self) -> Result<CommitReport, SessionError> {
        let mut report = CommitReport::default();
        let mut failures = Vec::new();
        let mut cookie_issued = false;

        if std::mem::take(&mut self.regenerate_pending) {
            if let Some(regeneration) = self.regeneration.take() {
                match self.apply_regeneration(&regeneration) {
                    Ok(issued) => {
                        cookie_issued = issued;
                        report.applied.push(CommitAction::Regenerate);
                    }
                    Err(source) => {
                        self.revert_regeneration(&regeneration);
                        failures.push(CommitFailure {
                            action: CommitAction::Regenerate,
                            source,
                        });
                    }
                }
            }
        }

        if std::mem::take(&mut self.commit_pending) && self.data.is_some() {
            match self.write_data() {
                Ok(()) => report.applied.push(CommitAction::WriteData),
                Err(source) => failures.push(CommitFailure {
                    action: CommitAction::WriteData,
                    source,
                }),
            }
        }

        if std::mem::take(&mut self.expiry_change_pending) {
            if cookie_issued {
                report.applied.push(CommitAction::UpdateExpiry);
            } else if let Some(session_id) = self.expiry_target() {
                self.queue_session_cookie(&session_id);
                report.applied.push(CommitAction::UpdateExpiry);
            }
        }

        if std::mem::take(&mut self.close_pending) {
            let mut close_failed = false;
            for session_id in std::mem::take(&mut self.closing) {
                match self.files.remove(&session_id) {
                    Ok(existed) => {
                        tracing::info!(session_id = %session_id, existed, "closed session");
                    }
                    Err(source) => {
                        close_failed = true;
                        failures.push(CommitFailure {
                            action: CommitAction::Close,
                            source,
                        });
                    }
                }
            }
            if self.current.is_none() {
                self.context.set_cookie(SetCookie::removal(&self.key_name));
            }
            if !close_failed {
                report.applied.push(CommitAction::Close);
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SessionError::Commit { failures })
        }
    }

    fn lookup_request_id(&self) -> Option<String> {
        let found = self
            .context
            .cookie(&self.key_name)
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.context
                    .param(&self.key_name)
                    .filter(|value| !value.is_empty())
            });
        if let Some(raw) = &found {
            tracing::debug!(session_id = %raw, "resolved session id from request");
        }
        found
    }

    /// Loads an existing session. Returns false when the id is unusable, after
    /// discarding whatever file it named.
    fn restore(&mut self, session_id: SessionId) -> bool {
        match self.files.load(&session_id) {
            Ok(data) => {
                tracing::debug!(session_id = %session_id, keys = data.len(), "restored session");
                self.data = Some(data);
                self.current = Some(session_id);
                self.started = true;
                true
            }
            Err(error) if error.is_not_found() => {
                tracing::debug!(session_id = %session_id, "no file for requested session id");
                false
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %error,
                    "discarding unreadable session file"
                );
                if let Err(error) = self.files.remove(&session_id) {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %error,
                        "failed to delete unreadable session file"
                    );
                }
                false
            }
        }
    }

    fn start_new_session(&mut self) -> Result<(), SessionError> {
        let session_id = self.files.claim()?;
        self.begin_session(session_id)
    }

    /// Replaces the claimed placeholder with an empty mapping. Store state and
    /// the cookie change only once that write has landed.
    fn begin_session(&mut self, session_id: SessionId) -> Result<(), SessionError> {
        let data = SessionData::new();
        if let Err(error) = self.files.write(&session_id, &data) {
            if let Err(cleanup) = self.files.remove(&session_id) {
                tracing::warn!(
                    session_id = %session_id,
                    error = %cleanup,
                    "failed to release claimed session id"
                );
            }
            return Err(error.into());
        }

        self.data = Some(data);
        self.current = Some(session_id.clone());
        self.queue_session_cookie(&session_id);
        self.started = true;
        tracing::debug!(session_id = %session_id, "started new session");
        Ok(())
    }

    /// The id whose cookie an expiry change re-issues: the active id, or the
    /// requested one when the session was never initialized.
    fn expiry_target(&self) -> Option<SessionId> {
        let raw = self.get_id()?;
        match SessionId::parse(raw) {
            Ok(session_id) => Some(session_id),
            Err(error) => {
                tracing::debug!(error = %error, "not re-issuing cookie for invalid session id");
                None
            }
        }
    }

    fn write_data(&self) -> Result<(), SessionStoreError> {
        match (&self.current, &self.data) {
            (Some(session_id), Some(data)) => self.files.write(session_id, data),
            _ => Ok(()),
        }
    }

    /// Moves the file to the new id. Returns whether a cookie for it was queued.
    fn apply_regeneration(
        &mut self,
        regeneration: &Regeneration,
    ) -> Result<bool, SessionStoreError> {
        self.files.relocate(&regeneration.from, &regeneration.to)?;
        tracing::info!(from = %regeneration.from, to = %regeneration.to, "regenerated session id");

        if self.current.as_ref() == Some(&regeneration.to) {
            self.queue_session_cookie(&regeneration.to);
            return Ok(true);
        }
        Ok(false)
    }

    /// Points everything that referred to the new id back at the old one, so a
    /// failed move never leads to writing or deleting a file this session does not own.
    fn revert_regeneration(&mut self, regeneration: &Regeneration) {
        if self.current.as_ref() == Some(&regeneration.to) {
            self.current = Some(regeneration.from.clone());
        }
        for session_id in &mut self.closing {
            if *session_id == regeneration.to {
                *session_id = regeneration.from.clone();
            }
        }
    }

    fn queue_session_cookie(&mut self, session_id: &SessionId) {
        let cookie = SetCookie::session(
            &self.key_name,
            session_id.as_str(),
            self.expiry_seconds,
            OffsetDateTime::now_utc(),
        );
        self.context.set_cookie(cookie);
    }

    fn require_started(&self, operation: &'static str) {
        assert!(
            self.started,
            "session {operation}() called before init(); run init() or set() first"
        );
    }
}

impl<C> fmt::Debug for SessionStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("root", &self.files.root())
            .field("key_name", &self.key_name)
            .field("current", &self.current)
            .field("started", &self.started)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::request::MemoryRequest;

    #[test]
    fn failed_initial_write_leaves_store_unstarted() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let files = SessionFiles::new(dir.path().join("sessions"));
        fs::create_dir(files.root()).expect("session dir should be created");
        let mut store = SessionStore::new(
            MemoryRequest::new(),
            files.clone(),
            "sid".to_string(),
            0,
        );
        let session_id = files.claim().expect("claim should succeed");
        fs::remove_dir_all(files.root()).expect("session dir should be removed");

        let error = store
            .begin_session(session_id)
            .expect_err("write into missing dir must fail");

        assert!(matches!(error, SessionError::Store(SessionStoreError::Io { .. })));
        assert!(!store.is_started());
        assert!(store.data().is_none());
        assert_eq!(store.get_id(), None);
        assert!(store.context().queued_cookies().is_empty());
        assert!(store.pending_actions().is_empty());
    }
}
