//! Flat-file session state for request/response servers.
//!
//! Invariant: one session file per id, claimed with an exclusive create and
//! only ever replaced whole, so the save directory is the sole coordination point
//! between concurrent requests.
//!
//! # Public API Overview
//! - Build a [`SessionFactory`] once per [`SessionConfig`] at startup.
//! - Call [`SessionFactory::create`] with each request's [`RequestContext`] to get a [`SessionStore`].
//! - Read and write values through the store, then call [`SessionStore::commit`] before
//!   the response goes out.
//! - Render queued [`SetCookie`] instructions with [`SetCookie::header_value`].

pub mod config;
pub mod cookie;
pub mod error;
pub mod factory;
pub mod request;
pub mod session;

/// Configuration and its defaults.
pub use crate::config::{SessionConfig, DEFAULT_SAVE_PATH, DEFAULT_SESSION_KEY_NAME};
/// Response cookie instructions.
pub use crate::cookie::SetCookie;
/// Engine errors.
pub use crate::error::{CommitFailure, SessionError};
/// Per-request store construction.
pub use crate::factory::SessionFactory;
/// The request/response boundary.
pub use crate::request::{MemoryRequest, RequestContext};
/// The per-request session object and its commit outcome.
pub use crate::session::{CommitAction, CommitReport, SessionStore};

/// On-disk layer re-exports.
pub use session_files::{
    SessionData, SessionFiles, SessionId, SessionStoreError, SessionValue, SESSION_ID_LEN,
};
