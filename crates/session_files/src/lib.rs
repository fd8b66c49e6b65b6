//! On-disk storage for flat-file sessions.
//!
//! One `<id>.sess` file per session inside a single save directory. Ids are
//! claimed with an exclusive create and contents are replaced whole, so the
//! filesystem alone arbitrates between concurrent requests.

mod error;
mod id;
mod paths;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use id::{is_valid_session_id, SessionId, MAX_SESSION_ID_LEN, SESSION_ID_LEN};
pub use paths::{resolve_save_path, session_file_name, session_id_from_path, SESSION_EXTENSION};
pub use schema::{SessionData, SessionValue};
pub use store::{SessionFiles, MAX_CLAIM_ATTEMPTS};
