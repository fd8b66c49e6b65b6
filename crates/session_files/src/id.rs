use std::fmt;

use uuid::Uuid;

use crate::error::SessionStoreError;

/// Length of generated session ids.
pub const SESSION_ID_LEN: usize = 40;

/// Upper bound accepted for ids arriving from a client.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// A session identifier that is safe to use as a file name component.
///
/// Values are either freshly generated or have passed [`SessionId::parse`], so
/// they only ever contain ASCII letters and digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new 40 character lowercase hex id from two v4 UUIDs.
    #[must_use]
    pub fn generate() -> Self {
        let mut raw = String::with_capacity(64);
        raw.push_str(&Uuid::new_v4().simple().to_string());
        raw.push_str(&Uuid::new_v4().simple().to_string());
        raw.truncate(SESSION_ID_LEN);
        Self(raw)
    }

    /// Validates an id supplied by an untrusted source.
    pub fn parse(raw: &str) -> Result<Self, SessionStoreError> {
        if is_valid_session_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(SessionStoreError::InvalidSessionId { id: raw.to_string() })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[must_use]
pub fn is_valid_session_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_SESSION_ID_LEN
        && raw.chars().all(|c| c.is_ascii_alphanumeric())
}
