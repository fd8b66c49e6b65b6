//! Session configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SAVE_PATH: &str = "sessions/";
pub const DEFAULT_SESSION_KEY_NAME: &str = "UfrontSessionID";

pub const SAVE_PATH_ENV: &str = "SESSION_SAVE_PATH";
pub const KEY_NAME_ENV: &str = "SESSION_KEY_NAME";
pub const EXPIRY_ENV: &str = "SESSION_EXPIRY_SECONDS";
pub const RETENTION_ENV: &str = "SESSION_RETENTION_SECONDS";

/// Settings shared by every session a [`SessionFactory`](crate::SessionFactory) creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory holding the session files. Relative paths are resolved
    /// against the content root when the factory is built.
    pub save_path: PathBuf,
    /// Name of both the cookie and the fallback request parameter.
    pub session_key_name: String,
    /// Lifetime hint for the client's cookie; `0` means a browser-session cookie.
    pub expiry_seconds: u64,
    /// Idle window after which [`SessionFactory::sweep_expired`](crate::SessionFactory::sweep_expired)
    /// deletes a session file. `None` keeps files forever.
    pub retention: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from(DEFAULT_SAVE_PATH),
            session_key_name: DEFAULT_SESSION_KEY_NAME.to_string(),
            expiry_seconds: 0,
            retention: None,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by any non-empty `SESSION_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(save_path) = env_string_opt(SAVE_PATH_ENV) {
            config.save_path = PathBuf::from(save_path);
        }
        if let Some(key_name) = env_string_opt(KEY_NAME_ENV) {
            config.session_key_name = key_name;
        }
        if let Some(expiry_seconds) = env_u64_opt(EXPIRY_ENV) {
            config.expiry_seconds = expiry_seconds;
        }
        if let Some(retention) = env_u64_opt(RETENTION_ENV) {
            config.retention = Some(Duration::from_secs(retention));
        }
        config
    }

    pub fn with_save_path(mut self, save_path: impl Into<PathBuf>) -> Self {
        self.save_path = save_path.into();
        self
    }

    pub fn with_session_key_name(mut self, session_key_name: impl Into<String>) -> Self {
        self.session_key_name = session_key_name.into();
        self
    }

    pub fn with_expiry_seconds(mut self, expiry_seconds: u64) -> Self {
        self.expiry_seconds = expiry_seconds;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u64_opt(key: &str) -> Option<u64> {
    let raw = env_string_opt(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, value = %raw, error = %error, "ignoring unparseable session setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn env_defaults_match_documented_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard(SAVE_PATH_ENV, None);
        let _g2 = set_env_guard(KEY_NAME_ENV, None);
        let _g3 = set_env_guard(EXPIRY_ENV, None);
        let _g4 = set_env_guard(RETENTION_ENV, None);

        let config = SessionConfig::from_env();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.save_path, PathBuf::from("sessions/"));
        assert_eq!(config.session_key_name, "UfrontSessionID");
        assert_eq!(config.expiry_seconds, 0);
        assert!(config.retention.is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard(SAVE_PATH_ENV, Some("/var/lib/app/sessions"));
        let _g2 = set_env_guard(KEY_NAME_ENV, Some("SID"));
        let _g3 = set_env_guard(EXPIRY_ENV, Some("3600"));
        let _g4 = set_env_guard(RETENTION_ENV, Some(" 86400 "));

        let config = SessionConfig::from_env();
        assert_eq!(config.save_path, PathBuf::from("/var/lib/app/sessions"));
        assert_eq!(config.session_key_name, "SID");
        assert_eq!(config.expiry_seconds, 3600);
        assert_eq!(config.retention, Some(Duration::from_secs(86400)));
    }

    #[test]
    fn empty_and_unparseable_values_are_ignored() {
        let _lock = env_lock();
        let _g1 = set_env_guard(SAVE_PATH_ENV, Some("  "));
        let _g2 = set_env_guard(KEY_NAME_ENV, Some(""));
        let _g3 = set_env_guard(EXPIRY_ENV, Some("soon"));
        let _g4 = set_env_guard(RETENTION_ENV, Some("-5"));

        let config = SessionConfig::from_env();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn builder_methods_set_fields() {
        let config = SessionConfig::default()
            .with_save_path("/tmp/s")
            .with_session_key_name("sid")
            .with_expiry_seconds(60)
            .with_retention(Duration::from_secs(120));
        assert_eq!(config.save_path, PathBuf::from("/tmp/s"));
        assert_eq!(config.session_key_name, "sid");
        assert_eq!(config.expiry_seconds, 60);
        assert_eq!(config.retention, Some(Duration::from_secs(120)));
    }
}
