#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use flatfile_session::{MemoryRequest, SessionConfig, SessionFactory, SessionStore};
use tempfile::TempDir;

pub const KEY: &str = "UfrontSessionID";

/// Installs a test-friendly subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A content root in a temp dir with a provisioned `sessions/` directory.
pub struct Fixture {
    pub root: TempDir,
    pub factory: SessionFactory,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        init_tracing();
        let root = tempfile::tempdir().expect("tempdir should be created");
        let factory = SessionFactory::new(&config, root.path());
        fs::create_dir_all(factory.save_dir()).expect("session dir should be created");
        Self { root, factory }
    }

    pub fn session_dir(&self) -> &Path {
        self.factory.save_dir()
    }

    pub fn session_path(&self, id: &str) -> PathBuf {
        self.session_dir().join(format!("{id}.sess"))
    }

    pub fn write_raw(&self, id: &str, contents: &[u8]) {
        fs::write(self.session_path(id), contents).expect("session file should be written");
    }

    pub fn read_json(&self, id: &str) -> serde_json::Value {
        let bytes = fs::read(self.session_path(id)).expect("session file should be readable");
        serde_json::from_slice(&bytes).expect("session file should hold valid json")
    }

    /// Names of `.sess` files in the session dir, sorted.
    pub fn session_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.session_dir())
            .expect("session dir should be readable")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".sess"))
            .collect();
        names.sort();
        names
    }

    pub fn anonymous(&self) -> SessionStore<MemoryRequest> {
        self.factory.create(MemoryRequest::new())
    }

    pub fn with_cookie(&self, id: &str) -> SessionStore<MemoryRequest> {
        self.factory.create(MemoryRequest::new().with_cookie(KEY, id))
    }

    pub fn with_param(&self, id: &str) -> SessionStore<MemoryRequest> {
        self.factory.create(MemoryRequest::new().with_param(KEY, id))
    }
}

pub fn is_generated_id(value: &str) -> bool {
    value.len() == flatfile_session::SESSION_ID_LEN
        && value.chars().all(|c| c.is_ascii_alphanumeric())
}
