//! JSON state files under the platform config directory.
//!
//! `state_path("myapp", "state.json")` resolves to
//! `~/.config/myapp/state.json` on Linux, `~/Library/Application Support/myapp/state.json`
//! on macOS and `%APPDATA%\myapp\state.json` on Windows.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use service_kit::{state, Error};
//!
//! #[derive(Serialize, Deserialize, Default)]
//! struct AppState {
//!     last_file: String,
//!     visit_count: u32,
//! }
//!
//! # fn main() -> service_kit::Result<()> {
//! let mut current = match state::load_state::<AppState>("myapp", "state.json") {
//!     Ok(s) => s,
//!     Err(Error::StateNotFound(_)) => AppState::default(),
//!     Err(e) => return Err(e),
//! };
//! current.visit_count += 1;
//! state::save_state("myapp", "state.json", &current)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use directories::BaseDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// State files rooted at a directory.
#[derive(Clone, Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        StateStore { dir: dir.into() }
    }

    /// Store for `app` under the platform config directory.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if no home directory can be determined.
    pub fn for_app(app: &str) -> Result<Self> {
        let base = BaseDirs::new().ok_or_else(|| {
            Error::ConfigError("Could not determine user config directory".to_string())
        })?;
        Ok(Self::at(base.config_dir().join(app)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Write `data` as pretty JSON, creating the directory if needed.
    ///
    /// # Errors
    /// Returns `Error::SerializationError`, or `Error::BackendError` on I/O failure.
    pub fn save<T: Serialize>(&self, file: &str, data: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(data)
            .map_err(|e| Error::SerializationError(e.to_string()))?;

        fs::create_dir_all(&self.dir)?;
        let path = self.path(file);
        fs::write(&path, json)?;

        debug!("✓ Saved state to {}", path.display());
        Ok(())
    }

    /// Read a state file written by [`StateStore::save`].
    ///
    /// # Errors
    /// Returns `Error::StateNotFound` if the file does not exist and
    /// `Error::DeserializationError` if it does not decode as `T`.
    pub fn load<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.path(file);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("» No state at {}", path.display());
                return Err(Error::StateNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            Error::DeserializationError(format!("{}: {}", path.display(), e))
        })
    }
}

/// Path of `file` for `app` under the platform config directory.
///
/// # Errors
/// Returns `Error::ConfigError` if no home directory can be determined.
pub fn state_path(app: &str, file: &str) -> Result<PathBuf> {
    Ok(StateStore::for_app(app)?.path(file))
}

/// Save `data` as `<config dir>/<app>/<file>`.
pub fn save_state<T: Serialize>(app: &str, file: &str, data: &T) -> Result<()> {
    StateStore::for_app(app)?.save(file, data)
}

/// Load `<config dir>/<app>/<file>`; `Error::StateNotFound` when absent.
pub fn load_state<T: DeserializeOwned>(app: &str, file: &str) -> Result<T> {
    StateStore::for_app(app)?.load(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Default)]
    struct AppState {
        last_file: String,
        recent_files: Vec<String>,
        visit_count: u32,
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = StateStore::at(dir.path().join("myapp"));

        let original = AppState {
            last_file: "notes.md".into(),
            recent_files: vec!["a.md".into(), "b.md".into()],
            visit_count: 42,
        };
        store.save("state.json", &original).expect("Failed to save state");

        let loaded: AppState = store.load("state.json").expect("Failed to load state");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_save_writes_pretty_json() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = StateStore::at(dir.path());
        store
            .save("state.json", &AppState::default())
            .expect("Failed to save state");

        let raw = fs::read_to_string(store.path("state.json")).expect("Failed to read file");
        assert!(raw.contains("\n  \"visit_count\": 0"), "got {}", raw);
    }

    #[test]
    fn test_load_missing_is_state_not_found() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = StateStore::at(dir.path().join("never-created"));

        let err = store.load::<AppState>("missing.json").expect_err("no file");
        match err {
            Error::StateNotFound(path) => assert!(path.ends_with("never-created/missing.json")),
            other => panic!("Expected StateNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_corrupt_is_deserialization_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = StateStore::at(dir.path());
        fs::write(store.path("state.json"), "{not json").expect("Failed to write file");

        let err = store.load::<AppState>("state.json").expect_err("corrupt file");
        assert!(matches!(err, Error::DeserializationError(_)), "got {:?}", err);
    }

    #[test]
    fn test_first_run_then_update_cycle() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = StateStore::at(dir.path());

        let mut state = match store.load::<AppState>("state.json") {
            Err(Error::StateNotFound(_)) => AppState::default(),
            other => panic!("Expected first run to find nothing, got {:?}", other),
        };
        state.visit_count += 1;
        state.last_file = "main.rs".into();
        store.save("state.json", &state).expect("Failed to save state");

        let mut next: AppState = store.load("state.json").expect("Failed to load state");
        next.visit_count += 1;
        store.save("state.json", &next).expect("Failed to save state");

        let last: AppState = store.load("state.json").expect("Failed to load state");
        assert_eq!(last.visit_count, 2);
        assert_eq!(last.last_file, "main.rs");
    }

    #[test]
    fn test_state_path_layout() {
        // Skip on hosts without a home directory.
        let Some(base) = BaseDirs::new() else {
            return;
        };
        let path = state_path("myapp", "state.json").expect("Failed to resolve path");
        assert_eq!(path, base.config_dir().join("myapp").join("state.json"));
        assert!(path.is_absolute());
    }
}
