//! Persisted configuration and the store that guards it.
//!
//! The document is a JSON object:
//!
//! ```json
//! {
//!     "watch_folder": "/home/me/Downloads",
//!     "rules": { ".jpg": "Images", ".mp3": "Music", ".txt": "Documents" },
//!     "start_with_system": false,
//!     "show_window_on_start": true,
//!     "version": "1.0.0"
//! }
//! ```
//!
//! [`ConfigStore`] is the only owner of the live [`Config`]. Readers get a
//! cloned snapshot; writers go through [`ConfigStore::update`], which persists
//! before publishing so the file and the in-memory value never disagree.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;

use crate::error::ConfigError;
use crate::rules::RuleTable;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Folder to watch; empty until the user picks one.
    #[serde(default)]
    pub watch_folder: PathBuf,
    #[serde(default)]
    pub rules: RuleTable,
    #[serde(default)]
    pub start_with_system: bool,
    #[serde(default = "default_true")]
    pub show_window_on_start: bool,
    /// Informational only.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_folder: PathBuf::new(),
            rules: RuleTable::defaults(),
            start_with_system: false,
            show_window_on_start: default_true(),
            version: default_version(),
        }
    }
}

impl Config {
    /// The watch folder, or `None` while it is unset.
    pub fn watch_root(&self) -> Option<&Path> {
        if self.watch_folder.as_os_str().is_empty() {
            None
        } else {
            Some(&self.watch_folder)
        }
    }
}

/// Loads the document at `path`, writing the defaults there on first run.
///
/// # Errors
///
/// Returns [`ConfigError::Corrupt`] when the file exists but does not parse
/// (individual rules that can never match are dropped, not reported),
/// [`ConfigError::Io`] for read failures other than "not found", and
/// [`ConfigError::PersistFailed`] when the first-run defaults cannot be written.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let config = Config::default();
            save_config(path, &config)?;
            tracing::info!("Created default config at {}", path.display());
            Ok(config)
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Atomically replaces the document at `path`.
///
/// The JSON is written to a temporary file in the same directory and renamed
/// over the target, so readers see either the old or the new document.
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let content = to_document(config)?;
    let persist_err = |source: io::Error| ConfigError::PersistFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(persist_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(persist_err)?;
    tmp.write_all(&content).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

fn to_document(config: &Config) -> Result<Vec<u8>, ConfigError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config.serialize(&mut ser)?;
    Ok(buf)
}

/// Shared, lock-guarded owner of the live [`Config`].
///
/// Cloning the store clones the handle, not the config.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
    config: Mutex<Config>,
}

impl ConfigStore {
    /// Opens the store backed by `path`, creating the default document if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = load_config(&path)?;
        Ok(Self::with_config(path, config))
    }

    /// Wraps an already-loaded config without touching the disk.
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                config: Mutex::new(config),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns a copy of the current config.
    pub fn snapshot(&self) -> Config {
        self.lock().clone()
    }

    /// Applies `mutate` and persists the result, returning the new snapshot.
    ///
    /// The mutation runs on a copy under the store's lock. The live config is
    /// replaced only once the document is on disk; on
    /// [`ConfigError::PersistFailed`] it keeps its previous value. `mutate`
    /// must not call back into this store.
    pub fn update<F>(&self, mutate: F) -> Result<Config, ConfigError>
    where
        F: FnOnce(&mut Config),
    {
        let mut guard = self.lock();
        let mut next = guard.clone();
        mutate(&mut next);
        if next == *guard {
            return Ok(next);
        }
        save_config(&self.inner.path, &next)?;
        *guard = next.clone();
        Ok(next)
    }

    /// Replaces the whole config.
    pub fn save(&self, config: Config) -> Result<(), ConfigError> {
        let mut guard = self.lock();
        save_config(&self.inner.path, &config)?;
        *guard = config;
        Ok(())
    }

    pub fn set_watch_folder(&self, folder: impl Into<PathBuf>) -> Result<Config, ConfigError> {
        let folder = folder.into();
        self.update(|c| c.watch_folder = folder)
    }

    pub fn set_rules(&self, rules: RuleTable) -> Result<Config, ConfigError> {
        self.update(|c| c.rules = rules)
    }

    /// Parses `text` as a rules object and stores it. Nothing changes if it is invalid.
    pub fn set_rules_from_json(&self, text: &str) -> Result<Config, ConfigError> {
        let rules = RuleTable::from_json_str(text)?;
        self.set_rules(rules)
    }

    pub fn set_start_with_system(&self, enabled: bool) -> Result<Config, ConfigError> {
        self.update(|c| c.start_with_system = enabled)
    }

    pub fn set_show_window_on_start(&self, show: bool) -> Result<Config, ConfigError> {
        self.update(|c| c.show_window_on_start = show)
    }

    // The live value is only ever replaced whole, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, Config> {
        self.inner.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
