//! Registering the app to run at login.
//!
//! The core only sees the [`AutostartRegistrar`] trait. [`DesktopEntryRegistrar`]
//! implements it with a freedesktop autostart entry; [`NoopRegistrar`] is used
//! where no mechanism is available.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigStore};
use crate::error::AutostartError;

pub const APP_NAME: &str = "XFolder";
const ENTRY_FILE: &str = "xfolder.desktop";

pub trait AutostartRegistrar: Send + Sync {
    /// Registers the app to start at login with `config_path` as its document.
    /// Re-registering overwrites the entry.
    fn enable(&self, config_path: &Path) -> Result<(), AutostartError>;
    /// Removes the registration. Succeeds if there was none.
    fn disable(&self) -> Result<(), AutostartError>;
}

/// Writes `xfolder.desktop` into an XDG autostart directory.
#[derive(Debug, Clone)]
pub struct DesktopEntryRegistrar {
    dir: PathBuf,
    executable: PathBuf,
}

impl DesktopEntryRegistrar {
    pub fn new(dir: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            executable: executable.into(),
        }
    }

    /// Uses `$XDG_CONFIG_HOME/autostart` (or `~/.config/autostart`) and the running executable.
    pub fn for_current_user() -> Option<Self> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        let executable = std::env::current_exe().ok()?;
        Some(Self::new(base.join("autostart"), executable))
    }

    pub fn entry_path(&self) -> PathBuf {
        self.dir.join(ENTRY_FILE)
    }

    fn render(&self, config_path: &Path) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name={APP_NAME}\n\
             Exec={} --config {}\n\
             X-GNOME-Autostart-enabled=true\n",
            quote_exec_arg(&self.executable),
            quote_exec_arg(config_path)
        )
    }
}

impl AutostartRegistrar for DesktopEntryRegistrar {
    fn enable(&self, config_path: &Path) -> Result<(), AutostartError> {
        let path = self.entry_path();
        let io_err = |source: io::Error| AutostartError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        fs::write(&path, self.render(config_path)).map_err(io_err)?;
        tracing::info!("Registered autostart entry {}", path.display());
        Ok(())
    }

    fn disable(&self) -> Result<(), AutostartError> {
        let path = self.entry_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed autostart entry {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AutostartError::Io { path, source }),
        }
    }
}

/// Accepts every request and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistrar;

impl AutostartRegistrar for NoopRegistrar {
    fn enable(&self, _config_path: &Path) -> Result<(), AutostartError> {
        tracing::debug!("Autostart is not supported here; ignoring enable");
        Ok(())
    }

    fn disable(&self) -> Result<(), AutostartError> {
        Ok(())
    }
}

// Desktop entry Exec quoting: `"`, `` ` ``, `$` and `\` get a backslash, then
// every backslash is doubled again because the value is itself an escaped string.
fn quote_exec_arg(path: &Path) -> String {
    let mut quoted = String::from('"');
    for c in path.to_string_lossy().chars() {
        match c {
            '\\' => quoted.push_str("\\\\\\\\"),
            '"' | '`' | '$' => {
                quoted.push_str("\\\\");
                quoted.push(c);
            }
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// The registrar for this platform.
pub fn platform_registrar() -> Box<dyn AutostartRegistrar> {
    if cfg!(all(unix, not(target_os = "macos"))) {
        if let Some(registrar) = DesktopEntryRegistrar::for_current_user() {
            return Box::new(registrar);
        }
    }
    Box::new(NoopRegistrar)
}

/// Persists the start-with-system flag, then registers or unregisters.
pub fn apply_start_with_system(
    store: &ConfigStore,
    registrar: &dyn AutostartRegistrar,
    enabled: bool,
) -> Result<Config, AutostartError> {
    let config = store.set_start_with_system(enabled)?;
    if enabled {
        registrar.enable(&absolute_config_path(store.path())?)?;
    } else {
        registrar.disable()?;
    }
    Ok(config)
}

/// Startup check: re-registers when the flag is set, leaves things alone otherwise.
pub fn sync_autostart(
    store: &ConfigStore,
    registrar: &dyn AutostartRegistrar,
) -> Result<(), AutostartError> {
    if store.snapshot().start_with_system {
        registrar.enable(&absolute_config_path(store.path())?)?;
    }
    Ok(())
}

/// Resolves the document path against the current directory, since a login
/// session starts the app from elsewhere.
fn absolute_config_path(path: &Path) -> Result<PathBuf, AutostartError> {
    if let Ok(resolved) = fs::canonicalize(path) {
        return Ok(resolved);
    }
    let cwd = std::env::current_dir().map_err(|source| AutostartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}
