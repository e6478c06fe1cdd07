pub mod autostart;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod mover;
pub mod router;
pub mod rules;
pub mod watcher;

pub use autostart::{AutostartRegistrar, DesktopEntryRegistrar, NoopRegistrar};
pub use config::{Config, ConfigStore};
pub use error::{AutostartError, ConfigError, RuleError, WatchError};
pub use events::*;
pub use mover::{CollisionPolicy, MoveExecutor};
pub use router::route;
pub use rules::RuleTable;
pub use watcher::*;
