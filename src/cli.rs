use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::mover::CollisionPolicy;

#[derive(Parser)]
#[command(name = "xfolder")]
#[command(author = "XFolder Team")]
#[command(version)]
#[command(about = "Watches a folder and files new arrivals into subfolders by extension")]
#[command(long_about = "XFolder monitors a folder and moves every newly created file into a subfolder chosen by its extension, e.g. .mp3 into Music. Rules, the watched folder and startup behaviour are kept in a JSON config file.")]
pub struct Cli {
    /// Folder to watch; stored in the config file
    #[arg(value_name = "PATH", help = "Folder to watch (defaults to the one in the config file)")]
    pub path: Option<PathBuf>,

    /// Location of the JSON config document
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, help = "Config file")]
    pub config: PathBuf,

    /// Replace all rules with a JSON object such as '{".mp3": "Music"}'
    #[arg(long, value_name = "JSON", help = "Replace the rules with a JSON object")]
    pub rules: Option<String>,

    /// Register or unregister the app to run at login
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set, help = "Start with the system")]
    pub start_with_system: Option<bool>,

    /// Keep both files on a name collision instead of overwriting
    #[arg(long, help = "Rename incoming files instead of overwriting")]
    pub keep_both: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    /// Output format for move events
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output (default)
    Text,
    /// JSON lines for scripting
    Json,
    /// Compact single-line format
    Compact,
}

impl Cli {
    pub fn collision_policy(&self) -> CollisionPolicy {
        if self.keep_both {
            CollisionPolicy::KeepBoth
        } else {
            CollisionPolicy::Overwrite
        }
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(!self.no_color)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.path {
            if !path.exists() {
                return Err(format!("Path does not exist: {}", path.display()));
            }
            if !path.is_dir() {
                return Err(format!("Path is not a directory: {}", path.display()));
            }
        }

        if self.config.as_os_str().is_empty() {
            return Err("Config path must not be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            path: None,
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            rules: None,
            start_with_system: None,
            keep_both: false,
            verbose: false,
            no_color: false,
            output: OutputFormat::Text,
        }
    }
}
