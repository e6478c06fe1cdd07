use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The file now lives at `to`.
    Moved { to: PathBuf },
    /// Nothing to do, e.g. the file already sits in its destination folder.
    Skipped { reason: String },
    Failed { reason: String },
}

/// Record of one processed creation notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub source: PathBuf,
    pub destination_folder: PathBuf,
    pub timestamp: DateTime<Local>,
    pub outcome: MoveOutcome,
}

impl MoveEvent {
    pub fn new(source: PathBuf, destination_folder: PathBuf, outcome: MoveOutcome) -> Self {
        Self {
            source,
            destination_folder,
            timestamp: Local::now(),
            outcome,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self.outcome, MoveOutcome::Moved { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, MoveOutcome::Failed { .. })
    }
}

impl fmt::Display for MoveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            MoveOutcome::Moved { .. } => write!(
                f,
                "Moved: {} -> {}",
                self.source.display(),
                self.destination_folder.display()
            ),
            MoveOutcome::Skipped { reason } => {
                write!(f, "Skipped: {} ({})", self.source.display(), reason)
            }
            MoveOutcome::Failed { reason } => {
                write!(f, "Failed: {} ({})", self.source.display(), reason)
            }
        }
    }
}

/// Receives every [`MoveEvent`] a watch session produces.
///
/// Called on the watch worker thread, so implementations must return quickly.
pub trait EventSink: Send + Sync {
    fn on_move(&self, event: &MoveEvent);
}

impl<F> EventSink for F
where
    F: Fn(&MoveEvent) + Send + Sync,
{
    fn on_move(&self, event: &MoveEvent) {
        self(event)
    }
}
