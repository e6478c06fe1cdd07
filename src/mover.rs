//! Physical file moves.
//!
//! [`MoveExecutor::execute`] never returns an error: every I/O failure is
//! folded into the returned [`MoveEvent`] so the caller can log it and move on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::events::{MoveEvent, MoveOutcome};
use crate::rules::RuleTable;

/// What to do when the destination folder already holds a file of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Keep both by renaming the incoming file to `name (1).ext`, `name (2).ext`, ...
    KeepBoth,
}

const MAX_SUFFIX: u32 = 10_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct MoveExecutor {
    policy: CollisionPolicy,
}

impl MoveExecutor {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Moves `file` into `watch_root/destination`, creating the folder first.
    pub fn execute(&self, file: &Path, watch_root: &Path, destination: &str) -> MoveEvent {
        let dest_dir = watch_root.join(destination);
        let outcome = match self.try_move(file, &dest_dir) {
            Ok(outcome) => outcome,
            Err(err) => MoveOutcome::Failed { reason: err.to_string() },
        };

        match &outcome {
            MoveOutcome::Moved { to } => {
                tracing::info!("Moved: {} -> {}", file.display(), to.display())
            }
            MoveOutcome::Skipped { reason } => {
                tracing::debug!("Skipped {}: {}", file.display(), reason)
            }
            MoveOutcome::Failed { reason } => {
                tracing::warn!("Failed to move {}: {}", file.display(), reason)
            }
        }

        MoveEvent::new(file.to_path_buf(), dest_dir, outcome)
    }

    fn try_move(&self, file: &Path, dest_dir: &Path) -> io::Result<MoveOutcome> {
        let file_name = file.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;

        // Checked up front so a vanished source reports as such rather than as a rename error.
        let metadata = fs::symlink_metadata(file).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                io::Error::new(io::ErrorKind::NotFound, "source no longer exists")
            }
            _ => e,
        })?;
        if metadata.is_dir() {
            return Ok(MoveOutcome::Skipped { reason: "is a directory".to_string() });
        }

        fs::create_dir_all(dest_dir)?;

        if let Some(parent) = file.parent() {
            if is_same_dir(parent, dest_dir) {
                return Ok(MoveOutcome::Skipped {
                    reason: "already in destination folder".to_string(),
                });
            }
        }

        let mut target = dest_dir.join(file_name);
        if self.policy == CollisionPolicy::KeepBoth && target.exists() {
            target = free_name(dest_dir, Path::new(file_name))?;
        }

        fs::rename(file, &target)?;
        Ok(MoveOutcome::Moved { to: target })
    }

    /// Creates every destination folder named in `rules` under `watch_root`.
    pub fn prepare_destinations(&self, watch_root: &Path, rules: &RuleTable) -> io::Result<()> {
        for folder in rules.destinations() {
            let dir = watch_root.join(folder);
            fs::create_dir_all(&dir)?;
            tracing::debug!("Prepared destination {}", dir.display());
        }
        Ok(())
    }
}

fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn free_name(dir: &Path, file_name: &Path) -> io::Result<PathBuf> {
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 1..=MAX_SUFFIX {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {} in {}", file_name.display(), dir.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_moves_into_new_folder() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("note.txt");
        fs::write(&file, "hello").unwrap();

        let event = MoveExecutor::default().execute(&file, root.path(), "Documents");

        let expected = root.path().join("Documents").join("note.txt");
        assert_eq!(event.outcome, MoveOutcome::Moved { to: expected.clone() });
        assert_eq!(event.destination_folder, root.path().join("Documents"));
        assert!(!file.exists());
        assert_eq!(fs::read_to_string(expected).unwrap(), "hello");
    }

    #[test]
    fn test_existing_destination_folder_is_fine() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("Music")).unwrap();
        let file = root.path().join("song.mp3");
        fs::write(&file, "la").unwrap();

        let event = MoveExecutor::default().execute(&file, root.path(), "Music");
        assert!(event.is_moved());
    }

    #[test]
    fn test_vanished_source_fails_without_panicking() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("note.txt");
        fs::write(&file, "x").unwrap();

        let executor = MoveExecutor::default();
        assert!(executor.execute(&file, root.path(), "Documents").is_moved());

        let second = executor.execute(&file, root.path(), "Documents");
        match second.outcome {
            MoveOutcome::Failed { reason } => assert!(reason.contains("no longer exists")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_overwrite_replaces_existing_file() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("Documents");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("note.txt"), "old").unwrap();
        let file = root.path().join("note.txt");
        fs::write(&file, "new").unwrap();

        let event = MoveExecutor::new(CollisionPolicy::Overwrite)
            .execute(&file, root.path(), "Documents");

        assert!(event.is_moved());
        assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "new");
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 1);
    }

    #[test]
    fn test_keep_both_appends_suffix() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("Documents");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("note.txt"), "old").unwrap();
        fs::write(dest.join("note (1).txt"), "older").unwrap();
        let file = root.path().join("note.txt");
        fs::write(&file, "new").unwrap();

        let event = MoveExecutor::new(CollisionPolicy::KeepBoth)
            .execute(&file, root.path(), "Documents");

        assert_eq!(event.outcome, MoveOutcome::Moved { to: dest.join("note (2).txt") });
        assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(dest.join("note (2).txt")).unwrap(), "new");
    }

    #[test]
    fn test_file_already_in_destination_is_skipped() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("Music");
        fs::create_dir(&dest).unwrap();
        let file = dest.join("song.mp3");
        fs::write(&file, "la").unwrap();

        let event = MoveExecutor::default().execute(&file, root.path(), "Music");

        assert!(matches!(event.outcome, MoveOutcome::Skipped { .. }));
        assert!(file.exists());
    }

    #[test]
    fn test_unwritable_destination_fails() {
        let root = TempDir::new().unwrap();
        // A regular file where the destination folder should be.
        fs::write(root.path().join("Documents"), "blocker").unwrap();
        let file = root.path().join("note.txt");
        fs::write(&file, "x").unwrap();

        let event = MoveExecutor::default().execute(&file, root.path(), "Documents");

        assert!(event.is_failed());
        assert!(file.exists());
    }

    #[test]
    fn test_prepare_destinations() {
        let root = TempDir::new().unwrap();
        let rules = RuleTable::defaults();
        MoveExecutor::default().prepare_destinations(root.path(), &rules).unwrap();
        for folder in ["Music", "Images", "Documents"] {
            assert!(root.path().join(folder).is_dir());
        }
        // Idempotent.
        MoveExecutor::default().prepare_destinations(root.path(), &rules).unwrap();
    }

    #[test]
    fn test_free_name_without_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Makefile"), "").unwrap();
        let name = free_name(dir.path(), Path::new("Makefile")).unwrap();
        assert_eq!(name, dir.path().join("Makefile (1)"));
    }
}
