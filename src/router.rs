use std::path::Path;

use crate::rules::RuleTable;

/// Returns the lowercase extension of `path` including its leading dot.
///
/// Dotfiles such as `.bashrc` and names without a dot have no extension.
pub fn extension_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    Some(format!(".{}", ext.to_lowercase()))
}

/// Picks the destination folder for `path`, or `None` when no rule applies.
///
/// Pure lookup: no filesystem access.
pub fn route<'a>(path: &Path, rules: &'a RuleTable) -> Option<&'a str> {
    let ext = extension_of(path)?;
    rules.get(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_routes_known_extensions() {
        let rules = RuleTable::defaults();
        assert_eq!(route(Path::new("/tmp/watch/song.mp3"), &rules), Some("Music"));
        assert_eq!(route(Path::new("photo.jpg"), &rules), Some("Images"));
        assert_eq!(route(Path::new("a/b/note.txt"), &rules), Some("Documents"));
    }

    #[test]
    fn test_routing_is_case_insensitive() {
        let rules = RuleTable::defaults();
        for name in ["SONG.MP3", "Song.Mp3", "song.mP3"] {
            assert_eq!(route(Path::new(name), &rules), Some("Music"), "{name}");
        }
    }

    #[test]
    fn test_every_rule_matches_its_own_extension() {
        let rules = RuleTable::from_json_str(
            r#"{ ".mp3": "Music", ".jpeg": "Images", ".tar": "Archives", ".7z": "Archives" }"#,
        )
        .unwrap();
        for (ext, folder) in &rules {
            for stem in ["file", "my.file", "UPPER"] {
                let lower = PathBuf::from(format!("{stem}{ext}"));
                let upper = PathBuf::from(format!("{stem}{}", ext.to_uppercase()));
                assert_eq!(route(&lower, &rules), Some(folder.as_str()));
                assert_eq!(route(&upper, &rules), Some(folder.as_str()));
            }
        }
    }

    #[test]
    fn test_no_match_without_extension() {
        let rules = RuleTable::defaults();
        assert_eq!(route(Path::new("README"), &rules), None);
        assert_eq!(route(Path::new("/tmp/watch/Makefile"), &rules), None);
        assert_eq!(route(Path::new(".txt"), &rules), None);
        assert_eq!(route(Path::new("trailing."), &rules), None);
    }

    #[test]
    fn test_no_match_for_unknown_extension() {
        let rules = RuleTable::defaults();
        assert_eq!(route(Path::new("report.pdf"), &rules), None);
        assert_eq!(route(Path::new("song.mp3.part"), &rules), None);
    }

    #[test]
    fn test_only_last_extension_counts() {
        let rules = RuleTable::defaults();
        assert_eq!(route(Path::new("notes.backup.txt"), &rules), Some("Documents"));
        assert_eq!(extension_of(Path::new("archive.tar.gz")).as_deref(), Some(".gz"));
    }
}
