//! Extension-to-folder rules.
//!
//! A [`RuleTable`] maps a lowercase extension (with its leading dot, e.g.
//! `".mp3"`) to the name of a folder relative to the watch root. Every entry
//! edited through the table is validated on the way in. Entries read back from
//! disk that could never match a file are dropped with a warning instead, so
//! older documents keep loading.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RuleError;

/// Ordered, validated mapping from extension to destination folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "BTreeMap<String, String>")]
pub struct RuleTable {
    rules: BTreeMap<String, String>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rules written on first run.
    pub fn defaults() -> Self {
        let mut table = Self::new();
        for (ext, folder) in [(".mp3", "Music"), (".jpg", "Images"), (".txt", "Documents")] {
            table.rules.insert(ext.to_string(), folder.to_string());
        }
        table
    }

    /// Parses a JSON object of `extension -> folder`, as typed in the rules editor.
    pub fn from_json_str(text: &str) -> Result<Self, RuleError> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(text.trim()).map_err(|e| RuleError::Parse(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Builds a table from a stored document, skipping entries that fail validation.
    pub fn from_persisted(raw: BTreeMap<String, String>) -> Self {
        let mut rules = BTreeMap::new();
        for (extension, destination) in raw {
            let checked = normalize_extension(&extension)
                .and_then(|ext| validate_destination(&destination).map(|()| ext));
            match checked {
                Ok(ext) if rules.contains_key(&ext) => {
                    tracing::warn!("Ignoring duplicate rule {:?} -> {:?}", extension, destination);
                }
                Ok(ext) => {
                    rules.insert(ext, destination);
                }
                Err(err) => tracing::warn!("Ignoring stored rule: {}", err),
            }
        }
        Self { rules }
    }

    /// Adds or replaces a rule, returning the previous destination for that extension.
    pub fn insert(
        &mut self,
        extension: impl AsRef<str>,
        destination: impl Into<String>,
    ) -> Result<Option<String>, RuleError> {
        let extension = normalize_extension(extension.as_ref())?;
        let destination = destination.into();
        validate_destination(&destination)?;
        Ok(self.rules.insert(extension, destination))
    }

    pub fn remove(&mut self, extension: &str) -> Option<String> {
        self.rules.remove(&extension.to_lowercase())
    }

    /// Looks up an extension; the lookup is case-insensitive.
    pub fn get(&self, extension: &str) -> Option<&str> {
        match self.rules.get(extension) {
            Some(folder) => Some(folder.as_str()),
            None => self.rules.get(&extension.to_lowercase()).map(String::as_str),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.rules.iter()
    }

    /// Distinct destination folders, in first-seen order of their extensions.
    pub fn destinations(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for folder in self.rules.values() {
            if !seen.contains(&folder.as_str()) {
                seen.push(folder.as_str());
            }
        }
        seen
    }
}

impl TryFrom<BTreeMap<String, String>> for RuleTable {
    type Error = RuleError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut rules = BTreeMap::new();
        for (extension, destination) in raw {
            let extension = normalize_extension(&extension)?;
            validate_destination(&destination)?;
            if rules.contains_key(&extension) {
                return Err(RuleError::DuplicateExtension(extension));
            }
            rules.insert(extension, destination);
        }
        Ok(Self { rules })
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(Self::from_persisted(raw))
    }
}

impl From<RuleTable> for BTreeMap<String, String> {
    fn from(table: RuleTable) -> Self {
        table.rules
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn normalize_extension(extension: &str) -> Result<String, RuleError> {
    let invalid = || RuleError::InvalidExtension(extension.to_string());
    let rest = extension.strip_prefix('.').ok_or_else(invalid)?;
    if rest.is_empty() || rest.contains(['.', '/', '\\']) || rest.trim() != rest {
        return Err(invalid());
    }
    Ok(extension.to_lowercase())
}

fn validate_destination(destination: &str) -> Result<(), RuleError> {
    let invalid = || RuleError::InvalidDestination(destination.to_string());
    if destination.trim().is_empty() {
        return Err(invalid());
    }
    // Both separators are rejected on every host so documents stay portable.
    for segment in destination.split(['/', '\\']) {
        if segment == ".." {
            return Err(invalid());
        }
    }
    let path = Path::new(destination);
    if path.is_absolute() || destination.starts_with(['/', '\\']) {
        return Err(invalid());
    }
    let only_normal = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !only_normal || !path.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let rules = RuleTable::defaults();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.get(".mp3"), Some("Music"));
        assert_eq!(rules.get(".jpg"), Some("Images"));
        assert_eq!(rules.get(".txt"), Some("Documents"));
    }

    #[test]
    fn test_insert_lowercases_extension() {
        let mut rules = RuleTable::new();
        rules.insert(".PDF", "Papers").unwrap();
        assert_eq!(rules.get(".pdf"), Some("Papers"));
        assert_eq!(rules.get(".Pdf"), Some("Papers"));
        assert_eq!(rules.iter().next().unwrap().0, ".pdf");
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut rules = RuleTable::defaults();
        let previous = rules.insert(".mp3", "Audio").unwrap();
        assert_eq!(previous.as_deref(), Some("Music"));
        assert_eq!(rules.get(".mp3"), Some("Audio"));
    }

    #[test]
    fn test_rejects_bad_extensions() {
        let mut rules = RuleTable::new();
        for ext in ["mp3", ".", "", ".tar.gz", "./x", ". mp3"] {
            assert!(
                matches!(rules.insert(ext, "Music"), Err(RuleError::InvalidExtension(_))),
                "{ext:?} should be rejected"
            );
        }
        assert!(rules.is_empty());
    }

    #[test]
    fn test_rejects_traversal_and_absolute_destinations() {
        let mut rules = RuleTable::new();
        for dest in ["", "   ", "..", "../outside", "Music/../..", "/etc", "\\share", "a\\..\\b"] {
            assert!(
                matches!(rules.insert(".mp3", dest), Err(RuleError::InvalidDestination(_))),
                "{dest:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_nested_relative_destination() {
        let mut rules = RuleTable::new();
        rules.insert(".flac", "Music/Lossless").unwrap();
        assert_eq!(rules.get(".flac"), Some("Music/Lossless"));
    }

    #[test]
    fn test_from_json_str() {
        let rules = RuleTable::from_json_str(r#"{ ".PNG": "Images", ".mp4": "Videos" }"#).unwrap();
        assert_eq!(rules.get(".png"), Some("Images"));
        assert_eq!(rules.get(".mp4"), Some("Videos"));
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(matches!(RuleTable::from_json_str("{ not json"), Err(RuleError::Parse(_))));
        assert!(matches!(RuleTable::from_json_str("[1, 2]"), Err(RuleError::Parse(_))));
    }

    #[test]
    fn test_case_collision_is_duplicate() {
        let err = RuleTable::from_json_str(r#"{ ".JPG": "A", ".jpg": "B" }"#).unwrap_err();
        assert_eq!(err, RuleError::DuplicateExtension(".jpg".to_string()));
    }

    #[test]
    fn test_destinations_are_distinct() {
        let rules =
            RuleTable::from_json_str(r#"{ ".jpg": "Images", ".png": "Images", ".txt": "Docs" }"#)
                .unwrap();
        assert_eq!(rules.destinations(), vec!["Images", "Docs"]);
    }

    #[test]
    fn test_stored_rules_skip_invalid_entries() {
        let raw: BTreeMap<String, String> = [
            (".mp3", "Music"),
            ("pdf", "Docs"),
            (".tar.gz", "Archives"),
            (".JPG", "Images"),
            (".jpg", "Pics"),
            (".bin", "../out"),
        ]
        .into_iter()
        .map(|(ext, dest)| (ext.to_string(), dest.to_string()))
        .collect();

        let rules = RuleTable::from_persisted(raw);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.get(".mp3"), Some("Music"));
        assert_eq!(rules.get(".jpg"), Some("Images"));
        assert_eq!(rules.get(".pdf"), None);
    }

    #[test]
    fn test_deserialize_is_lenient_but_edits_are_strict() {
        let text = r#"{ ".mp3": "Music", "pdf": "Docs" }"#;
        let loaded: RuleTable = serde_json::from_str(text).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(matches!(
            RuleTable::from_json_str(text),
            Err(RuleError::InvalidExtension(_))
        ));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let json = serde_json::to_value(RuleTable::defaults()).unwrap();
        assert_eq!(json[".mp3"], "Music");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}
