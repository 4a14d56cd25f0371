//! Persisted asset-name → character-token mapping.
//!
//! Read once before a batch, merged in memory, written back once after the
//! batch. Entries are never removed by the pipeline.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct IdentityManifest {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl IdentityManifest {
    /// Loads the manifest at `path`; a missing file is an empty manifest.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };
        log::debug!("Loaded {} identities from {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Token for `name`, treating empty tokens as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .map(String::as_str)
            .filter(|token| !token.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds new identities. Existing tokens are never overwritten; returns how
    /// many entries were actually added.
    pub fn merge<I>(&mut self, identities: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut added = 0;
        for (name, token) in identities {
            if token.is_empty() || self.contains(&name) {
                continue;
            }
            self.entries.insert(name, token);
            added += 1;
        }
        added
    }

    /// Writes the whole manifest back to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.entries)? + "\n";
        fs::write(&self.path, text)?;
        log::info!(
            "Saved {} identities to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = IdentityManifest::load(dir.path().join("none.json")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn merge_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = IdentityManifest::load(dir.path().join("m.json")).unwrap();

        let added = manifest.merge(vec![
            ("rioter".to_string(), "char-1".to_string()),
            ("drummer".to_string(), String::new()),
        ]);
        assert_eq!(added, 1);

        let added = manifest.merge(vec![("rioter".to_string(), "char-2".to_string())]);
        assert_eq!(added, 0);
        assert_eq!(manifest.get("rioter"), Some("char-1"));
        assert!(!manifest.contains("drummer"));
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools/.character_manifest.json");

        let mut manifest = IdentityManifest::load(&path).unwrap();
        manifest.merge(vec![("rioter".to_string(), "char-1".to_string())]);
        manifest.save().unwrap();

        let reloaded = IdentityManifest::load(&path).unwrap();
        assert_eq!(reloaded.get("rioter"), Some("char-1"));
        assert!(fs::read_to_string(&path).unwrap().ends_with("}\n"));
    }

    #[test]
    fn empty_tokens_in_file_count_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, r#"{"rioter": ""}"#).unwrap();

        let manifest = IdentityManifest::load(&path).unwrap();
        assert!(!manifest.contains("rioter"));
    }
}
