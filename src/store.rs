use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::collection::ProfileCollection;
use crate::util::fs::write_atomic;

/// A value plus an optional diagnostic describing why it was degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Loaded<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn degraded(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warning: Some(warning.into()),
        }
    }

    /// Promote a warning to an error for callers that refuse degraded data.
    pub fn strict(self) -> Result<T> {
        match self.warning {
            Some(warning) => Err(anyhow::anyhow!(warning)),
            None => Ok(self.value),
        }
    }
}

/// JSON document holding every profile (`profiles.json`).
///
/// There is no locking: the last writer wins.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the document with an empty array if it does not exist yet.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create profile directory {:?}", parent))?;
        }

        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create profile store {:?}", self.path))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(b"[]")
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to initialize profile store {:?}", self.path))?;
        debug!(path = %self.path.display(), "initialized profile store");
        Ok(())
    }

    /// Read and parse the document, propagating any failure.
    pub fn try_load(&self) -> Result<ProfileCollection> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read profile store {:?}", self.path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse profile store {:?}", self.path))
    }

    /// Load, degrading to an empty collection with the failure as a warning.
    pub fn load_checked(&self) -> Loaded<ProfileCollection> {
        match self.try_load() {
            Ok(profiles) => Loaded::clean(profiles),
            Err(err) => {
                let message = format!("{err:#}");
                error!(path = %self.path.display(), "failed to load profiles: {message}");
                Loaded::degraded(ProfileCollection::default(), message)
            }
        }
    }

    /// Load the collection. Failures are logged and yield no profiles.
    pub fn load(&self) -> ProfileCollection {
        self.load_checked().value
    }

    /// Serialize pretty-printed and replace the document atomically.
    pub fn try_save(&self, profiles: &ProfileCollection) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(profiles).context("Failed to serialize profiles")?;
        write_atomic(&self.path, &contents)?;
        debug!(path = %self.path.display(), count = profiles.len(), "saved profiles");
        Ok(())
    }

    /// Save the collection, reporting failure as `false`.
    pub fn save(&self, profiles: &ProfileCollection) -> bool {
        match self.try_save(profiles) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %self.path.display(), "failed to save profiles: {err:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnvProfile, EnvVariable};
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> ProfileStore {
        ProfileStore::new(temp.path().join("switchenv/profiles.json"))
    }

    #[test]
    fn test_ensure_initialized_writes_empty_array() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.ensure_initialized().unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_ensure_initialized_keeps_existing_document() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.ensure_initialized().unwrap();
        fs::write(store.path(), r#"[{"id":"1","name":"keep"}]"#).unwrap();

        store.ensure_initialized().unwrap();

        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let mut profiles = ProfileCollection::default();
        profiles.push(EnvProfile::new("zeta", None));
        profiles.push(
            EnvProfile::new("alpha", Some("second".into()))
                .with_variables(vec![EnvVariable::new("K", "V")]),
        );

        assert!(store.save(&profiles));
        let loaded = store.load();

        assert_eq!(loaded, profiles);
        let names: Vec<_> = loaded.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[test]
    fn test_save_is_pretty_printed() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let mut profiles = ProfileCollection::default();
        profiles.push(EnvProfile::new("dev", None));

        assert!(store.save(&profiles));

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.starts_with("[\n  {"));
        assert!(contents.contains("\"isActive\": false"));
    }

    #[test]
    fn test_load_missing_document_degrades_with_warning() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let loaded = store.load_checked();

        assert!(loaded.value.is_empty());
        assert!(loaded.warning.is_some());
        assert!(loaded.strict().is_err());
    }

    #[test]
    fn test_load_malformed_document_degrades_to_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.ensure_initialized().unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().is_empty());
        assert!(store.try_load().is_err());
    }

    #[test]
    fn test_save_into_unwritable_location_returns_false() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();
        let store = ProfileStore::new(blocker.join("profiles.json"));

        assert!(!store.save(&ProfileCollection::default()));
    }
}
