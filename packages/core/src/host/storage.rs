//! Default host storage
//!
//! The default host lives under the `default_host` key of the user config
//! file. Every read and write goes to disk; nothing is cached in memory.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use super::error::HostError;
use crate::config::paths::get_user_config_path;

const DEFAULT_HOST_KEY: &str = "default_host";

/// Persisted pointer to the default host
#[derive(Debug, Clone)]
pub struct DefaultHostStore {
    path: PathBuf,
}

impl DefaultHostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by ~/.pve-lxc/config.yaml
    pub fn from_default_path() -> Result<Self, HostError> {
        get_user_config_path()
            .map(Self::new)
            .ok_or_else(|| HostError::SaveFailed("Could not determine config path".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the default host
    ///
    /// A missing or unreadable file counts as "no default".
    pub fn get(&self) -> Option<String> {
        match self.load() {
            Ok(mapping) => mapping
                .get(DEFAULT_HOST_KEY)
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            Err(e) => {
                tracing::warn!("Ignoring default host store: {e}");
                None
            }
        }
    }

    /// Persist `name` as the default, or clear it with `None`
    ///
    /// Other keys in the file are preserved. A file that fails to parse is
    /// never overwritten.
    pub fn set(&self, name: Option<&str>) -> Result<(), HostError> {
        let mut mapping = self.load()?;

        match name {
            Some(name) => {
                mapping.insert(DEFAULT_HOST_KEY.into(), name.into());
            }
            None => {
                if mapping.remove(DEFAULT_HOST_KEY).is_none() {
                    return Ok(());
                }
            }
        }

        self.save(&mapping)?;
        tracing::debug!("Default host set to {:?} in {}", name, self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Mapping, HostError> {
        if !self.path.exists() {
            return Ok(Mapping::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            HostError::SaveFailed(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        match serde_yaml::from_str::<Value>(&contents) {
            Ok(Value::Null) => Ok(Mapping::new()),
            Ok(Value::Mapping(mapping)) => Ok(mapping),
            Ok(_) => Err(HostError::SaveFailed(format!(
                "{} is not a YAML mapping",
                self.path.display()
            ))),
            Err(e) => Err(HostError::SaveFailed(format!(
                "Invalid YAML in {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, mapping: &Mapping) -> Result<(), HostError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| HostError::SaveFailed(format!("Failed to create directory: {e}")))?;
            }
        }

        // Create backup if file exists
        if self.path.exists() {
            let backup_path = self.path.with_extension("yaml.bak");
            fs::copy(&self.path, &backup_path)
                .map_err(|e| HostError::SaveFailed(format!("Failed to create backup: {e}")))?;
            tracing::debug!("Created config backup: {}", backup_path.display());
        }

        let yaml = serde_yaml::to_string(mapping)
            .map_err(|e| HostError::SaveFailed(format!("Failed to serialize: {e}")))?;

        fs::write(&self.path, yaml).map_err(|e| {
            HostError::SaveFailed(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, DefaultHostStore) {
        let dir = TempDir::new().unwrap();
        let store = DefaultHostStore::new(dir.path().join("nested").join("config.yaml"));
        (dir, store)
    }

    #[test]
    fn missing_file_has_no_default() {
        let (_dir, store) = store();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn set_persists_across_instances() {
        let (_dir, store) = store();
        store.set(Some("pve1")).unwrap();

        let fresh = DefaultHostStore::new(store.path());
        assert_eq!(fresh.get().as_deref(), Some("pve1"));
    }

    #[test]
    fn clear_removes_only_the_default_key() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "default_host: pve1\ncontainer:\n  cores: 4\n").unwrap();

        store.set(None).unwrap();
        assert_eq!(store.get(), None);

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains("cores: 4"));
        assert!(!contents.contains("default_host"));
    }

    #[test]
    fn clear_without_file_does_not_create_one() {
        let (_dir, store) = store();
        store.set(None).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_file_reads_as_no_default_and_is_not_overwritten() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "default_host: [unclosed\n").unwrap();

        assert_eq!(store.get(), None);
        assert!(matches!(store.set(Some("pve1")), Err(HostError::SaveFailed(_))));
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "default_host: [unclosed\n"
        );
    }

    #[test]
    fn non_string_default_is_ignored() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "default_host: 42\n").unwrap();
        assert_eq!(store.get(), None);
    }
}
