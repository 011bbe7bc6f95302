//! Artifacts as files under a root directory.

use crate::error::{AnalogError, Result};
use crate::store::{ArtifactKey, ArtifactStore, Envelope, FormatRegistry, Metadata};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stores every artifact at `<root>/<location>/<name><extension>`.
///
/// Saving adds `date` and `crate_version` to the caller's metadata. Files are
/// written to a temporary sibling and renamed into place.
pub struct FileStore {
    root: PathBuf,
    formats: FormatRegistry,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            formats: FormatRegistry::with_defaults(),
        }
    }

    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`.
    pub fn path(&self, key: &ArtifactKey) -> Result<PathBuf> {
        let extension = self.formats.get(&key.format)?.extension();
        let mut file_name = key.name.clone();
        if !file_name.ends_with(extension) {
            file_name.push_str(extension);
        }
        Ok(self.root.join(&key.location).join(file_name))
    }

    fn read_envelope(&self, key: &ArtifactKey) -> Result<Envelope> {
        let path = self.path(key)?;
        let bytes = std::fs::read(&path).map_err(|err| {
            AnalogError::Storage(format!("failed to read {}: {}", path.display(), err))
        })?;
        self.formats.get(&key.format)?.decode(&bytes)
    }
}

impl ArtifactStore for FileStore {
    fn save_value(
        &self,
        key: &ArtifactKey,
        value: serde_json::Value,
        mut metadata: Metadata,
    ) -> Result<()> {
        let format = self.formats.get(&key.format)?;
        let path = self.path(key)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&dir)?;

        metadata.insert(
            "date".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
        metadata.insert(
            "crate_version".to_string(),
            serde_json::Value::String(env!("CARGO_PKG_VERSION").to_string()),
        );
        let contents = format.encode(&Envelope {
            metadata,
            data: value,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&contents)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|err| {
            AnalogError::Storage(format!("failed to persist {}: {}", path.display(), err))
        })?;
        tracing::debug!(path = %path.display(), "artifact saved");
        Ok(())
    }

    fn load_value(&self, key: &ArtifactKey) -> Result<serde_json::Value> {
        Ok(self.read_envelope(key)?.data)
    }

    fn read_metadata(&self, key: &ArtifactKey) -> Result<Metadata> {
        Ok(self.read_envelope(key)?.metadata)
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.path(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{describe, ArtifactStoreExt};

    #[test]
    fn save_load_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let key = ArtifactKey::json("V_LP24", "analogues_V_LP24");

        assert!(!store.exists(&key));
        store
            .save(&key, &vec![1.0, 2.0, 3.0], describe("three values"))
            .unwrap();
        assert!(store.exists(&key));
        assert!(dir.path().join("V_LP24/analogues_V_LP24.json").is_file());

        let values: Vec<f64> = store.load(&key).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);

        let metadata = store.read_metadata(&key).unwrap();
        assert_eq!(metadata["description"], "three values");
        assert!(metadata.contains_key("date"));
        assert_eq!(metadata["crate_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn extension_is_not_doubled() {
        let store = FileStore::new("/data");
        let path = store.path(&ArtifactKey::json("run", "params.json")).unwrap();
        assert_eq!(path, PathBuf::from("/data/run/params.json"));
    }

    #[test]
    fn missing_file_and_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let missing = store.load_value(&ArtifactKey::json("a", "b"));
        assert!(matches!(missing, Err(AnalogError::Storage(_))));

        let pkl = ArtifactKey::new("a", "b", "pkl");
        assert!(!store.exists(&pkl));
        assert!(store.save_value(&pkl, serde_json::Value::Null, Metadata::new()).is_err());
    }
}
