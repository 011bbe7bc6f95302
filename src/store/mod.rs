//! Persistence of derived artifacts.
//!
//! Stores are opaque key-value containers keyed by `(location, name, format)`.
//! Metadata is a free-form map attached at save time and never interpreted.

mod file;
mod format;
mod memory;

pub use file::FileStore;
pub use format::{Envelope, Format, FormatRegistry, JsonFormat};
pub use memory::MemoryStore;

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form metadata attached to a saved artifact.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Address of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub location: String,
    pub name: String,
    pub format: String,
}

impl ArtifactKey {
    pub fn new(
        location: impl Into<String>,
        name: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
            format: format.into(),
        }
    }

    /// Key in JSON format.
    pub fn json(location: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(location, name, "json")
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.location, self.name, self.format)
    }
}

/// Persistence contract consumed by the pipeline and the sweep.
pub trait ArtifactStore: Send + Sync {
    fn save_value(
        &self,
        key: &ArtifactKey,
        value: serde_json::Value,
        metadata: Metadata,
    ) -> Result<()>;

    fn load_value(&self, key: &ArtifactKey) -> Result<serde_json::Value>;

    fn read_metadata(&self, key: &ArtifactKey) -> Result<Metadata>;

    fn exists(&self, key: &ArtifactKey) -> bool;
}

/// Typed access on top of any [`ArtifactStore`].
pub trait ArtifactStoreExt: ArtifactStore {
    fn save<T: Serialize + ?Sized>(
        &self,
        key: &ArtifactKey,
        value: &T,
        metadata: Metadata,
    ) -> Result<()> {
        self.save_value(key, serde_json::to_value(value)?, metadata)
    }

    fn load<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<T> {
        Ok(serde_json::from_value(self.load_value(key)?)?)
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStoreExt for S {}

/// Metadata holding a single `description` entry.
pub fn describe(description: impl Into<String>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "description".to_string(),
        serde_json::Value::String(description.into()),
    );
    metadata
}
