//! In-process artifact store.

use crate::error::{AnalogError, Result};
use crate::store::{ArtifactKey, ArtifactStore, Metadata};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type Entries = HashMap<ArtifactKey, (Metadata, serde_json::Value)>;

/// Keeps artifacts in memory; shareable across sweep workers.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| AnalogError::Storage("memory store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of every stored artifact, sorted.
    pub fn keys(&self) -> Vec<ArtifactKey> {
        let mut keys: Vec<ArtifactKey> = self
            .entries()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn missing(key: &ArtifactKey) -> AnalogError {
        AnalogError::Storage(format!("no artifact at {}", key))
    }
}

impl ArtifactStore for MemoryStore {
    fn save_value(
        &self,
        key: &ArtifactKey,
        value: serde_json::Value,
        metadata: Metadata,
    ) -> Result<()> {
        self.entries()?.insert(key.clone(), (metadata, value));
        Ok(())
    }

    fn load_value(&self, key: &ArtifactKey) -> Result<serde_json::Value> {
        self.entries()?
            .get(key)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Self::missing(key))
    }

    fn read_metadata(&self, key: &ArtifactKey) -> Result<Metadata> {
        self.entries()?
            .get(key)
            .map(|(metadata, _)| metadata.clone())
            .ok_or_else(|| Self::missing(key))
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.entries().map(|e| e.contains_key(key)).unwrap_or(false)
    }
}
