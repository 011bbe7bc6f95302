//! On-disk encodings of stored artifacts.

use crate::error::{AnalogError, Result};
use crate::store::Metadata;
use serde::{Deserialize, Serialize};

/// What a file holds: the metadata next to the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub metadata: Metadata,
    pub data: serde_json::Value,
}

/// An artifact encoding.
pub trait Format: Send + Sync {
    fn name(&self) -> &str;

    /// File extension, dot included.
    fn extension(&self) -> &str;

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Envelope>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn name(&self) -> &str {
        "json"
    }

    fn extension(&self) -> &str {
        ".json"
    }

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(envelope)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Formats available to a [`crate::store::FileStore`], by name.
pub struct FormatRegistry {
    formats: Vec<Box<dyn Format>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Registry holding `json`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(JsonFormat));
        registry
    }

    pub fn register(&mut self, format: Box<dyn Format>) {
        self.formats.retain(|f| f.name() != format.name());
        self.formats.push(format);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Format> {
        self.formats
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
            .ok_or_else(|| AnalogError::UnknownComponent {
                kind: "format",
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.formats.iter().map(|f| f.name()).collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_envelope_round_trip() {
        let mut metadata = Metadata::new();
        metadata.insert("description".into(), json!("speeds"));
        let envelope = Envelope {
            metadata,
            data: json!({"V": [400.0, null]}),
        };
        let format = FormatRegistry::with_defaults();
        let json = format.get("json").unwrap();
        let bytes = json.encode(&envelope).unwrap();
        assert_eq!(json.decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn unknown_format() {
        let err = FormatRegistry::default().get("pkl").err().unwrap();
        assert!(err.is_configuration());
        assert_eq!(FormatRegistry::default().names(), vec!["json"]);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let result = JsonFormat.decode(b"not json");
        assert!(matches!(result, Err(AnalogError::Serialization(_))));
    }
}
