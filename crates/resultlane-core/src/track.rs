use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Description of the track the results belong to. It names the track in
/// failure messages and is embedded in JSON exports on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Whatever else the host knows about the track (plugin key, colours...).
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl TrackInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            file: None,
            properties: Map::new(),
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The track as a JSON value, for embedding in an exported document.
    #[must_use]
    pub fn description(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
