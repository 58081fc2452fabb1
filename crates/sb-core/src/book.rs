//! Book: outcome record of one trial

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of one simulated trial
///
/// Serialized as one JSON object: a 1-based `id` (`trial_index + 1`) next
/// to the kernel's payload fields. The payload is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    id: u64,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Book {
    /// Create a book for a trial from an object payload
    ///
    /// An `id` key inside the payload is dropped; the trial index owns it.
    pub fn new(trial_index: u64, mut payload: Map<String, Value>) -> Self {
        payload.remove("id");
        Self {
            id: trial_index + 1,
            payload,
        }
    }

    /// Create a book from any JSON value
    ///
    /// Non-object values are stored under `outcome`.
    pub fn from_value(trial_index: u64, value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(trial_index, map),
            other => {
                let mut map = Map::new();
                map.insert("outcome".to_string(), other);
                Self::new(trial_index, map)
            }
        }
    }

    /// Book id as written to disk (1-based)
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Global trial index (0-based)
    pub fn trial_index(&self) -> u64 {
        self.id.saturating_sub(1)
    }

    /// Kernel payload
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Single payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Serialize as one JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse one JSON line
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}
