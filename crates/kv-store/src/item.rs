use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// A stored document together with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The key the document is stored under.
    pub key: String,
    /// The JSON document.
    pub value: Value,
    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Creates an item stamped with the current time.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }

    /// Deserializes the document into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// Builds a namespaced key, e.g. `item_key("unit", "FL-0001")` → `unit/FL-0001`.
pub fn item_key(namespace: &str, id: impl std::fmt::Display) -> String {
    format!("{namespace}/{id}")
}
