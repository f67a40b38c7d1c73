//! Mutations applied by a conditional update once its precondition holds.

use serde_json::{Map, Value};

use crate::{Result, StoreError};

/// A change to a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Writes the whole document, creating it if absent.
    Insert(Value),
    /// Adds `by` to an integer field of an existing document.
    Increment { field: String, by: i64 },
    /// Merges top-level fields into an existing document.
    Set(Map<String, Value>),
}

impl Mutation {
    /// Shorthand for an increment (use a negative `by` to decrement).
    pub fn increment(field: impl Into<String>, by: i64) -> Self {
        Mutation::Increment {
            field: field.into(),
            by,
        }
    }

    /// Shorthand for merging a set of fields.
    pub fn set<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Mutation::Set(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Computes the new document from the current one.
    pub fn apply(&self, key: &str, current: Option<&Value>) -> Result<Value> {
        match self {
            Mutation::Insert(doc) => Ok(doc.clone()),
            Mutation::Increment { field, by } => {
                let mut doc = existing_object(key, current)?;
                let old = doc.get(field).and_then(Value::as_i64).ok_or_else(|| {
                    StoreError::invalid_mutation(key, format!("field '{field}' is not an integer"))
                })?;
                let new = old.checked_add(*by).ok_or_else(|| {
                    StoreError::invalid_mutation(key, format!("field '{field}' would overflow"))
                })?;
                doc.insert(field.clone(), Value::from(new));
                Ok(Value::Object(doc))
            }
            Mutation::Set(fields) => {
                let mut doc = existing_object(key, current)?;
                for (name, value) in fields {
                    doc.insert(name.clone(), value.clone());
                }
                Ok(Value::Object(doc))
            }
        }
    }
}

fn existing_object(key: &str, current: Option<&Value>) -> Result<Map<String, Value>> {
    match current {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(StoreError::invalid_mutation(key, "document is not an object")),
        None => Err(StoreError::invalid_mutation(key, "document does not exist")),
    }
}
