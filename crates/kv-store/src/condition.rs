//! Preconditions evaluated atomically with a conditional update.

use serde_json::Value;

/// A check on one top-level field of the current document.
///
/// A missing field is treated as JSON `null`. Numeric comparisons only hold
/// for integer fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCheck {
    /// Field is an integer strictly greater than the operand.
    GreaterThan(i64),
    /// Field is an integer strictly less than the operand.
    LessThan(i64),
    /// Field is an integer strictly less than another integer field of the same document.
    LessThanField(String),
    /// Field equals the given JSON value.
    Equals(Value),
    /// Field differs from the given JSON value.
    NotEquals(Value),
}

/// Condition that must hold on the current document for a mutation to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// Always holds, whether or not the document exists.
    Always,
    /// The document exists.
    Exists,
    /// The document does not exist.
    Absent,
    /// The document exists and the field check holds.
    Field { field: String, check: FieldCheck },
    /// Every nested precondition holds.
    All(Vec<Precondition>),
}

impl Precondition {
    /// Shorthand for a field check.
    pub fn field(field: impl Into<String>, check: FieldCheck) -> Self {
        Precondition::Field {
            field: field.into(),
            check,
        }
    }

    /// Combines two preconditions, flattening nested conjunctions.
    pub fn and(self, other: Precondition) -> Self {
        let mut all = match self {
            Precondition::All(items) => items,
            single => vec![single],
        };
        match other {
            Precondition::All(items) => all.extend(items),
            single => all.push(single),
        }
        Precondition::All(all)
    }

    /// Evaluates the precondition against the current document, if any.
    pub fn holds(&self, current: Option<&Value>) -> bool {
        match self {
            Precondition::Always => true,
            Precondition::Exists => current.is_some(),
            Precondition::Absent => current.is_none(),
            Precondition::Field { field, check } => match current {
                Some(doc) => check.holds(doc, field),
                None => false,
            },
            Precondition::All(items) => items.iter().all(|p| p.holds(current)),
        }
    }
}

impl FieldCheck {
    fn holds(&self, doc: &Value, field: &str) -> bool {
        let value = doc.get(field).unwrap_or(&Value::Null);
        match self {
            FieldCheck::GreaterThan(n) => value.as_i64().is_some_and(|v| v > *n),
            FieldCheck::LessThan(n) => value.as_i64().is_some_and(|v| v < *n),
            FieldCheck::LessThanField(other) => {
                match (value.as_i64(), doc.get(other).and_then(Value::as_i64)) {
                    (Some(v), Some(bound)) => v < bound,
                    _ => false,
                }
            }
            FieldCheck::Equals(expected) => value == expected,
            FieldCheck::NotEquals(expected) => value != expected,
        }
    }
}
