//! Named, timestamped facts handed to a reporter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::epoch_millis;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer field.
    Int(i64),
    /// Floating point field.
    Float(f64),
    /// Boolean field.
    Bool(bool),
    /// String field.
    Str(String),
}

impl FieldValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Str(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A named fact with an arbitrary field bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Fact name (e.g. `task_completed`).
    pub name: String,
    /// When the fact was produced, in epoch milliseconds.
    pub timestamp_ms: i64,
    /// The field bag.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Fact {
    /// Creates a fact stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp_ms: epoch_millis(),
            fields: BTreeMap::new(),
        }
    }

    /// Creates a fact with the given fields.
    #[must_use]
    pub fn with_fields(name: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            fields,
            ..Self::new(name)
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn add_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Looks up a numeric field.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_builder() {
        let fact = Fact::new("task_completed")
            .add_field("duration", 42_i64)
            .add_field("executable", "run.sh");

        assert_eq!(fact.name, "task_completed");
        assert!(fact.timestamp_ms > 0);
        assert_eq!(fact.number("duration"), Some(42.0));
        assert_eq!(fact.number("executable"), None);
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let json = serde_json::to_string(&FieldValue::Int(3)).unwrap();
        assert_eq!(json, "3");
        let json = serde_json::to_string(&FieldValue::Str("x".to_string())).unwrap();
        assert_eq!(json, r#""x""#);
    }
}
