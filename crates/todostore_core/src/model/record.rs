//! Raw record model.
//!
//! # Responsibility
//! - Represent one persisted unit as an ordered JSON object.
//! - Own the reserved `id` field and its key form.
//!
//! # Invariants
//! - Field order is insertion order and survives serialization.
//! - `RecordId::key()` is the mapping key used by the persisted table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Reserved record field holding the record id.
pub const ID_FIELD: &str = "id";

/// Identifier assigned by the store when a record is added.
///
/// Encoded untagged: sequential ids are JSON numbers, random tokens are
/// JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Seq(u64),
    Token(String),
}

impl RecordId {
    /// Mapping key used for this id in the persisted table.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Reads an id from a JSON value; only unsigned integers and non-empty
    /// strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_u64().map(Self::Seq),
            Value::String(token) if !token.trim().is_empty() => Some(Self::Token(token.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Seq(value) => Value::from(*value),
            Self::Token(token) => Value::String(token.clone()),
        }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seq(value) => write!(f, "{value}"),
            Self::Token(token) => f.write_str(token),
        }
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self::Seq(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Token(value.to_string())
    }
}

/// One persisted unit: a field map plus the reserved `id` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds a record from any JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Inserts or replaces a field, keeping the position of an existing key.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Returns the record id, if one is present and well-formed.
    pub fn id(&self) -> Option<RecordId> {
        self.fields.get(ID_FIELD).and_then(RecordId::from_value)
    }

    /// Stamps `id` onto the record.
    pub fn set_id(&mut self, id: &RecordId) {
        self.fields.insert(ID_FIELD.to_string(), id.to_value());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordId};
    use serde_json::json;

    #[test]
    fn set_id_keeps_existing_field_position() {
        let mut record = Record::new()
            .with("title", "x")
            .with("id", json!(null))
            .with("done", false);
        record.set_id(&RecordId::Seq(7));

        let keys: Vec<_> = record.fields().keys().cloned().collect();
        assert_eq!(keys, vec!["title", "id", "done"]);
        assert_eq!(record.id(), Some(RecordId::Seq(7)));
    }

    #[test]
    fn null_or_blank_id_is_absent() {
        assert_eq!(Record::new().with("id", json!(null)).id(), None);
        assert_eq!(Record::new().with("id", " ").id(), None);
        assert_eq!(Record::new().with("id", -3).id(), None);
    }

    #[test]
    fn id_key_form_matches_json_encoding() {
        assert_eq!(RecordId::Seq(12).key(), "12");
        assert_eq!(RecordId::from("ab-cd").key(), "ab-cd");
        assert_eq!(serde_json::to_value(RecordId::Seq(12)).unwrap(), json!(12));
        assert_eq!(
            serde_json::from_value::<RecordId>(json!("ab-cd")).unwrap(),
            RecordId::from("ab-cd")
        );
    }
}
