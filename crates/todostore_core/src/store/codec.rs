//! Table encoding for the persisted slot.
//!
//! The slot holds one JSON object `{ "<id key>": <record>, ... }`. Keys follow
//! table order and each record keeps its own field order.

use crate::model::record::Record;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Why a persisted table could not be decoded.
#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    NotAnObject { key: String },
    IdMismatch { key: String, found: Option<String> },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "{err}"),
            Self::NotAnObject { key } => write!(f, "entry `{key}` is not a JSON object"),
            Self::IdMismatch { key, found } => match found {
                Some(id) => write!(f, "entry `{key}` carries id `{id}`"),
                None => write!(f, "entry `{key}` has no usable id"),
            },
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

struct TableView<'a>(&'a [(&'a str, &'a Record)]);

impl Serialize for TableView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, record)| (*key, *record)))
    }
}

/// Encodes records (already in table order) as one compact JSON object.
pub fn encode_table(entries: &[(&str, &Record)]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&TableView(entries))
}

/// Decodes a persisted table, validating that every entry's id matches its
/// key. Returns entries in encoded order.
pub fn decode_table(raw: &str) -> Result<Vec<(String, Record)>, DecodeError> {
    let table: Map<String, Value> = serde_json::from_str(raw)?;
    table
        .into_iter()
        .map(|(key, value)| {
            let record =
                Record::from_value(value).ok_or_else(|| DecodeError::NotAnObject { key: key.clone() })?;
            match record.id() {
                Some(id) if id.key() == key => Ok((key, record)),
                other => Err(DecodeError::IdMismatch {
                    key,
                    found: other.map(|id| id.key()),
                }),
            }
        })
        .collect()
}
