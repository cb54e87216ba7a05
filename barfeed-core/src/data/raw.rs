//! Parsed provider payloads, still under provider-native field names.
//!
//! A `RawTable` only ever travels from a parser to the normalizer.

use chrono::NaiveDateTime;
use std::fmt;

/// A primitive value as delivered by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Timestamp(NaiveDateTime),
    Null,
}

impl RawValue {
    /// Map a JSON scalar onto a raw value. Arrays and objects are not scalars.
    pub fn from_json(value: &serde_json::Value) -> Option<RawValue> {
        match value {
            serde_json::Value::Null => Some(RawValue::Null),
            serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
            serde_json::Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => RawValue::Integer(i),
                (None, Some(f)) => RawValue::Number(f),
                // Left as text so the normalizer reports it with its row.
                (None, None) => RawValue::Text(n.to_string()),
            }),
            serde_json::Value::Bool(b) => Some(RawValue::Text(b.to_string())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Integer(i) => write!(f, "{i}"),
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Timestamp(t) => write!(f, "{t}"),
            RawValue::Null => f.write_str("null"),
        }
    }
}

/// One delivered row: field names and values in delivery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: RawValue) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Rows in delivery order plus the declared field set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
