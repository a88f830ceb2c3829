//! Values of the non-text fields of a record.
//!
//! Records read from JSON lines keep every field they were read with, so
//! that removal writes them back with the same schema. Scalars get their own
//! variant; arrays and objects are carried as [`FieldValue::Json`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// RFC 3339 strings are recognized when reading JSON.
    DateTime(DateTime<Utc>),
    Json(Value),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric reading used to rank records by a metadata field.
    ///
    /// Booleans rank as 0 or 1, datetimes by Unix timestamp, and text only
    /// when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) if f.is_finite() => Some(*f),
            FieldValue::Boolean(b) => Some(f64::from(u8::from(*b))),
            FieldValue::DateTime(dt) => Some(dt.timestamp() as f64),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => FieldValue::Integer(i),
                // u64 beyond i64::MAX would lose precision as f64
                (None, Some(_)) if n.is_u64() => FieldValue::Json(Value::Number(n)),
                (None, Some(f)) => FieldValue::Float(f),
                (None, None) => FieldValue::Json(Value::Number(n)),
            },
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                .unwrap_or(FieldValue::Text(s)),
            nested => FieldValue::Json(nested),
        }
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            // JSON has no NaN or infinity
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Null => Value::Null,
        }
    }
}
