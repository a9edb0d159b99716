//! Record, row and reference types.
//!
//! Records and rows are both JSON object maps. A [`Record`] is the
//! semi-structured, schema-shaped form (nested component objects, arrays of
//! references); a [`Row`] is the flat, spreadsheet-friendly form where every
//! value is a scalar cell.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A schema-shaped record: field name to JSON value.
pub type Record = Map<String, Value>;

/// A flat spreadsheet row: column name to cell value.
pub type Row = Map<String, Value>;

/// Name of the identifier field carried by every stored record.
pub const ID_FIELD: &str = "id";

/// Identifier of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Interprets a cell or field value as a record ID.
    ///
    /// Accepts integers and integer-looking strings. Blank markers (`null`,
    /// empty string, the literal strings `"null"` and `"undefined"`) yield
    /// `None`, as does anything non-numeric.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self),
            Value::String(s) if !is_blank_marker(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns this ID as a JSON value.
    #[must_use]
    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A resolved pointer to another record.
///
/// Always serialises as `{"id": <n>}` and never carries target data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Target record ID.
    pub id: RecordId,
}

impl Reference {
    /// Creates a reference to the given record.
    #[must_use]
    pub const fn new(id: RecordId) -> Self {
        Self { id }
    }

    /// Converts the reference into its JSON object form.
    #[must_use]
    pub fn to_value(self) -> Value {
        let mut map = Map::new();
        map.insert(ID_FIELD.to_string(), self.id.to_value());
        Value::Object(map)
    }

    /// Reads a reference from a JSON value.
    ///
    /// Accepts `{"id": n}` objects (extra keys are ignored, so a populated
    /// record also yields its reference).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_object()
            .and_then(|obj| obj.get(ID_FIELD))
            .and_then(RecordId::from_value)
            .map(Self::new)
    }

    /// Returns whether a value is exactly the reference shape `{"id": n}`.
    #[must_use]
    pub fn is_reference_shape(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| obj.len() == 1 && Self::from_value(value).is_some())
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        reference.to_value()
    }
}

/// Returns whether a string is one of the "no value" markers used by
/// spreadsheets and JavaScript-originated exports.
#[must_use]
pub fn is_blank_marker(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty() || trimmed == "null" || trimmed == "undefined"
}

/// Returns whether a value carries no information (`null` or a blank marker).
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => is_blank_marker(s),
        _ => false,
    }
}

/// Extracts a record's identifier, if it carries a usable one.
#[must_use]
pub fn record_id(record: &Record) -> Option<RecordId> {
    record.get(ID_FIELD).and_then(RecordId::from_value)
}
