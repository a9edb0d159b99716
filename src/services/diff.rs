//! Change detection between stored and incoming records.

use crate::models::Record;
use serde_json::Value;

/// Decides whether an incoming record would change a stored one.
///
/// The comparison is a subset check: only keys present in the incoming
/// record are examined, so a row that omits a field never changes it.
///
/// | Incoming | Stored | Change when |
/// |----------|--------|-------------|
/// | key absent | any | never |
/// | system key | any | never |
/// | any | key absent | never |
/// | scalar or null | any | values differ (numbers compared numerically) |
/// | array | array | lengths differ, or any element pair differs |
/// | array | other | always |
/// | object | object | any incoming key differs (recursive) |
/// | object | other | always |
///
/// Array elements are compared pairwise by position. Objects recurse,
/// arrays recurse, scalars compare strictly, and a pair of different
/// shapes counts as a change.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine<'a> {
    system_keys: &'a [String],
}

impl<'a> DiffEngine<'a> {
    /// Creates a diff engine that ignores the given keys at every depth.
    #[must_use]
    pub const fn new(system_keys: &'a [String]) -> Self {
        Self { system_keys }
    }

    /// Returns whether writing `incoming` over `existing` changes anything.
    #[must_use]
    pub fn has_changes(&self, existing: &Record, incoming: &Record) -> bool {
        incoming.iter().any(|(key, new_value)| {
            if self.is_system_key(key) {
                return false;
            }
            existing
                .get(key)
                .is_some_and(|old_value| self.value_changed(old_value, new_value))
        })
    }

    fn value_changed(&self, old: &Value, new: &Value) -> bool {
        match (old, new) {
            (Value::Object(old), Value::Object(new)) => self.has_changes(old, new),
            (Value::Array(old), Value::Array(new)) => {
                old.len() != new.len()
                    || old.iter().zip(new).any(|(o, n)| self.element_changed(o, n))
            },
            (_, Value::Object(_) | Value::Array(_)) => true,
            (old, new) => !strict_eq(old, new),
        }
    }

    fn element_changed(&self, old: &Value, new: &Value) -> bool {
        match (old, new) {
            (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_)) => {
                self.value_changed(old, new)
            },
            (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
                true
            },
            (old, new) => !strict_eq(old, new),
        }
    }

    fn is_system_key(&self, key: &str) -> bool {
        self.system_keys.iter().any(|k| k == key)
    }
}

/// Strict scalar equality. Numbers compare by value, so `5` equals `5.0`;
/// a number never equals a string.
#[allow(clippy::float_cmp)]
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}
