//! Structured record filters.
//!
//! Filters are evaluated against populated records. Field paths may use dots
//! to reach into components and populated relations (`owner.email`).

use super::record::Record;
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator of a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// Equal (`$eq`).
    Eq,
    /// Not equal (`$ne`).
    Ne,
    /// Value in list (`$in`).
    In,
    /// Value not in list (`$notIn`).
    NotIn,
    /// Substring, case-sensitive (`$contains`).
    Contains,
    /// Substring, case-insensitive (`$containsi`).
    ContainsI,
    /// No substring (`$notContains`).
    NotContains,
    /// Prefix (`$startsWith`).
    StartsWith,
    /// Suffix (`$endsWith`).
    EndsWith,
    /// Less than (`$lt`).
    Lt,
    /// Less than or equal (`$lte`).
    Lte,
    /// Greater than (`$gt`).
    Gt,
    /// Greater than or equal (`$gte`).
    Gte,
    /// Is null (`$null`).
    Null,
    /// Is not null (`$notNull`).
    NotNull,
}

impl FilterOp {
    /// Parses a query-string operator such as `$eq`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$in" => Self::In,
            "$notIn" => Self::NotIn,
            "$contains" => Self::Contains,
            "$containsi" => Self::ContainsI,
            "$notContains" => Self::NotContains,
            "$startsWith" => Self::StartsWith,
            "$endsWith" => Self::EndsWith,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$null" => Self::Null,
            "$notNull" => Self::NotNull,
            _ => return None,
        };
        Some(op)
    }

    /// Returns the query-string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::In => "$in",
            Self::NotIn => "$notIn",
            Self::Contains => "$contains",
            Self::ContainsI => "$containsi",
            Self::NotContains => "$notContains",
            Self::StartsWith => "$startsWith",
            Self::EndsWith => "$endsWith",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Null => "$null",
            Self::NotNull => "$notNull",
        }
    }
}

/// A filter expression over records.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every record.
    #[default]
    All,
    /// A single field predicate.
    Field {
        /// Dotted field path.
        field: String,
        /// Operator.
        op: FilterOp,
        /// Operand (a list for `In`/`NotIn`).
        value: Value,
    },
    /// All sub-filters must match.
    And(Vec<Filter>),
    /// At least one sub-filter must match.
    Or(Vec<Filter>),
}

impl Filter {
    /// Creates an `$eq` predicate.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, FilterOp::Eq, value)
    }

    /// Creates an `$in` predicate.
    #[must_use]
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::field(field, FilterOp::In, Value::Array(values))
    }

    /// Creates a predicate with an arbitrary operator.
    #[must_use]
    pub fn field(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::Field {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Combines two filters with AND, flattening trivial cases.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            },
            (Self::And(mut a), f) => {
                a.push(f);
                Self::And(a)
            },
            (f, g) => Self::And(vec![f, g]),
        }
    }

    /// Returns whether the filter matches everything.
    #[must_use]
    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::And(parts) => parts.iter().all(Self::is_all),
            _ => false,
        }
    }

    /// Evaluates the filter against a record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::And(parts) => parts.iter().all(|f| f.matches(record)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(record)),
            Self::Field { field, op, value } => {
                let actual = lookup_path(record, field);
                evaluate(actual, *op, value)
            },
        }
    }
}

/// Resolves a dotted path inside a record.
///
/// Arrays along the path are searched element-wise; the first element that
/// yields a value wins, mirroring how a relational filter on a to-many
/// relation matches if any related row matches.
fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = record.get(first)?;
    for part in parts {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(items) => items
                .iter()
                .find_map(|item| item.as_object().and_then(|o| o.get(part)))?,
            _ => return None,
        };
    }
    Some(current)
}

fn evaluate(actual: Option<&Value>, op: FilterOp, operand: &Value) -> bool {
    match op {
        FilterOp::Null => actual.is_none_or(Value::is_null) == operand_truthy(operand),
        FilterOp::NotNull => actual.is_some_and(|v| !v.is_null()) == operand_truthy(operand),
        FilterOp::Ne => !actual.is_some_and(|v| any_loose_eq(v, operand)),
        FilterOp::NotIn => !actual.is_some_and(|v| operand_list(operand).any(|o| any_loose_eq(v, o))),
        FilterOp::NotContains => !actual.is_some_and(|v| text_test(v, operand, |a, b| a.contains(b))),
        _ => actual.is_some_and(|v| evaluate_present(v, op, operand)),
    }
}

fn evaluate_present(actual: &Value, op: FilterOp, operand: &Value) -> bool {
    match op {
        FilterOp::Eq => any_loose_eq(actual, operand),
        FilterOp::In => operand_list(operand).any(|o| any_loose_eq(actual, o)),
        FilterOp::Contains => text_test(actual, operand, |a, b| a.contains(b)),
        FilterOp::ContainsI => text_test(actual, operand, |a, b| {
            a.to_lowercase().contains(&b.to_lowercase())
        }),
        FilterOp::StartsWith => text_test(actual, operand, |a, b| a.starts_with(b)),
        FilterOp::EndsWith => text_test(actual, operand, |a, b| a.ends_with(b)),
        FilterOp::Lt => compare(actual, operand).is_some_and(Ordering::is_lt),
        FilterOp::Lte => compare(actual, operand).is_some_and(Ordering::is_le),
        FilterOp::Gt => compare(actual, operand).is_some_and(Ordering::is_gt),
        FilterOp::Gte => compare(actual, operand).is_some_and(Ordering::is_ge),
        FilterOp::Ne
        | FilterOp::NotIn
        | FilterOp::NotContains
        | FilterOp::Null
        | FilterOp::NotNull => false,
    }
}

fn operand_list(operand: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match operand {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

fn operand_truthy(operand: &Value) -> bool {
    match operand {
        Value::Bool(b) => *b,
        Value::String(s) => !matches!(s.as_str(), "false" | "0" | ""),
        Value::Null => false,
        _ => true,
    }
}

/// Equality that tolerates query-string operands (`"30"` equals `30`).
///
/// When the actual value is an array, any element may match.
fn any_loose_eq(actual: &Value, operand: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| loose_eq(item, operand)),
        _ => loose_eq(actual, operand),
    }
}

/// Compares two scalars, coercing numeric strings and boolean strings.
#[must_use]
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        },
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            s.parse::<bool>().ok() == Some(*x)
        },
        _ => a == b,
    }
}

fn text_test(actual: &Value, operand: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    let Some(needle) = scalar_text(operand) else {
        return false;
    };
    match actual {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .any(|hay| test(&hay, &needle)),
        other => scalar_text(other).is_some_and(|hay| test(&hay, &needle)),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(actual: &Value, operand: &Value) -> Option<Ordering> {
    let as_number = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    if let (Some(a), Some(b)) = (as_number(actual), as_number(operand)) {
        return a.partial_cmp(&b);
    }
    match (actual, operand) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
