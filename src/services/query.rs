//! Export query parser.
//!
//! Parses URL-style query parameters into a [`Filter`]:
//! - `filters[$and][0][name][$contains]=acme` - AND group entry
//! - `filters[$or][1][city][$eq]=Oslo` - OR group entry
//! - `filters[name][$eq]=Acme` - plain field condition
//! - `filters[owner][email][$eq]=a@x.com` - condition on a related field
//! - `filters[$or][0][owner][email]=a@x.com` - related field inside a group
//! - `_q=acme` - free-text search (see [`search_filter`])
//!
//! Entries of one group index are AND-ed. `$and` groups are AND-ed with
//! each other and `$or` groups are OR-ed. A missing operator means `$eq`.
//! `$in` and `$notIn` values are comma-separated. Pagination, sorting,
//! locale and format keys are ignored.

use crate::models::{Filter, FilterOp, RecordType};
use crate::schema::{numeric_fields, searchable_fields};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Query keys that never produce filters.
const IGNORED_KEYS: &[&str] = &["page", "pageSize", "sort", "locale", "format", "contentType"];

/// Query key carrying the free-text search.
pub const SEARCH_KEY: &str = "_q";

static FILTER_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^filters(?:\[[^\[\]]+\])+$")
        .unwrap_or_else(|_| unreachable!("filter key pattern is valid"))
});

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\[\]]+)\]").unwrap_or_else(|_| unreachable!("segment pattern is valid"))
});

/// A parsed export query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportQuery {
    /// Structured filter.
    pub filter: Filter,
    /// Free-text search, if any.
    pub search: Option<String>,
}

/// Parses query parameters into an [`ExportQuery`].
///
/// Keys that are neither `filters[...]` nor `_q` are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a malformed `filters[...]` key or an
/// unknown operator.
///
/// # Examples
///
/// ```
/// use sheetbridge::services::parse_query;
///
/// let query = parse_query([
///     ("filters[$and][0][name][$containsi]", "acme"),
///     ("page", "2"),
///     ("_q", "oslo"),
/// ])
/// .unwrap();
/// assert!(!query.filter.is_all());
/// assert_eq!(query.search.as_deref(), Some("oslo"));
/// ```
pub fn parse_query<'a, I>(params: I) -> Result<ExportQuery>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut and_groups: BTreeMap<usize, Vec<Filter>> = BTreeMap::new();
    let mut or_groups: BTreeMap<usize, Vec<Filter>> = BTreeMap::new();
    let mut plain = Vec::new();
    let mut search = None;

    for (key, value) in params {
        if key == SEARCH_KEY {
            search = Some(value.trim().to_string()).filter(|q| !q.is_empty());
            continue;
        }
        if IGNORED_KEYS.contains(&key) || !key.starts_with("filters[") {
            continue;
        }

        if !FILTER_KEY.is_match(key) {
            return Err(malformed(key));
        }
        let segments: Vec<&str> = SEGMENT
            .captures_iter(key)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        match segments.as_slice() {
            [group @ ("$and" | "$or"), index, rest @ ..] => {
                let index: usize = index.parse().map_err(|_| malformed(key))?;
                let condition = condition(key, rest, value)?;
                let groups = if *group == "$and" {
                    &mut and_groups
                } else {
                    &mut or_groups
                };
                groups.entry(index).or_default().push(condition);
            },
            rest => plain.push(condition(key, rest, value)?),
        }
    }

    let mut filter = Filter::All;
    for condition in plain {
        filter = filter.and(condition);
    }
    for group in and_groups.into_values() {
        filter = filter.and(all_of(group));
    }
    if !or_groups.is_empty() {
        filter = filter.and(Filter::Or(or_groups.into_values().map(all_of).collect()));
    }

    Ok(ExportQuery { filter, search })
}

/// Builds the free-text search filter for a record type.
///
/// Case-insensitive containment across text-like fields, OR-ed with
/// equality across numeric fields and `id` when the query is a number.
#[must_use]
pub fn search_filter(record_type: &RecordType, query: &str) -> Filter {
    let mut conditions: Vec<Filter> = searchable_fields(record_type)
        .into_iter()
        .map(|field| Filter::field(field, FilterOp::ContainsI, query))
        .collect();

    let number = query
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64);
    if let Some(number) = number {
        conditions.extend(
            numeric_fields(record_type)
                .into_iter()
                .map(|field| Filter::eq(field, Value::Number(number.clone()))),
        );
    }

    Filter::Or(conditions)
}

fn malformed(key: &str) -> Error {
    Error::InvalidInput(format!("Malformed filter key: {key}"))
}

/// Builds a condition from `<path segments...>[<operator>]`.
fn condition(key: &str, segments: &[&str], raw: &str) -> Result<Filter> {
    let (operator, path) = match segments.split_last() {
        Some((last, path)) if last.starts_with('$') => (*last, path),
        _ => ("$eq", segments),
    };
    if path.is_empty() || path.iter().any(|s| s.starts_with('$')) {
        return Err(malformed(key));
    }
    let field = path.join(".");

    let op = FilterOp::parse(operator)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown filter operator: {operator}")))?;
    let value = match op {
        FilterOp::In | FilterOp::NotIn => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    };
    Ok(Filter::field(field, op, value))
}

fn all_of(mut conditions: Vec<Filter>) -> Filter {
    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        Filter::And(conditions)
    }
}
