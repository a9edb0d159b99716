//! Record document rules shared by every backend.
//!
//! Backends only move raw JSON bodies in and out of a [`RecordTable`]; the
//! functions here validate writes, merge components, stamp timestamps and
//! populate relations on read.

use crate::models::{
    Cardinality, DataType, FieldKind, FieldSpec, ID_FIELD, Record, RecordId, RecordType,
    Reference,
};
use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Creation timestamp field, managed by the store.
pub const CREATED_AT: &str = "createdAt";
/// Update timestamp field, managed by the store.
pub const UPDATED_AT: &str = "updatedAt";

/// Raw storage of record bodies, keyed by record type and id.
pub trait RecordTable {
    /// Loads one raw body.
    fn load(&mut self, record_type: &str, id: RecordId) -> Result<Option<Record>>;

    /// Loads every raw body of a type, ordered by id.
    fn load_all(&mut self, record_type: &str) -> Result<Vec<Record>>;

    /// Reserves the next id for a type.
    fn next_id(&mut self, record_type: &str) -> Result<RecordId>;

    /// Inserts or replaces a raw body.
    fn save(&mut self, record_type: &str, id: RecordId, body: &Record) -> Result<()>;
}

/// Loads and populates one record.
pub fn find_by_id<T: RecordTable + ?Sized>(
    table: &mut T,
    record_type: &RecordType,
    id: RecordId,
) -> Result<Option<Record>> {
    table
        .load(&record_type.id, id)?
        .map(|raw| populate(table, record_type, raw))
        .transpose()
}

/// Loads, populates and filters every record of a type.
pub fn find_by_filter<T: RecordTable + ?Sized>(
    table: &mut T,
    record_type: &RecordType,
    filter: &crate::models::Filter,
) -> Result<Vec<Record>> {
    let mut matched = Vec::new();
    for raw in table.load_all(&record_type.id)? {
        let record = populate(table, record_type, raw)?;
        if filter.matches(&record) {
            matched.push(record);
        }
    }
    Ok(matched)
}

/// Validates and stores a new record.
pub fn create<T: RecordTable + ?Sized>(
    table: &mut T,
    record_type: &RecordType,
    data: Record,
) -> Result<Record> {
    let mut body = normalize(record_type, data)?;
    for (name, spec) in record_type.fields_of_kind(FieldKind::Component) {
        if let Some(value) = body.get_mut(name) {
            *value = merge_component(None, std::mem::take(value), spec.is_many());
        }
    }
    check_required(record_type, &body)?;

    let id = table.next_id(&record_type.id)?;
    let now = now();
    let mut stored = Record::new();
    stored.insert(ID_FIELD.to_string(), id.to_value());
    stored.extend(body);
    stored.insert(CREATED_AT.to_string(), Value::String(now.clone()));
    stored.insert(UPDATED_AT.to_string(), Value::String(now));

    table.save(&record_type.id, id, &stored)?;
    populate(table, record_type, stored)
}

/// Validates and applies a partial update.
pub fn update<T: RecordTable + ?Sized>(
    table: &mut T,
    record_type: &RecordType,
    id: RecordId,
    data: Record,
) -> Result<Record> {
    let mut stored = table
        .load(&record_type.id, id)?
        .ok_or_else(|| Error::write_rejected(&record_type.id, format!("record {id} not found")))?;

    for (key, value) in normalize(record_type, data)? {
        let merged = match record_type.field(&key) {
            Some(spec) if spec.is_component() => {
                merge_component(stored.get(&key), value, spec.is_many())
            },
            _ => value,
        };
        stored.insert(key, merged);
    }
    check_required(record_type, &stored)?;
    stored.insert(UPDATED_AT.to_string(), Value::String(now()));

    table.save(&record_type.id, id, &stored)?;
    populate(table, record_type, stored)
}

/// Replaces `{id}` references with the target bodies, one level deep.
///
/// Dangling references read as `null` (to-one) or are dropped (to-many).
pub fn populate<T: RecordTable + ?Sized>(
    table: &mut T,
    record_type: &RecordType,
    mut record: Record,
) -> Result<Record> {
    for (name, spec) in record_type.fields_of_kind(FieldKind::Relation) {
        let Some(target) = spec.target.as_deref() else {
            continue;
        };
        let Some(value) = record.get_mut(name) else {
            continue;
        };

        *value = match std::mem::take(value) {
            Value::Array(items) => {
                let mut populated = Vec::with_capacity(items.len());
                for item in &items {
                    if let Some(reference) = Reference::from_value(item) {
                        if let Some(body) = table.load(target, reference.id)? {
                            populated.push(Value::Object(body));
                        }
                    }
                }
                Value::Array(populated)
            },
            other => match Reference::from_value(&other) {
                Some(reference) => table
                    .load(target, reference.id)?
                    .map_or(Value::Null, Value::Object),
                None => Value::Null,
            },
        };
    }
    Ok(record)
}

/// Checks every key against the record type and normalizes values.
///
/// The id and store-managed timestamps are dropped.
fn normalize(record_type: &RecordType, data: Record) -> Result<Record> {
    let mut body = Record::new();
    for (key, value) in data {
        if key == ID_FIELD || key == CREATED_AT || key == UPDATED_AT {
            continue;
        }
        let Some(spec) = record_type.field(&key) else {
            return Err(Error::write_rejected(
                &record_type.id,
                format!("unknown field {key}"),
            ));
        };
        let value = normalize_value(spec, value).map_err(|reason| {
            Error::write_rejected(&record_type.id, format!("field {key} {reason}"))
        })?;
        if spec.kind != FieldKind::Identifier {
            body.insert(key, value);
        }
    }
    Ok(body)
}

fn normalize_value(spec: &FieldSpec, value: Value) -> std::result::Result<Value, String> {
    match spec.kind {
        FieldKind::Identifier | FieldKind::Media => Ok(value),
        FieldKind::Relation => normalize_relation(spec.cardinality(), value),
        FieldKind::Component => normalize_component(spec.cardinality(), value),
        FieldKind::Primitive if spec.custom_list => match value {
            Value::Null | Value::Array(_) => Ok(value),
            other => Err(format!("expects a list, got {other}")),
        },
        FieldKind::Primitive => normalize_primitive(spec.data_type(), value),
    }
}

fn normalize_relation(cardinality: Cardinality, value: Value) -> std::result::Result<Value, String> {
    let reference = |item: &Value| {
        if Reference::is_reference_shape(item) {
            Reference::from_value(item).map(Value::from)
        } else {
            None
        }
    };

    match (cardinality, value) {
        (Cardinality::One, Value::Null) => Ok(Value::Null),
        (Cardinality::Many, Value::Null) => Ok(Value::Array(Vec::new())),
        (Cardinality::Many, Value::Array(items)) => items
            .iter()
            .map(|item| reference(item).ok_or_else(|| format!("expects {{id}} references, got {item}")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array),
        (Cardinality::Many, other) => Err(format!("expects a list of {{id}} references, got {other}")),
        (Cardinality::One, other) => {
            reference(&other).ok_or_else(|| format!("expects an {{id}} reference, got {other}"))
        },
    }
}

fn normalize_component(cardinality: Cardinality, value: Value) -> std::result::Result<Value, String> {
    match (cardinality, value) {
        (_, Value::Null) => Ok(Value::Null),
        (Cardinality::One, obj @ Value::Object(_)) => Ok(obj),
        (Cardinality::Many, Value::Array(items)) if items.iter().all(Value::is_object) => {
            Ok(Value::Array(items))
        },
        (_, other) => Err(format!("expects component data, got {other}")),
    }
}

fn normalize_primitive(data_type: DataType, value: Value) -> std::result::Result<Value, String> {
    if value.is_null() {
        return Ok(value);
    }
    let ok = match data_type {
        DataType::Integer | DataType::BigInteger => value.is_i64() || value.is_u64(),
        DataType::Float | DataType::Decimal | DataType::Number => value.is_number(),
        DataType::Boolean => value.is_boolean(),
        DataType::Json => true,
        _ => {
            return match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("expects text, got {other}")),
            };
        },
    };
    if ok {
        Ok(value)
    } else {
        Err(format!(
            "expects {}, got {value}",
            serde_json::to_value(data_type)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default()
        ))
    }
}

/// Merges incoming component data over the stored component.
///
/// A block whose id matches a stored block updates it in place; any other
/// block is stored as new with a fresh id.
fn merge_component(existing: Option<&Value>, incoming: Value, many: bool) -> Value {
    match incoming {
        Value::Object(block) if !many => merge_block(existing.and_then(Value::as_object), block),
        Value::Array(blocks) if many => {
            let stored: Vec<&Map<String, Value>> = existing
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_object).collect())
                .unwrap_or_default();
            Value::Array(
                blocks
                    .into_iter()
                    .filter_map(|block| match block {
                        Value::Object(block) => {
                            let matched = block.get(ID_FIELD).and_then(|id| {
                                stored.iter().copied().find(|s| s.get(ID_FIELD) == Some(id))
                            });
                            Some(merge_block(matched, block))
                        },
                        _ => None,
                    })
                    .collect(),
            )
        },
        other => other,
    }
}

fn merge_block(existing: Option<&Map<String, Value>>, block: Map<String, Value>) -> Value {
    let same = match (existing, block.get(ID_FIELD)) {
        (Some(stored), Some(id)) => stored.get(ID_FIELD) == Some(id),
        _ => false,
    };

    let mut merged = match existing {
        Some(stored) if same => stored.clone(),
        _ => {
            let mut fresh = Map::new();
            fresh.insert(
                ID_FIELD.to_string(),
                Value::String(uuid::Uuid::now_v7().to_string()),
            );
            fresh
        },
    };
    for (key, value) in block {
        if key != ID_FIELD {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

fn check_required(record_type: &RecordType, body: &Record) -> Result<()> {
    for (name, spec) in record_type.iter_fields() {
        if !spec.required {
            continue;
        }
        let missing = match body.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            _ => false,
        };
        if missing {
            return Err(Error::write_rejected(
                &record_type.id,
                format!("{name} is required"),
            ));
        }
    }
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
