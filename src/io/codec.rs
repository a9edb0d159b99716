//! Row codec: records to flat rows and back.
//!
//! # Flattening
//!
//! | Field kind | Cell |
//! |------------|------|
//! | primitive scalar | as is |
//! | primitive list | delimiter-joined |
//! | primitive object | JSON string |
//! | single component | one `<field>_<sub>` column per sub-field |
//! | repeatable component | JSON string |
//! | relation | shortcut field of the target (or its id) |
//! | media, internal custom fields, system keys | dropped |
//!
//! # Unflattening
//!
//! Blank cells (empty, `null`, `undefined`) become `null`. Cells that look
//! like a JSON array or object are parsed, falling back to the literal
//! string. Custom list fields are split on the delimiter. Component
//! columns are nested. String cells of integer, float and boolean fields
//! are coerced to typed values when they parse.

use crate::config::CodecConfig;
use crate::models::{
    DataType, FieldKind, FieldSpec, ID_FIELD, Record, RecordId, RecordType, Row, is_blank,
};
use crate::schema::{SchemaRegistry, component_column};
use serde_json::{Map, Value};

/// Converts between records and rows for one schema.
pub struct RowCodec<'a> {
    registry: &'a dyn SchemaRegistry,
    config: &'a CodecConfig,
    excluded_fields: &'a [String],
}

impl<'a> RowCodec<'a> {
    /// Creates a codec.
    #[must_use]
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a CodecConfig) -> Self {
        Self {
            registry,
            config,
            excluded_fields: &[],
        }
    }

    /// Adds field names that are never flattened.
    #[must_use]
    pub const fn with_excluded_fields(mut self, fields: &'a [String]) -> Self {
        self.excluded_fields = fields;
        self
    }

    /// Flattens a (populated) record into a row.
    ///
    /// Columns follow the record's key order, with component sub-field
    /// columns in place of their component.
    #[must_use]
    pub fn flatten(&self, record: &Record, record_type: &RecordType) -> Row {
        let mut row = Row::new();

        for (key, value) in record {
            if self.config.is_system_key(key) || self.excluded_fields.contains(key) {
                continue;
            }

            let Some(spec) = record_type.field(key) else {
                if key == ID_FIELD {
                    row.insert(key.clone(), value.clone());
                }
                continue;
            };

            match spec.kind {
                FieldKind::Media => {},
                _ if spec.custom && !spec.custom_list => {},
                FieldKind::Identifier => {
                    row.insert(key.clone(), value.clone());
                },
                FieldKind::Component if !spec.is_many() => {
                    self.flatten_component(key, value, &mut row);
                },
                FieldKind::Component => {
                    row.insert(key.clone(), json_cell(value));
                },
                FieldKind::Relation => {
                    if let Some(cell) = self.relation_cell(value) {
                        row.insert(key.clone(), cell);
                    }
                },
                FieldKind::Primitive => {
                    row.insert(key.clone(), self.primitive_cell(value));
                },
            }
        }

        row
    }

    /// Unflattens a row into a semi-structured record.
    ///
    /// Relation cells are left as raw values for the relation resolver.
    #[must_use]
    pub fn unflatten(&self, row: &Row, record_type: &RecordType) -> Record {
        let mut record = Record::new();

        for (key, cell) in row {
            if let Some((component, sub_field)) =
                component_column(
                key,
                record_type,
                self.registry,
                self.config.component_separator,
            )
            {
                let sub_spec = record_type
                    .field(component)
                    .and_then(|spec| spec.target.as_deref())
                    .and_then(|target| self.registry.get_record_type(target))
                    .and_then(|component_type| component_type.field(sub_field));

                let entry = record
                    .entry(component.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(nested) = entry {
                    nested.insert(sub_field.to_string(), self.parse_cell(cell, sub_spec));
                }
                continue;
            }

            let value = if key == ID_FIELD {
                parse_id_cell(cell)
            } else {
                self.parse_cell(cell, record_type.field(key))
            };
            record.insert(key.clone(), value);
        }

        record
    }

    /// Renders a relation value as its shortcut cell.
    ///
    /// Populated targets collapse to their first non-empty shortcut field,
    /// falling back to the id. To-many relations are delimiter-joined.
    /// Returns `None` when nothing human-readable is available.
    #[must_use]
    pub fn relation_cell(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Null => Some(Value::Null),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| self.shortcut(item))
                    .map(|v| scalar_text(&v))
                    .collect();
                Some(Value::String(self.join(&parts)))
            },
            Value::Object(_) => self.shortcut(value),
            scalar => Some(scalar.clone()),
        }
    }

    fn shortcut(&self, target: &Value) -> Option<Value> {
        let obj = target.as_object()?;
        self.config
            .shortcut_fields
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(ID_FIELD))
            .find_map(|field| obj.get(field).filter(|v| !is_blank(v) && !v.is_object()))
            .cloned()
    }

    fn flatten_component(&self, key: &str, value: &Value, row: &mut Row) {
        let Value::Object(sub_fields) = value else {
            return;
        };
        for (sub_key, sub_value) in sub_fields {
            if sub_key == ID_FIELD || self.config.is_system_key(sub_key) {
                continue;
            }
            let column = format!("{key}{}{sub_key}", self.config.component_separator);
            row.insert(column, self.primitive_cell(sub_value));
        }
    }

    fn primitive_cell(&self, value: &Value) -> Value {
        match value {
            Value::Array(items) if items.iter().all(is_scalar) => {
                let parts: Vec<String> = items.iter().map(scalar_text).collect();
                Value::String(self.join(&parts))
            },
            Value::Array(_) | Value::Object(_) => json_cell(value),
            scalar => scalar.clone(),
        }
    }

    fn parse_cell(&self, cell: &Value, spec: Option<&FieldSpec>) -> Value {
        if is_blank(cell) {
            return Value::Null;
        }

        if spec.is_some_and(|s| s.custom_list) {
            return self.split_list(cell);
        }

        let Value::String(text) = cell else {
            return cell.clone();
        };

        if let Some(parsed) = parse_json_if_needed(text) {
            return parsed;
        }

        match spec {
            Some(spec) if spec.kind == FieldKind::Primitive => coerce(text, spec.data_type()),
            _ => cell.clone(),
        }
    }

    /// Splits a delimiter-joined list cell.
    ///
    /// A cell holding a JSON array is taken as the list itself.
    #[must_use]
    pub fn split_list(&self, cell: &Value) -> Value {
        match cell {
            Value::String(text) => {
                if let Some(parsed @ Value::Array(_)) = parse_json_if_needed(text) {
                    return parsed;
                }
                Value::Array(
                    text.split(self.config.list_delimiter)
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                )
            },
            other => other.clone(),
        }
    }

    fn join(&self, parts: &[String]) -> String {
        parts.join(&self.config.list_delimiter.to_string())
    }
}

/// Parses a cell as JSON when it looks like an array or object.
fn parse_json_if_needed(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !trimmed.starts_with('[') && !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn parse_id_cell(cell: &Value) -> Value {
    if is_blank(cell) {
        return Value::Null;
    }
    RecordId::from_value(cell).map_or_else(|| cell.clone(), RecordId::to_value)
}

fn coerce(text: &str, data_type: DataType) -> Value {
    let trimmed = text.trim();
    let coerced = match data_type {
        DataType::Integer | DataType::BigInteger => trimmed.parse::<i64>().ok().map(Value::from),
        DataType::Float | DataType::Decimal | DataType::Number => trimmed
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }),
        DataType::Boolean => match trimmed.to_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(text.to_string()))
}

fn json_cell(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

const fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
