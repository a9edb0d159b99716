//! Component merge and list splitting for incoming records.
//!
//! Incoming component blocks inherit the internal id of the stored block
//! they replace, so the store updates in place instead of appending a new
//! block. Single components inherit the stored block's id; repeatable
//! components inherit by position.

use crate::config::CodecConfig;
use crate::models::{ID_FIELD, Record, RecordType};
use crate::schema::SchemaRegistry;
use serde_json::Value;

/// Prepares component and list fields of an incoming record.
pub struct ComponentMerger<'a> {
    registry: &'a dyn SchemaRegistry,
    config: &'a CodecConfig,
}

impl<'a> ComponentMerger<'a> {
    /// Creates a merger.
    #[must_use]
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a CodecConfig) -> Self {
        Self { registry, config }
    }

    /// Splits delimited strings of custom list fields and merges component
    /// blocks with their stored counterparts.
    pub fn prepare(
        &self,
        record_type: &RecordType,
        existing: Option<&Record>,
        incoming: &mut Record,
    ) {
        self.split_lists(record_type, None, incoming);

        for (name, spec) in record_type.iter_fields().filter(|(_, s)| s.is_component()) {
            let Some(value) = incoming.get_mut(name) else {
                continue;
            };
            let component = spec
                .target
                .as_deref()
                .and_then(|target| self.registry.get_record_type(target));
            let stored = existing.and_then(|e| e.get(name));

            match value {
                Value::Object(block) => {
                    let stored_block = stored.and_then(Value::as_object);
                    self.merge_block(component, stored_block, block);
                },
                Value::Array(blocks) => {
                    let stored_blocks = stored.and_then(Value::as_array);
                    for (index, block) in blocks.iter_mut().enumerate() {
                        let Value::Object(block) = block else {
                            continue;
                        };
                        let stored_block = stored_blocks
                            .and_then(|items| items.get(index))
                            .and_then(Value::as_object);
                        self.merge_block(component, stored_block, block);
                    }
                },
                _ => {},
            }
        }
    }

    fn merge_block(
        &self,
        component: Option<&RecordType>,
        stored: Option<&Record>,
        block: &mut Record,
    ) {
        if let Some(stored) = stored {
            if !block.contains_key(ID_FIELD) {
                if let Some(id) = stored.get(ID_FIELD) {
                    block.insert(ID_FIELD.to_string(), id.clone());
                }
            }
        }
        if let Some(component) = component {
            self.split_lists(component, stored, block);
        }
    }

    /// Splits delimited strings for custom list fields, and for any field
    /// whose stored value is a list.
    fn split_lists(&self, record_type: &RecordType, stored: Option<&Record>, record: &mut Record) {
        for (name, spec) in record_type.iter_fields() {
            let stored_is_list = stored
                .and_then(|s| s.get(name))
                .is_some_and(Value::is_array);
            if !spec.custom_list && !stored_is_list {
                continue;
            }
            if let Some(value) = record.get_mut(name) {
                self.split_in_place(value);
            }
        }
    }

    fn split_in_place(&self, value: &mut Value) {
        let Value::String(text) = value else {
            return;
        };
        let parts: Vec<Value> = text
            .split(self.config.list_delimiter)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect();
        *value = Value::Array(parts);
    }
}
