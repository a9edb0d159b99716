//! Relation resolution.
//!
//! Turns raw relation cells into `{id}` references by looking up target
//! records through an ordered list of candidate keys.
//!
//! | Input | One | Many |
//! |-------|-----|------|
//! | blank | `null` | `[]` |
//! | scalar | one lookup | split on the delimiter, one lookup per part |
//! | `{id}` or populated object | resolved by its keys | wrapped in a list |
//! | array | error | one lookup per element |
//! | delimited string | error | one lookup per part |

use crate::config::CodecConfig;
use crate::models::{
    Cardinality, FieldSpec, Filter, ID_FIELD, Record, RecordId, RecordType, Reference, is_blank,
    is_blank_marker,
};
use crate::schema::SchemaRegistry;
use crate::storage::RepositoryTransaction;
use crate::{Error, Result};
use serde_json::Value;
use tracing::{debug, instrument};

/// Resolves relation fields against a repository transaction.
pub struct RelationResolver<'a> {
    registry: &'a dyn SchemaRegistry,
    config: &'a CodecConfig,
}

impl<'a> RelationResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a CodecConfig) -> Self {
        Self { registry, config }
    }

    /// Resolves every relation field present in `record`, in place.
    ///
    /// Fields absent from the record are left absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelationResolution`] for the first field whose value
    /// cannot be resolved.
    #[instrument(skip_all, fields(record_type = %record_type.id))]
    pub fn resolve_record(
        &self,
        tx: &mut dyn RepositoryTransaction,
        record_type: &RecordType,
        record: &mut Record,
    ) -> Result<()> {
        for (name, spec) in record_type.iter_fields().filter(|(_, s)| s.is_relation()) {
            let Some(raw) = record.get(name) else {
                continue;
            };
            let resolved = self.resolve_field(tx, name, spec, raw)?;
            record.insert(name.to_string(), resolved);
        }
        Ok(())
    }

    /// Resolves one relation value.
    ///
    /// Returns `null` or a single reference for one-cardinality fields and
    /// an ordered list of references for many-cardinality fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelationResolution`] when a value matches no target
    /// record, or a list is given for a one-cardinality field.
    pub fn resolve_field(
        &self,
        tx: &mut dyn RepositoryTransaction,
        field: &str,
        spec: &FieldSpec,
        raw: &Value,
    ) -> Result<Value> {
        let target_id = spec.target.as_deref().unwrap_or_default();
        let target = self.registry.require(target_id)?;
        let failure = |reason: String| Error::RelationResolution {
            field: field.to_string(),
            value: raw.to_string(),
            reason,
        };

        match spec.cardinality() {
            Cardinality::One => {
                if is_blank(raw) {
                    return Ok(Value::Null);
                }
                if raw.is_array() || self.is_delimited(raw) {
                    return Err(failure(format!("{field} is not an array")));
                }
                let reference = self.lookup(tx, target, raw)?.ok_or_else(|| {
                    failure(format!("Data with value {} not found", display(raw)))
                })?;
                Ok(reference.to_value())
            },
            Cardinality::Many => {
                let mut references = Vec::new();
                for part in self.parts(raw) {
                    let reference = self.lookup(tx, target, &part)?.ok_or_else(|| {
                        failure(format!("Data with value {} not found", display(&part)))
                    })?;
                    references.push(reference.to_value());
                }
                Ok(Value::Array(references))
            },
        }
    }

    /// Finds the first target record matching a raw value.
    ///
    /// Objects are looked up by the candidate keys they carry. Scalars are
    /// tried against each candidate key declared on the target; `id` is
    /// only tried for integer-like values.
    fn lookup(
        &self,
        tx: &mut dyn RepositoryTransaction,
        target: &RecordType,
        raw: &Value,
    ) -> Result<Option<Reference>> {
        for key in &self.config.candidate_keys {
            let value = match raw {
                Value::Object(obj) => match obj.get(key) {
                    Some(v) if !is_blank(v) && !v.is_object() && !v.is_array() => v,
                    _ => continue,
                },
                scalar => scalar,
            };

            let found = if key == ID_FIELD {
                match RecordId::from_value(value) {
                    Some(id) => tx.find_by_id(target, id)?,
                    None => continue,
                }
            } else if target.has_field(key) {
                tx.find_first(target, &Filter::eq(key.as_str(), value.clone()))?
            } else {
                continue;
            };

            if let Some(reference) = found.as_ref().and_then(|r| {
                r.get(ID_FIELD).and_then(RecordId::from_value)
            }) {
                debug!(target = %target.id, key = %key, id = %reference, "Resolved relation");
                return Ok(Some(Reference::new(reference)));
            }
        }
        Ok(None)
    }

    fn is_delimited(&self, raw: &Value) -> bool {
        raw.as_str()
            .is_some_and(|s| s.contains(self.config.list_delimiter))
    }

    fn parts(&self, raw: &Value) -> Vec<Value> {
        match raw {
            Value::Null => Vec::new(),
            Value::String(s) => s
                .split(self.config.list_delimiter)
                .map(str::trim)
                .filter(|part| !is_blank_marker(part))
                .map(|part| Value::String(part.to_string()))
                .collect(),
            Value::Array(items) => items.iter().filter(|v| !is_blank(v)).cloned().collect(),
            other => vec![other.clone()],
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
