//! Static schema registry loaded from a definition file.

use super::SchemaRegistry;
use crate::models::{FieldKind, RecordType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// On-disk schema document.
///
/// ```yaml
/// record_types:
///   - id: api::company.company
///     fields:
///       - { name: name, type: string, required: true }
///       - { name: owner, kind: relation, target: api::person.person }
/// components:
///   - id: shared.address
///     fields:
///       - { name: city, type: string }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Content record types.
    #[serde(default)]
    pub record_types: Vec<RecordType>,
    /// Component types, referenced by component fields.
    #[serde(default)]
    pub components: Vec<RecordType>,
}

/// Schema registry over a fixed set of record types.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaRegistry {
    types: Vec<RecordType>,
}

impl StaticSchemaRegistry {
    /// Builds a registry, validating that every relation and component
    /// target is registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on duplicate identifiers or dangling
    /// targets.
    pub fn new(types: Vec<RecordType>) -> Result<Self> {
        for (idx, rt) in types.iter().enumerate() {
            if types[..idx].iter().any(|other| other.id == rt.id) {
                return Err(Error::InvalidInput(format!(
                    "duplicate record type {}",
                    rt.id
                )));
            }
        }

        for rt in &types {
            for (name, spec) in rt.iter_fields() {
                if !matches!(spec.kind, FieldKind::Relation | FieldKind::Component) {
                    continue;
                }
                let Some(target) = spec.target.as_deref() else {
                    return Err(Error::InvalidInput(format!(
                        "{}.{name}: {} field has no target",
                        rt.id, spec.kind
                    )));
                };
                if !types.iter().any(|t| t.id == target) {
                    return Err(Error::InvalidInput(format!(
                        "{}.{name}: unknown target {target}",
                        rt.id
                    )));
                }
            }
        }

        Ok(Self { types })
    }

    /// Builds a registry from a parsed document.
    ///
    /// # Errors
    ///
    /// See [`StaticSchemaRegistry::new`].
    pub fn from_document(document: SchemaDocument) -> Result<Self> {
        let mut types = document.record_types;
        types.extend(document.components);
        Self::new(types)
    }

    /// Loads a registry from a YAML (`.yaml`/`.yml`) or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_schema_file", format!("{}: {e}", path.display())))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let document: SchemaDocument = if is_json {
            serde_json::from_str(&contents).map_err(|e| Error::operation("parse_schema_file", e))?
        } else {
            serde_yaml_ng::from_str(&contents)
                .map_err(|e| Error::operation("parse_schema_file", e))?
        };

        let registry = Self::from_document(document)?;
        debug!(
            path = %path.display(),
            record_types = registry.types.len(),
            "Loaded schema"
        );
        Ok(registry)
    }
}

impl SchemaRegistry for StaticSchemaRegistry {
    fn list_record_types(&self) -> Vec<&RecordType> {
        self.types.iter().collect()
    }

    fn get_record_type(&self, id: &str) -> Option<&RecordType> {
        self.types.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cardinality, FieldSpec};
    use std::io::Write;

    #[test]
    fn test_dangling_target_rejected() {
        let types = vec![
            RecordType::new("api::company.company")
                .with_field("owner", FieldSpec::relation("api::person.person", Cardinality::One)),
        ];
        let err = StaticSchemaRegistry::new(types).unwrap_err();
        assert!(err.to_string().contains("unknown target api::person.person"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let types = vec![RecordType::new("api::a.a"), RecordType::new("api::a.a")];
        assert!(StaticSchemaRegistry::new(types).is_err());
    }

    #[test]
    fn test_load_yaml_with_components() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r"
record_types:
  - id: api::company.company
    fields:
      - {{ name: name, type: string }}
      - {{ name: address, kind: component, target: shared.address }}
components:
  - id: shared.address
    fields:
      - {{ name: city, type: string }}
"
        )
        .unwrap();

        let registry = StaticSchemaRegistry::load(file.path()).unwrap();
        assert_eq!(registry.list_record_types().len(), 2);
        assert!(registry.get_record_type("shared.address").is_some());
        assert!(registry.require("api::missing.missing").is_err());
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"record_types": [{{"id": "api::tag.tag", "fields": [{{"name": "name"}}]}}]}}"#
        )
        .unwrap();

        let registry = StaticSchemaRegistry::load(file.path()).unwrap();
        let tag = registry.require("api::tag.tag").unwrap();
        assert!(tag.has_field("name"));
    }
}
