//! Record type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a field within a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Scalar or JSON value stored inline.
    #[default]
    Primitive,
    /// Pointer to one or more records of another type.
    Relation,
    /// Embedded sub-object (or repeatable list of sub-objects).
    Component,
    /// The record's own identifier.
    Identifier,
    /// Media/file reference. Never exported or imported.
    Media,
}

impl FieldKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Relation => "relation",
            Self::Component => "component",
            Self::Identifier => "identifier",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage type of a primitive field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Short string.
    #[default]
    String,
    /// Long text.
    Text,
    /// Rich text (markdown/blocks).
    RichText,
    /// Email address.
    Email,
    /// Unique slug.
    Uid,
    /// One of a fixed set of strings.
    Enumeration,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Floating point.
    Float,
    /// Decimal number.
    Decimal,
    /// Generic number.
    Number,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Timestamp.
    DateTime,
    /// Arbitrary JSON.
    Json,
}

impl DataType {
    /// Returns whether free-text search applies to this type.
    #[must_use]
    pub const fn is_text_like(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Text | Self::RichText | Self::Email | Self::Uid | Self::Enumeration
        )
    }

    /// Returns whether the type holds numbers.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::BigInteger | Self::Float | Self::Decimal | Self::Number
        )
    }

    /// Returns whether the type holds whole numbers.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInteger)
    }
}

/// How many values a relation or component field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// A single value (or null).
    #[default]
    One,
    /// An ordered list of values.
    Many,
}

/// Definition of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldSpec {
    /// Field kind.
    #[serde(default)]
    pub kind: FieldKind,
    /// Primitive storage type. Ignored for non-primitive kinds.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// Cardinality for relations and components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    /// Target record type (relations) or component type (components).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Whether the serialised form is a delimiter-joined list (tag lists).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub custom_list: bool,
    /// Whether this is an internal custom field excluded from export.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub custom: bool,
    /// Whether the field must be present on create.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl FieldSpec {
    /// Creates a primitive field of the given type.
    #[must_use]
    pub fn primitive(data_type: DataType) -> Self {
        Self {
            kind: FieldKind::Primitive,
            data_type: Some(data_type),
            ..Self::default()
        }
    }

    /// Creates a delimiter-joined custom list field.
    #[must_use]
    pub fn custom_list() -> Self {
        Self {
            kind: FieldKind::Primitive,
            data_type: Some(DataType::Json),
            custom_list: true,
            ..Self::default()
        }
    }

    /// Creates a relation field.
    #[must_use]
    pub fn relation(target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            kind: FieldKind::Relation,
            cardinality: Some(cardinality),
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Creates a component field.
    #[must_use]
    pub fn component(target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            kind: FieldKind::Component,
            cardinality: Some(cardinality),
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Creates the identifier field.
    #[must_use]
    pub fn identifier() -> Self {
        Self {
            kind: FieldKind::Identifier,
            data_type: Some(DataType::Integer),
            ..Self::default()
        }
    }

    /// Creates a media field.
    #[must_use]
    pub fn media() -> Self {
        Self {
            kind: FieldKind::Media,
            ..Self::default()
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the effective cardinality (defaults to one).
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality.unwrap_or_default()
    }

    /// Returns whether the field holds many values.
    #[must_use]
    pub fn is_many(&self) -> bool {
        self.cardinality() == Cardinality::Many
    }

    /// Returns the primitive data type (defaults to string).
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type.unwrap_or_default()
    }

    /// Returns whether the field is a relation.
    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.kind == FieldKind::Relation
    }

    /// Returns whether the field is a component.
    #[must_use]
    pub fn is_component(&self) -> bool {
        self.kind == FieldKind::Component
    }
}

/// A named field within a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field definition.
    #[serde(flatten)]
    pub spec: FieldSpec,
}

/// Schema definition for one kind of record.
///
/// Field order is significant: it drives column order on export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    /// Namespaced identifier, e.g. `api::company.company`.
    pub id: String,
    /// Ordered field definitions.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl RecordType {
    /// Creates an empty record type.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            spec,
        });
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.spec)
    }

    /// Returns whether the type declares the field.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterates over `(name, spec)` pairs in declaration order.
    pub fn iter_fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|f| (f.name.as_str(), &f.spec))
    }

    /// Iterates over fields of the given kind.
    pub fn fields_of_kind(&self, kind: FieldKind) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.iter_fields().filter(move |(_, spec)| spec.kind == kind)
    }

    /// Returns the namespace prefix (`api::` for `api::company.company`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.id
            .find("::")
            .map_or("", |idx| &self.id[..idx + 2])
    }
}
