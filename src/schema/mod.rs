//! Schema registry.
//!
//! Read-only access to record type definitions, plus the pure functions that
//! answer shape questions about a record type (which column belongs to which
//! component, which fields are searchable, what a sheet is called).

mod helpers;
mod registry;

pub use helpers::{
    component_column, is_user_content, numeric_fields, record_type_for_sheet, searchable_fields,
    sheet_name,
};
pub use registry::{SchemaDocument, StaticSchemaRegistry};

use crate::models::RecordType;
use crate::{Error, Result};

/// Read-only access to record type definitions.
pub trait SchemaRegistry: Send + Sync {
    /// Lists all record types, component types included, in definition order.
    fn list_record_types(&self) -> Vec<&RecordType>;

    /// Looks up a record type by identifier.
    fn get_record_type(&self, id: &str) -> Option<&RecordType>;

    /// Looks up a record type, failing with [`Error::UnknownRecordType`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRecordType`] if the type is not registered.
    fn require(&self, id: &str) -> Result<&RecordType> {
        self.get_record_type(id)
            .ok_or_else(|| Error::UnknownRecordType(id.to_string()))
    }
}
