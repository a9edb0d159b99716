//! # Sheetbridge
//!
//! Bulk export and re-import of structured content records through
//! spreadsheets and JSON files.
//!
//! The crate is a reconciliation engine: it flattens schema-described records
//! (relations, embedded components, tag lists) into spreadsheet rows, and on
//! the way back decides per row whether to create a record, update an existing
//! one, or skip it because nothing changed.
//!
//! ## Components
//!
//! - Schema registry ([`schema`]): read-only record type definitions
//! - Row codec ([`io::RowCodec`]): flatten/unflatten between rows and records
//! - Relation resolver ([`services::RelationResolver`]): natural-key lookups
//! - Diff engine ([`services::DiffEngine`]): subset change detection
//! - Bulk reconciler ([`services::BulkReconciler`]): per-row create/update/skip
//! - Export projector ([`services::ExportProjector`]): repository to sheets
//!
//! ## Example
//!
//! ```rust,ignore
//! use sheetbridge::services::{BulkReconciler, ReconcileOptions};
//!
//! let reconciler = BulkReconciler::new(&registry, &repository, &config);
//! let result = reconciler.reconcile(batch, &ReconcileOptions::default())?;
//! println!("created {} updated {}", result.created, result.updated);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod schema;
pub mod services;
pub mod storage;

pub use config::SheetbridgeConfig;
pub use models::{
    Cardinality, FieldKind, FieldSpec, Filter, ImportBatch, ImportSummary, Record, RecordId,
    RecordType, Reference, ReconcileResult, Row,
};
pub use schema::{SchemaRegistry, StaticSchemaRegistry};
pub use storage::{MemoryRepository, Repository, RepositoryTransaction, SqliteRepository};

/// Error type for sheetbridge operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed files, unreadable paths, bad filter syntax |
/// | `UnsupportedFormat` | File extension or format name not recognised |
/// | `UnknownRecordType` | A record type is not in the schema registry |
/// | `RelationResolution` | Relation value not found, or list given for a single relation |
/// | `WriteRejected` | The repository refuses a create or update |
/// | `OperationFailed` | I/O and storage plumbing failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The import file cannot be parsed
    /// - A filter query is malformed
    /// - A CSV sheet has no header row
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The file format is not supported.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A record type is not known to the schema registry.
    ///
    /// Fatal for that record type's slice of a batch only.
    #[error("Content type {0} not found")]
    UnknownRecordType(String),

    /// A relation value could not be resolved.
    ///
    /// Raised when:
    /// - No target record matches any candidate key
    /// - A delimited list is given for a single-valued relation
    #[error("Failed processing field {field} with value {value}: {reason}")]
    RelationResolution {
        /// Relation field name.
        field: String,
        /// Raw input value, JSON-encoded.
        value: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The repository rejected a write.
    #[error("write to {record_type} rejected: {reason}")]
    WriteRejected {
        /// Record type being written.
        record_type: String,
        /// Rejection reason.
        reason: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - `SQLite` operations fail
    /// - Configuration or schema files cannot be read
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::WriteRejected`].
    pub fn write_rejected(record_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteRejected {
            record_type: record_type.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for sheetbridge operations.
pub type Result<T> = std::result::Result<T, Error>;
