//! Data models for sheetbridge.
//!
//! Record, row and schema types shared by the codec, the reconciler and the
//! storage backends.

mod batch;
mod filter;
mod record;
mod schema;

pub use batch::{
    BatchSlice, ExportDocument, ImportBatch, ImportSummary, ReconcileResult, RowError, Sheet,
    Workbook,
};
pub use filter::{Filter, FilterOp, loose_eq};
pub use record::{
    ID_FIELD, Record, RecordId, Reference, Row, is_blank, is_blank_marker, record_id,
};
pub use schema::{Cardinality, DataType, FieldDef, FieldKind, FieldSpec, RecordType};
