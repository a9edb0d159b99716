//! Business logic services.
//!
//! Services combine the schema registry, the row codec and a repository into
//! the import and export operations.

mod components;
mod diff;
mod export;
mod import;
mod naming;
mod query;
mod reconcile;
mod relations;

pub use components::ComponentMerger;
pub use diff::DiffEngine;
pub use export::{ExportOutput, ExportProjector, ExportRequest, NO_DATA_SHEET, Selection};
pub use import::{ImportOptions, ImportService};
pub use naming::{ExportScope, export_file_name};
pub use query::{ExportQuery, SEARCH_KEY, parse_query, search_filter};
pub use reconcile::{BulkReconciler, ReconcileOptions};
pub use relations::RelationResolver;
