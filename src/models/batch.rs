//! Import batches, reconcile results and export documents.

use super::record::{Record, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Records for one record type, in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSlice {
    /// Record type identifier (may be unknown to the schema).
    pub record_type: String,
    /// Semi-structured records, in row order.
    pub records: Vec<Record>,
}

/// Ordered mapping of record type to records, as produced by a reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportBatch {
    slices: Vec<BatchSlice>,
    /// Slice-level problems found while reading (not tied to a row).
    pub issues: Vec<String>,
}

impl ImportBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slices: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Appends records for a record type.
    ///
    /// Records for a record type that already has a slice are appended to it.
    pub fn push(&mut self, record_type: impl Into<String>, records: Vec<Record>) {
        let record_type = record_type.into();
        if let Some(slice) = self.slices.iter_mut().find(|s| s.record_type == record_type) {
            slice.records.extend(records);
        } else {
            self.slices.push(BatchSlice {
                record_type,
                records,
            });
        }
    }

    /// Builder form of [`ImportBatch::push`].
    #[must_use]
    pub fn with(mut self, record_type: impl Into<String>, records: Vec<Record>) -> Self {
        self.push(record_type, records);
        self
    }

    /// Returns the slices in order.
    #[must_use]
    pub fn slices(&self) -> &[BatchSlice] {
        &self.slices
    }

    /// Consumes the batch into its slices.
    #[must_use]
    pub fn into_slices(self) -> Vec<BatchSlice> {
        self.slices
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.iter().map(|s| s.records.len()).sum()
    }

    /// Returns whether the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A problem recorded while reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// Record type of the failing slice.
    pub record_type: String,
    /// 1-based spreadsheet row number (header is row 1), if row-scoped.
    pub row: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl RowError {
    /// Creates a row-scoped error.
    #[must_use]
    pub fn row(record_type: impl Into<String>, row: usize, message: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            row: Some(row),
            message: message.into(),
        }
    }

    /// Creates an error scoped to a whole record type slice.
    #[must_use]
    pub fn slice(record_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            row: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of a reconcile call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileResult {
    /// Records created.
    pub created: usize,
    /// Records updated.
    pub updated: usize,
    /// Rows that matched an existing record without changes.
    pub skipped: usize,
    /// Errors, in the order they occurred.
    pub errors: Vec<RowError>,
}

impl ReconcileResult {
    /// Creates an empty result.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            created: 0,
            updated: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    /// Returns whether any errors were recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the number of writes performed.
    #[must_use]
    pub const fn total_written(&self) -> usize {
        self.created + self.updated
    }

    /// Folds another result into this one.
    pub fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }

    /// Returns the error messages in order.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Converts into the summary payload exposed to callers.
    #[must_use]
    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            created: self.created,
            updated: self.updated,
            errors: self.error_messages(),
        }
    }
}

/// Import result payload: `{created, updated, errors}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records created.
    pub created: usize,
    /// Records updated.
    pub updated: usize,
    /// Error messages.
    pub errors: Vec<String>,
}

impl ImportSummary {
    /// Returns the operator-facing status message.
    #[must_use]
    pub fn message(&self) -> String {
        if self.errors.is_empty() {
            "Import completed successfully".to_string()
        } else {
            format!(
                "Import completed with {} error(s). Please check the details below.",
                self.errors.len()
            )
        }
    }
}

/// JSON export document: `{version, timestamp, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Producer version.
    pub version: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Records per record type.
    pub data: BTreeMap<String, Vec<Record>>,
}

/// One named table of rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    /// Sheet name.
    pub name: String,
    /// Column order for writers that need a header.
    pub columns: Vec<String>,
    /// Rows.
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Creates a sheet, deriving columns from the rows in first-seen order.
    #[must_use]
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Creates a single-row placeholder sheet carrying a message.
    #[must_use]
    pub fn placeholder(name: impl Into<String>, message: &str) -> Self {
        let mut row = Row::new();
        row.insert("message".to_string(), Value::String(message.to_string()));
        Self::new(name, vec![row])
    }

    /// Returns the message of a placeholder-shaped sheet: a single row
    /// with a single `message` column.
    #[must_use]
    pub fn placeholder_message(&self) -> Option<&str> {
        match (self.columns.as_slice(), self.rows.as_slice()) {
            ([column], [row]) if column == "message" => row.get("message")?.as_str(),
            _ => None,
        }
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    /// Sheets in order.
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Creates an empty workbook.
    #[must_use]
    pub const fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    /// Appends a sheet.
    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Finds a sheet by name.
    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
