//! Export file names.

use crate::io::Format;
use crate::models::RecordId;
use chrono::NaiveDate;

/// Stem used when an export spans every record type.
const ALL_TYPES_STEM: &str = "records";

/// What an export file holds, for naming purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope<'a> {
    /// Every user content type, or one type when given.
    Query(Option<&'a str>),
    /// A selection of `count` records of one type.
    Selection(&'a str, usize),
    /// A single record.
    Entry(RecordId),
}

/// Builds an export file name.
///
/// | Scope | Name |
/// |-------|------|
/// | all types | `records-export-<date>.<ext>` |
/// | one type | `<type>-export-<date>.<ext>` |
/// | selection | `<type>-selected-<n>-<date>.<ext>` |
/// | one record | `entry-<id>-<date>.<ext>` |
///
/// `<type>` is the record type id without `namespace`.
#[must_use]
pub fn export_file_name(
    scope: ExportScope<'_>,
    namespace: &str,
    format: Format,
    date: NaiveDate,
) -> String {
    let date = date.format("%Y-%m-%d");
    let ext = format.extension();
    let strip = |record_type: &str| {
        record_type
            .strip_prefix(namespace)
            .unwrap_or(record_type)
            .to_string()
    };

    match scope {
        ExportScope::Query(None) => format!("{ALL_TYPES_STEM}-export-{date}.{ext}"),
        ExportScope::Query(Some(record_type)) => {
            format!("{}-export-{date}.{ext}", strip(record_type))
        },
        ExportScope::Selection(record_type, count) => {
            format!("{}-selected-{count}-{date}.{ext}", strip(record_type))
        },
        ExportScope::Entry(id) => format!("entry-{id}-{date}.{ext}"),
    }
}
