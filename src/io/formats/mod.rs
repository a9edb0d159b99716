//! Format adapters.
//!
//! CSV implements [`SheetSource`] and [`SheetSink`]; JSON reads and writes
//! nested records directly.

pub mod csv;
pub mod json;

use crate::{Error, Result};
use std::path::Path;
use std::str::FromStr;

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON batch or export document.
    Json,
    /// Comma-separated sheet.
    Csv,
}

impl Format {
    /// Returns all supported formats.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Json, Self::Csv]
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Returns whether rows pass through the row codec.
    #[must_use]
    pub const fn is_tabular(&self) -> bool {
        matches!(self, Self::Csv)
    }

    /// Detects format from file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] if the extension is not
    /// recognized or missing.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("csv") => Ok(Self::Csv),
            Some(ext @ ("xlsx" | "xls")) => Err(Error::UnsupportedFormat(format!(
                ".{ext} workbooks are not supported, save each sheet as .csv"
            ))),
            Some(ext) => Err(Error::UnsupportedFormat(format!(
                "Unsupported file extension: .{ext}"
            ))),
            None => Err(Error::UnsupportedFormat(
                "Cannot determine format: file has no extension".to_string(),
            )),
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" | "excel" | "sheet" => Ok(Self::Csv),
            _ => Err(Error::UnsupportedFormat(format!("Unknown format: {s}"))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}
