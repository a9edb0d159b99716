//! Row source and sink traits.

use crate::Result;
use crate::models::{Sheet, Workbook};

/// Reads named sheets of rows.
///
/// # Example Implementation
///
/// ```rust,ignore
/// impl SheetSource for TsvSource {
///     fn read_workbook(&mut self) -> Result<Workbook> {
///         // Parse every table into a named Sheet
///     }
/// }
/// ```
pub trait SheetSource {
    /// Reads every sheet. Cells arrive as strings or nulls.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is unreadable or malformed.
    fn read_workbook(&mut self) -> Result<Workbook>;
}

/// Writes named sheets of rows.
///
/// # Lifecycle
///
/// 1. Call `write_sheet()` for each sheet
/// 2. Call `finalize()` to flush
pub trait SheetSink {
    /// Writes one sheet.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or I/O fails.
    fn write_sheet(&mut self, sheet: &Sheet) -> Result<()>;

    /// Flushes buffered output. Consumes the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn finalize(self: Box<Self>) -> Result<()>;

    /// Writes every sheet of a workbook in order.
    ///
    /// # Errors
    ///
    /// Returns the first sheet error.
    fn write_workbook(&mut self, workbook: &Workbook) -> Result<()> {
        for sheet in &workbook.sheets {
            self.write_sheet(sheet)?;
        }
        Ok(())
    }
}
