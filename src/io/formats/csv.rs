//! CSV format adapter.
//!
//! A CSV file holds exactly one sheet. The sheet is named after the file
//! stem on import; multi-sheet workbooks are written as one file per sheet.

use crate::io::traits::{SheetSink, SheetSource};
use crate::models::{Row, Sheet, Workbook};
use crate::{Error, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// CSV sheet source.
///
/// The first row is the header. Fully blank rows are skipped, and short
/// rows leave their trailing columns absent.
pub struct CsvSheetSource<R: Read> {
    reader: csv::Reader<R>,
    sheet_name: String,
}

impl<R: Read> CsvSheetSource<R> {
    /// Creates a new CSV sheet source.
    pub fn new(reader: R, sheet_name: impl Into<String>) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        Self {
            reader,
            sheet_name: sheet_name.into(),
        }
    }
}

impl CsvSheetSource<BufReader<File>> {
    /// Opens a CSV file, naming the sheet after the file stem.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;
        let sheet_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sheet")
            .to_string();
        Ok(Self::new(BufReader::new(file), sheet_name))
    }
}

impl<R: Read> SheetSource for CsvSheetSource<R> {
    fn read_workbook(&mut self) -> Result<Workbook> {
        let headers = self
            .reader
            .headers()
            .map_err(|e| Error::InvalidInput(format!("Failed to read CSV header: {e}")))?
            .clone();

        let mut rows = Vec::new();
        for (idx, record) in self.reader.records().enumerate() {
            let record = record.map_err(|e| {
                Error::InvalidInput(format!("Line {}: Failed to parse CSV: {e}", idx + 2))
            })?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let mut row = Row::new();
            for (header, cell) in headers.iter().zip(record.iter()) {
                if header.is_empty() {
                    continue;
                }
                row.insert(header.to_string(), Value::String(cell.to_string()));
            }
            rows.push(row);
        }

        let mut sheet = Sheet::new(self.sheet_name.clone(), rows);
        sheet.columns = headers
            .iter()
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect();

        let mut workbook = Workbook::new();
        workbook.push(sheet);
        Ok(workbook)
    }
}

/// CSV sheet sink.
///
/// Accepts a single sheet.
pub struct CsvSheetSink<W: Write> {
    writer: csv::Writer<W>,
    written: bool,
}

impl<W: Write> CsvSheetSink<W> {
    /// Creates a new CSV sheet sink.
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            written: false,
        }
    }
}

impl<W: Write> SheetSink for CsvSheetSink<W> {
    fn write_sheet(&mut self, sheet: &Sheet) -> Result<()> {
        if self.written {
            return Err(Error::InvalidInput(format!(
                "CSV output holds a single sheet, cannot add {}",
                sheet.name
            )));
        }
        self.written = true;

        self.writer
            .write_record(&sheet.columns)
            .map_err(|e| Error::operation("write_csv", e))?;

        for row in &sheet.rows {
            let cells = sheet
                .columns
                .iter()
                .map(|column| row.get(column).map_or_else(String::new, cell_to_string));
            self.writer
                .write_record(cells)
                .map_err(|e| Error::operation("write_csv", e))?;
        }
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_csv", e))
    }
}

/// Renders a cell as CSV text.
///
/// Nulls become empty cells; nested values are JSON-encoded.
#[must_use]
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Writes a workbook to disk.
///
/// A single sheet goes to `path`. Several sheets go to
/// `<stem>-<sheet>.csv` next to `path`. Returns the files written.
///
/// # Errors
///
/// Returns an error if any file cannot be created or written.
pub fn write_workbook_files(workbook: &Workbook, path: &Path) -> Result<Vec<PathBuf>> {
    let targets: Vec<(PathBuf, &Sheet)> = if workbook.sheets.len() == 1 {
        workbook.sheets.iter().map(|s| (path.to_path_buf(), s)).collect()
    } else {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("export");
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        workbook
            .sheets
            .iter()
            .map(|s| (dir.join(format!("{stem}-{}.csv", s.name)), s))
            .collect()
    };

    let mut written = Vec::with_capacity(targets.len());
    for (target, sheet) in targets {
        let file = File::create(&target).map_err(|e| {
            Error::operation("create_csv_file", format!("{}: {e}", target.display()))
        })?;
        let mut sink = Box::new(CsvSheetSink::new(BufWriter::new(file)));
        sink.write_sheet(sheet)?;
        sink.finalize()?;
        written.push(target);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_sheet() {
        let data = "id,name,tagList\n1,Acme,red|blue\n,,\n2,\"Big, Co\",\n";
        let mut source = CsvSheetSource::new(data.as_bytes(), "company");
        let workbook = source.read_workbook().unwrap();

        let sheet = workbook.sheet("company").unwrap();
        assert_eq!(sheet.columns, vec!["id", "name", "tagList"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0]["tagList"], json!("red|blue"));
        assert_eq!(sheet.rows[1]["name"], json!("Big, Co"));
        assert_eq!(sheet.rows[1]["tagList"], json!(""));
    }

    #[test]
    fn test_write_sheet() {
        let rows = vec![
            json!({"id": 1, "name": "Acme", "active": true})
                .as_object()
                .cloned()
                .unwrap(),
            json!({"id": 2, "name": null}).as_object().cloned().unwrap(),
        ];
        let sheet = Sheet::new("company", rows);

        let mut buffer = Vec::new();
        {
            let mut sink = Box::new(CsvSheetSink::new(&mut buffer));
            sink.write_sheet(&sheet).unwrap();
            assert!(sink.write_sheet(&sheet).is_err());
            sink.finalize().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output, "id,name,active\n1,Acme,true\n2,,\n");
    }

    #[test]
    fn test_write_workbook_files_splits_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let mut workbook = Workbook::new();
        workbook.push(Sheet::placeholder("company", "No data found"));
        workbook.push(Sheet::placeholder("person", "No data found"));

        let written = write_workbook_files(&workbook, &dir.path().join("records.csv")).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("records-company.csv"),
                dir.path().join("records-person.csv"),
            ]
        );
        let contents = std::fs::read_to_string(&written[1]).unwrap();
        assert_eq!(contents, "message\nNo data found\n");
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Value::Null), "");
        assert_eq!(cell_to_string(&json!(1.5)), "1.5");
        assert_eq!(cell_to_string(&json!([{"a": 1}])), r#"[{"a":1}]"#);
    }
}
