//! JSON format adapter.
//!
//! Accepts two input shapes:
//! - **Batch**: `{"api::company.company": [{...}, ...], ...}`
//! - **Export document**: `{"version": ..., "timestamp": ..., "data": {...}}`
//!
//! Output is always the export document.

use crate::models::{ExportDocument, ImportBatch, Record};
use crate::{Error, Result};
use serde_json::Value;
use std::io::{Read, Write};

/// Reads an import batch from JSON.
///
/// Slices that are not arrays of objects are recorded in
/// [`ImportBatch::issues`] instead of failing the call.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the input is not a JSON object.
pub fn read_batch<R: Read>(reader: R) -> Result<ImportBatch> {
    let value: Value = serde_json::from_reader(reader)
        .map_err(|e| Error::InvalidInput(format!("Failed to parse JSON: {e}")))?;

    let Value::Object(mut root) = value else {
        return Err(Error::InvalidInput(
            "JSON import must be an object keyed by record type".to_string(),
        ));
    };

    if is_export_document(&root) {
        root = match root.remove("data") {
            Some(Value::Object(data)) => data,
            _ => return Ok(ImportBatch::new()),
        };
    }

    let mut batch = ImportBatch::new();
    for (record_type, entries) in root {
        match into_records(entries) {
            Some(records) => batch.push(record_type, records),
            None => batch
                .issues
                .push(format!("Invalid data format for {record_type}")),
        }
    }
    Ok(batch)
}

/// Writes an export document as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or I/O fails.
pub fn write_document<W: Write>(mut writer: W, document: &ExportDocument) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, document)
        .map_err(|e| Error::operation("write_json", e))?;
    writeln!(writer).map_err(|e| Error::operation("write_json", e))?;
    writer.flush().map_err(|e| Error::operation("flush_json", e))
}

fn is_export_document(root: &serde_json::Map<String, Value>) -> bool {
    root.contains_key("version") && root.get("data").is_some_and(Value::is_object)
}

fn into_records(entries: Value) -> Option<Vec<Record>> {
    let Value::Array(items) = entries else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_read_bare_batch() {
        let input = r#"{
            "api::company.company": [{"id": 1, "name": "Acme"}, {"name": "Beta"}],
            "api::tag.tag": "oops"
        }"#;
        let batch = read_batch(input.as_bytes()).unwrap();
        assert_eq!(batch.slices().len(), 1);
        assert_eq!(batch.slices()[0].records.len(), 2);
        assert_eq!(batch.issues, vec!["Invalid data format for api::tag.tag"]);
    }

    #[test]
    fn test_read_export_document() {
        let input = json!({
            "version": "1.0.0",
            "timestamp": "2026-01-01T00:00:00Z",
            "data": {"api::tag.tag": [{"id": 3, "name": "red"}]}
        });
        let batch = read_batch(input.to_string().as_bytes()).unwrap();
        assert_eq!(batch.slices()[0].record_type, "api::tag.tag");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_read_rejects_non_object() {
        assert!(matches!(
            read_batch("[1, 2]".as_bytes()),
            Err(Error::InvalidInput(_))
        ));
        assert!(read_batch("not json".as_bytes()).is_err());
    }

    #[test]
    fn test_write_document() {
        let mut data = BTreeMap::new();
        data.insert(
            "api::tag.tag".to_string(),
            vec![json!({"id": 1}).as_object().cloned().unwrap()],
        );
        let document = ExportDocument {
            version: "1.0.0".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            data,
        };

        let mut buffer = Vec::new();
        write_document(&mut buffer, &document).unwrap();
        let parsed: ExportDocument = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed, document);
    }
}
