//! Export projection.
//!
//! Pulls records from a repository and shapes them for output: populated
//! records for JSON, flattened sheets for tabular formats.

use super::query::{ExportQuery, search_filter};
use crate::config::SheetbridgeConfig;
use crate::io::formats::{csv, json};
use crate::io::{Format, RowCodec};
use crate::models::{
    ExportDocument, Filter, ID_FIELD, Record, RecordId, RecordType, Sheet, Workbook,
};
use crate::schema::{SchemaRegistry, is_user_content, numeric_fields, sheet_name};
use crate::storage::{Repository, RepositoryTransaction};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

/// Sheet name used when an export matches no record type.
pub const NO_DATA_SHEET: &str = "NoData";

/// Explicitly selected records, looked up by `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Values of `field` to export.
    pub ids: Vec<Value>,
    /// Lookup field, usually `id`.
    pub field: String,
}

impl Selection {
    /// Selects records by id.
    #[must_use]
    pub fn by_id(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            ids: ids.into_iter().map(RecordId::to_value).collect(),
            field: ID_FIELD.to_string(),
        }
    }

    /// Selects records by an arbitrary field.
    #[must_use]
    pub fn by_field(field: impl Into<String>, ids: Vec<Value>) -> Self {
        Self {
            ids,
            field: field.into(),
        }
    }

    /// Builds the lookup filter, coercing ids to numbers when the lookup
    /// field is numeric.
    fn filter(&self, record_type: &RecordType) -> Filter {
        let numeric = numeric_fields(record_type).contains(&self.field);
        let ids = self
            .ids
            .iter()
            .map(|id| if numeric { to_number(id) } else { id.clone() })
            .collect();
        Filter::is_in(self.field.clone(), ids)
    }
}

/// What to export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportRequest {
    /// Record type, or every user content type when `None`.
    pub record_type: Option<String>,
    /// Filter and free-text search.
    pub query: ExportQuery,
    /// Explicit selection. A non-empty selection overrides `query`.
    pub selection: Option<Selection>,
}

impl ExportRequest {
    /// Exports every user content type.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Exports one record type.
    #[must_use]
    pub fn for_type(record_type: impl Into<String>) -> Self {
        Self {
            record_type: Some(record_type.into()),
            ..Self::default()
        }
    }

    /// Sets the filter query.
    #[must_use]
    pub fn with_query(mut self, query: ExportQuery) -> Self {
        self.query = query;
        self
    }

    /// Sets an explicit selection.
    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    fn active_selection(&self) -> Option<&Selection> {
        self.selection.as_ref().filter(|s| !s.ids.is_empty())
    }
}

/// Export result, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    /// JSON export document.
    Document(ExportDocument),
    /// Sheets for tabular formats.
    Workbook(Workbook),
}

impl ExportOutput {
    /// Writes the output to `path`, returning the files written.
    ///
    /// Workbooks with several sheets are written as one CSV file per sheet
    /// next to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be created or written.
    pub fn write_to(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self {
            Self::Document(document) => {
                let file = File::create(path).map_err(|e| {
                    Error::operation("create_export_file", format!("{}: {e}", path.display()))
                })?;
                json::write_document(BufWriter::new(file), document)?;
                Ok(vec![path.to_path_buf()])
            },
            Self::Workbook(workbook) => csv::write_workbook_files(workbook, path),
        }
    }
}

/// Projects repository records into export documents and workbooks.
pub struct ExportProjector<'a> {
    registry: &'a dyn SchemaRegistry,
    repository: &'a dyn Repository,
    config: &'a SheetbridgeConfig,
}

impl<'a> ExportProjector<'a> {
    /// Creates a projector.
    #[must_use]
    pub fn new(
        registry: &'a dyn SchemaRegistry,
        repository: &'a dyn Repository,
        config: &'a SheetbridgeConfig,
    ) -> Self {
        Self {
            registry,
            repository,
            config,
        }
    }

    /// Runs an export in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRecordType`] when the requested record type
    /// does not exist, or a storage error.
    #[instrument(
        name = "sheetbridge.export",
        skip(self, request),
        fields(record_type = request.record_type.as_deref().unwrap_or("*"), format = %format)
    )]
    pub fn export(&self, request: &ExportRequest, format: Format) -> Result<ExportOutput> {
        let start = Instant::now();
        let matches = self.collect(request)?;
        let total: usize = matches.iter().map(|(_, records)| records.len()).sum();

        let output = if format.is_tabular() {
            ExportOutput::Workbook(self.workbook(&matches))
        } else {
            ExportOutput::Document(document(matches))
        };

        metrics::counter!("sheetbridge_export_records_total", "format" => format.extension())
            .increment(total as u64);
        metrics::histogram!("sheetbridge_export_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        info!(records = total, "Export finished");
        Ok(output)
    }

    /// Exports a single record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] with `Entry not found` when no record
    /// has the id, or [`Error::UnknownRecordType`].
    #[instrument(name = "sheetbridge.export_single", skip(self), fields(format = %format))]
    pub fn export_single(
        &self,
        record_type: &str,
        id: RecordId,
        format: Format,
    ) -> Result<ExportOutput> {
        let record_type = self.registry.require(record_type)?;
        let mut tx = self.repository.begin()?;
        let found = tx.find_by_id(record_type, id);
        tx.rollback()?;
        let record = found?.ok_or_else(|| Error::InvalidInput("Entry not found".to_string()))?;

        let matches = vec![(record_type, vec![record])];
        Ok(if format.is_tabular() {
            ExportOutput::Workbook(self.workbook(&matches))
        } else {
            ExportOutput::Document(document(matches))
        })
    }

    /// Finds the records matching a request, per record type.
    ///
    /// Every requested record type appears, even when it matched nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRecordType`] or a storage error.
    pub fn collect(&self, request: &ExportRequest) -> Result<Vec<(&'a RecordType, Vec<Record>)>> {
        let record_types = self.record_types(request)?;
        let mut tx = self.repository.begin()?;
        let found = self.find_all(tx.as_mut(), &record_types, request);
        tx.rollback()?;
        found
    }

    fn find_all(
        &self,
        tx: &mut dyn RepositoryTransaction,
        record_types: &[&'a RecordType],
        request: &ExportRequest,
    ) -> Result<Vec<(&'a RecordType, Vec<Record>)>> {
        let mut found = Vec::with_capacity(record_types.len());
        for &record_type in record_types {
            let filter = Self::filter_for(record_type, request);
            let records = tx.find_by_filter(record_type, &filter)?;
            info!(record_type = %record_type.id, count = records.len(), "Collected records");
            found.push((record_type, records));
        }
        Ok(found)
    }

    fn record_types(&self, request: &ExportRequest) -> Result<Vec<&'a RecordType>> {
        match &request.record_type {
            Some(id) => Ok(vec![self.registry.require(id)?]),
            None => {
                let namespace = &self.config.import.content_namespace;
                Ok(self
                    .registry
                    .list_record_types()
                    .into_iter()
                    .filter(|rt| is_user_content(&rt.id, namespace))
                    .collect())
            },
        }
    }

    fn filter_for(record_type: &RecordType, request: &ExportRequest) -> Filter {
        if let Some(selection) = request.active_selection() {
            return selection.filter(record_type);
        }
        let filter = request.query.filter.clone();
        match &request.query.search {
            Some(q) => filter.and(search_filter(record_type, q)),
            None => filter,
        }
    }

    fn workbook(&self, matches: &[(&RecordType, Vec<Record>)]) -> Workbook {
        let export = &self.config.export;
        let codec = RowCodec::new(self.registry, &self.config.codec)
            .with_excluded_fields(&export.excluded_fields);

        let mut workbook = Workbook::new();
        for (record_type, records) in matches {
            let name = sheet_name(&record_type.id);
            if records.is_empty() {
                workbook.push(Sheet::placeholder(name, &export.placeholder_message));
                continue;
            }
            let rows = records
                .iter()
                .map(|record| codec.flatten(record, record_type))
                .collect();
            workbook.push(Sheet::new(name, rows));
        }

        if workbook.sheets.is_empty() {
            workbook.push(Sheet::placeholder(NO_DATA_SHEET, &export.no_data_message));
        }
        workbook
    }
}

/// Builds an export document holding the record types with matches.
fn document(matches: Vec<(&RecordType, Vec<Record>)>) -> ExportDocument {
    let data: BTreeMap<String, Vec<Record>> = matches
        .into_iter()
        .filter(|(_, records)| !records.is_empty())
        .map(|(record_type, records)| (record_type.id.clone(), records))
        .collect();
    ExportDocument {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        data,
    }
}

fn to_number(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| value.clone(), Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cardinality, DataType, FieldSpec};
    use crate::schema::StaticSchemaRegistry;
    use crate::services::parse_query;
    use crate::storage::MemoryRepository;
    use serde_json::json;

    fn registry() -> StaticSchemaRegistry {
        StaticSchemaRegistry::new(vec![
            RecordType::new("api::person.person")
                .with_field("email", FieldSpec::primitive(DataType::Email))
                .with_field("age", FieldSpec::primitive(DataType::Integer)),
            RecordType::new("api::company.company")
                .with_field("name", FieldSpec::primitive(DataType::String))
                .with_field("owner", FieldSpec::relation("api::person.person", Cardinality::One)),
            RecordType::new("plugin::users.user")
                .with_field("username", FieldSpec::primitive(DataType::String)),
        ])
        .unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> MemoryRepository {
        let repo = MemoryRepository::new();
        for (id, email, age) in [(1, "a@x.com", 30), (2, "b@x.com", 41), (3, "c@x.com", 52)] {
            repo.seed(
                "api::person.person",
                record(json!({"id": id, "email": email, "age": age})),
            );
        }
        repo.seed(
            "api::company.company",
            record(json!({"id": 1, "name": "Acme", "owner": {"id": 2}})),
        );
        repo.seed("plugin::users.user", record(json!({"id": 1, "username": "admin"})));
        repo
    }

    fn workbook(output: ExportOutput) -> Workbook {
        match output {
            ExportOutput::Workbook(workbook) => workbook,
            ExportOutput::Document(_) => panic!("expected a workbook"),
        }
    }

    fn document_of(output: ExportOutput) -> ExportDocument {
        match output {
            ExportOutput::Document(document) => document,
            ExportOutput::Workbook(_) => panic!("expected a document"),
        }
    }

    #[test]
    fn test_all_types_skips_non_user_content() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);

        let doc = document_of(projector.export(&ExportRequest::all(), Format::Json).unwrap());
        let keys: Vec<_> = doc.data.keys().cloned().collect();
        assert_eq!(keys, vec!["api::company.company", "api::person.person"]);
        assert_eq!(doc.data["api::company.company"][0]["owner"]["email"], json!("b@x.com"));
        assert_eq!(doc.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_workbook_flattens_relations() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);

        let book = workbook(
            projector
                .export(&ExportRequest::for_type("api::company.company"), Format::Csv)
                .unwrap(),
        );
        let sheet = book.sheet("company").unwrap();
        assert_eq!(sheet.rows[0]["owner"], json!("b@x.com"));
        assert!(!sheet.rows[0].contains_key("createdAt"));
    }

    #[test]
    fn test_selection_overrides_filters() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);

        let query = parse_query([("filters[email][$eq]", "nobody@x.com")]).unwrap();
        let request = ExportRequest::for_type("api::person.person")
            .with_query(query)
            .with_selection(Selection::by_field("age", vec![json!("30"), json!("52")]));
        let matches = projector.collect(&request).unwrap();
        assert_eq!(matches[0].1.len(), 2);

        let empty = ExportRequest::for_type("api::person.person")
            .with_query(parse_query([("filters[email][$eq]", "a@x.com")]).unwrap())
            .with_selection(Selection::by_field("email", Vec::new()));
        assert_eq!(projector.collect(&empty).unwrap()[0].1.len(), 1);

        let by_id = ExportRequest::for_type("api::person.person")
            .with_selection(Selection::by_id([RecordId::new(3)]));
        let matches = projector.collect(&by_id).unwrap();
        assert_eq!(matches[0].1[0]["email"], json!("c@x.com"));
    }

    #[test]
    fn test_search() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);

        let request = ExportRequest::for_type("api::person.person").with_query(ExportQuery {
            filter: Filter::All,
            search: Some("41".to_string()),
        });
        let matches = projector.collect(&request).unwrap();
        assert_eq!(matches[0].1.len(), 1);
        assert_eq!(matches[0].1[0]["email"], json!("b@x.com"));
    }

    #[test]
    fn test_placeholders() {
        let registry = registry();
        let repo = MemoryRepository::new();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);

        let book = workbook(
            projector
                .export(&ExportRequest::for_type("api::person.person"), Format::Csv)
                .unwrap(),
        );
        assert_eq!(book.sheets.len(), 1);
        assert_eq!(book.sheets[0].rows[0]["message"], json!("No data found"));

        let empty_registry = StaticSchemaRegistry::new(Vec::new()).unwrap();
        let projector = ExportProjector::new(&empty_registry, &repo, &config);
        let book = workbook(projector.export(&ExportRequest::all(), Format::Csv).unwrap());
        assert_eq!(book.sheets[0].name, NO_DATA_SHEET);
        assert_eq!(book.sheets[0].rows[0]["message"], json!("No data to export"));
    }

    #[test]
    fn test_export_single() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);

        let book = workbook(
            projector
                .export_single("api::person.person", RecordId::new(3), Format::Csv)
                .unwrap(),
        );
        assert_eq!(book.sheets[0].rows.len(), 1);
        assert_eq!(book.sheets[0].rows[0]["email"], json!("c@x.com"));

        let err = projector
            .export_single("api::person.person", RecordId::new(9), Format::Json)
            .unwrap_err();
        assert!(err.to_string().contains("Entry not found"));
    }

    #[test]
    fn test_unknown_record_type() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);
        let err = projector
            .export(&ExportRequest::for_type("api::ghost.ghost"), Format::Json)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRecordType(_)));
    }

    #[test]
    fn test_write_document() {
        let registry = registry();
        let repo = seeded();
        let config = SheetbridgeConfig::default();
        let projector = ExportProjector::new(&registry, &repo, &config);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let output = projector.export(&ExportRequest::all(), Format::Json).unwrap();
        let written = output.write_to(&path).unwrap();
        assert_eq!(written, vec![path.clone()]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"api::person.person\""));
    }
}
