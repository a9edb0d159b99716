//! End-to-end tests for import reconciliation and export.
//!
//! Exercises the full pipeline against the in-memory and `SQLite`
//! repositories:
//! - Creating records from rows with custom list cells
//! - Skipping unchanged rows
//! - Reporting unresolved relations per row
//! - Exporting an explicit selection
//! - Exporting to CSV and importing the file back unchanged
//! - Importing CSV files under their generated export names

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::NaiveDate;
use serde_json::{Value, json};
use sheetbridge::config::{SheetbridgeConfig, TransactionScope};
use sheetbridge::io::Format;
use sheetbridge::models::{Cardinality, DataType, FieldSpec, ImportBatch, Record, RecordType};
use sheetbridge::services::{
    BulkReconciler, ExportOutput, ExportProjector, ExportRequest, ExportScope, ImportOptions,
    ImportService, ReconcileOptions, Selection, export_file_name, parse_query,
};
use sheetbridge::storage::WriteKind;
use sheetbridge::{MemoryRepository, Repository, SqliteRepository, StaticSchemaRegistry};

const PERSON: &str = "api::person.person";
const COMPANY: &str = "api::company.company";

fn registry() -> StaticSchemaRegistry {
    StaticSchemaRegistry::new(vec![
        RecordType::new(PERSON)
            .with_field("email", FieldSpec::primitive(DataType::Email).required())
            .with_field("name", FieldSpec::primitive(DataType::String)),
        RecordType::new(COMPANY)
            .with_field("name", FieldSpec::primitive(DataType::String))
            .with_field("employees", FieldSpec::primitive(DataType::Integer))
            .with_field("tagList", FieldSpec::custom_list())
            .with_field("owner", FieldSpec::relation(PERSON, Cardinality::One)),
    ])
    .expect("valid schema")
}

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

fn reconcile(
    repo: &dyn Repository,
    batch: ImportBatch,
    options: &ReconcileOptions,
) -> sheetbridge::ReconcileResult {
    let registry = registry();
    let config = SheetbridgeConfig::default();
    BulkReconciler::new(&registry, repo, &config.codec).reconcile(batch, options)
}

#[test]
fn test_new_row_with_list_cell_is_created() {
    let repo = MemoryRepository::new();
    let batch = ImportBatch::new().with(
        COMPANY,
        vec![record(json!({"id": null, "name": "Acme", "tagList": "red|blue"}))],
    );

    let result = reconcile(&repo, batch, &ReconcileOptions::default());

    assert_eq!(result.created, 1);
    assert_eq!(result.total_written(), 1);
    assert!(!result.has_errors());
    let ops = repo.operations();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, WriteKind::Create);
    assert_eq!(repo.records(COMPANY)[0]["tagList"], json!(["red", "blue"]));
}

#[test]
fn test_unchanged_row_is_not_written() {
    let repo = MemoryRepository::new();
    let id = repo.seed(COMPANY, record(json!({"name": "Acme"})));
    let batch = ImportBatch::new().with(COMPANY, vec![record(json!({"id": id.get(), "name": "Acme"}))]);

    let result = reconcile(&repo, batch, &ReconcileOptions::default());

    assert_eq!((result.created, result.updated, result.skipped), (0, 0, 1));
    assert!(repo.operations().is_empty());
}

#[test]
fn test_unresolved_relation_reports_row_and_field() {
    let repo = MemoryRepository::new();
    repo.seed(PERSON, record(json!({"email": "ann@x.com", "name": "Ann"})));
    let batch = ImportBatch::new().with(
        COMPANY,
        vec![
            record(json!({"name": "Acme", "owner": "ann@x.com"})),
            record(json!({"name": "Ghost", "owner": "missing@x.com"})),
        ],
    );

    let result = reconcile(&repo, batch, &ReconcileOptions::default());

    assert_eq!(result.created, 1);
    assert_eq!(result.errors.len(), 1);
    let message = &result.errors[0].message;
    assert!(message.contains("row 3"), "{message}");
    assert!(message.contains("field owner"), "{message}");
    assert!(message.contains("not found"), "{message}");

    let names: Vec<_> = repo.records(COMPANY).iter().map(|r| r["name"].clone()).collect();
    assert_eq!(names, vec![json!("Acme")]);
}

#[test]
fn test_selection_overrides_query_filters() {
    let registry = registry();
    let repo = MemoryRepository::new();
    for (email, name) in [
        ("a@x.com", "Ann"),
        ("b@x.com", "Bob"),
        ("c@x.com", "Cid"),
        ("d@x.com", "Dee"),
    ] {
        repo.seed(PERSON, record(json!({"email": email, "name": name})));
    }
    let config = SheetbridgeConfig::default();
    let projector = ExportProjector::new(&registry, &repo, &config);

    let query = parse_query([("filters[name][$eq]", "Dee")]).unwrap();
    let request = ExportRequest::for_type(PERSON).with_query(query).with_selection(
        Selection::by_field(
            "email",
            vec![json!("a@x.com"), json!("b@x.com"), json!("c@x.com")],
        ),
    );

    let ExportOutput::Document(document) = projector.export(&request, Format::Json).unwrap() else {
        panic!("json export yields a document");
    };
    let emails: Vec<_> = document.data[PERSON].iter().map(|r| r["email"].clone()).collect();
    assert_eq!(emails, vec![json!("a@x.com"), json!("b@x.com"), json!("c@x.com")]);
}

#[test]
fn test_batch_scope_keeps_other_slices() {
    let repo = MemoryRepository::new();
    let batch = ImportBatch::new()
        .with(PERSON, vec![record(json!({"email": "a@x.com"})), record(json!({"name": "x"}))])
        .with(COMPANY, vec![record(json!({"name": "Acme"}))]);
    let options = ReconcileOptions::default().with_scope(TransactionScope::Batch);

    let result = reconcile(&repo, batch, &options);

    assert_eq!(result.created, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(repo.records(PERSON).is_empty());
    assert_eq!(repo.records(COMPANY).len(), 1);
}

#[test]
fn test_dry_run_on_sqlite_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteRepository::new(dir.path().join("records.db")).unwrap();
    let batch = ImportBatch::new().with(PERSON, vec![record(json!({"email": "a@x.com"}))]);

    let result = reconcile(&repo, batch, &ReconcileOptions::default().with_dry_run(true));
    assert_eq!(result.created, 1);

    let registry = registry();
    let config = SheetbridgeConfig::default();
    let projector = ExportProjector::new(&registry, &repo, &config);
    let found = projector.collect(&ExportRequest::for_type(PERSON)).unwrap();
    assert!(found[0].1.is_empty());
}

#[test]
fn test_sqlite_relation_resolves_by_shortcut_field() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteRepository::new(dir.path().join("records.db")).unwrap();

    let people = ImportBatch::new().with(PERSON, vec![record(json!({"email": "ann@x.com"}))]);
    assert_eq!(reconcile(&repo, people, &ReconcileOptions::default()).created, 1);

    let companies = ImportBatch::new().with(
        COMPANY,
        vec![record(json!({"name": "Acme", "owner": "ann@x.com"}))],
    );
    let result = reconcile(&repo, companies, &ReconcileOptions::default());
    assert_eq!(result.created, 1, "{:?}", result.error_messages());

    let registry = registry();
    let config = SheetbridgeConfig::default();
    let projector = ExportProjector::new(&registry, &repo, &config);
    let found = projector.collect(&ExportRequest::for_type(COMPANY)).unwrap();
    assert_eq!(found[0].1[0]["owner"]["email"], json!("ann@x.com"));
}

#[test]
fn test_csv_export_reimports_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let repo = SqliteRepository::new(dir.path().join("records.db")).unwrap();
    let config = SheetbridgeConfig::default();

    let batch = ImportBatch::new().with(
        COMPANY,
        vec![
            record(json!({"name": "Acme", "employees": 12, "tagList": "red|blue"})),
            record(json!({"name": "Beta"})),
        ],
    );
    assert_eq!(reconcile(&repo, batch, &ReconcileOptions::default()).created, 2);

    let path = dir.path().join("company.csv");
    let projector = ExportProjector::new(&registry, &repo, &config);
    let written = projector
        .export(&ExportRequest::for_type(COMPANY), Format::Csv)
        .unwrap()
        .write_to(&path)
        .unwrap();
    assert_eq!(written, vec![path.clone()]);

    let service = ImportService::new(&registry, &repo, &config);
    let result = service.import_file(&path, &ImportOptions::from_config(&config)).unwrap();
    assert_eq!((result.created, result.updated, result.skipped), (0, 0, 2));
    assert!(result.errors.is_empty(), "{:?}", result.error_messages());
}

#[test]
fn test_export_named_file_reimports_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let repo = MemoryRepository::new();
    let config = SheetbridgeConfig::default();

    let batch = ImportBatch::new().with(COMPANY, vec![record(json!({"name": "Acme", "tagList": "red"}))]);
    assert_eq!(reconcile(&repo, batch, &ReconcileOptions::default()).created, 1);

    let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let name = export_file_name(
        ExportScope::Query(Some(COMPANY)),
        &config.import.content_namespace,
        Format::Csv,
        date,
    );
    assert_eq!(name, "company.company-export-2026-10-18.csv");

    let path = dir.path().join(&name);
    let projector = ExportProjector::new(&registry, &repo, &config);
    projector
        .export(&ExportRequest::for_type(COMPANY), Format::Csv)
        .unwrap()
        .write_to(&path)
        .unwrap();

    let service = ImportService::new(&registry, &repo, &config);
    let result = service.import_file(&path, &ImportOptions::from_config(&config)).unwrap();
    assert!(result.errors.is_empty(), "{:?}", result.error_messages());
    assert_eq!((result.created, result.updated, result.skipped), (0, 0, 1));
}

#[test]
fn test_multi_sheet_export_files_reimport_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let repo = MemoryRepository::new();
    let config = SheetbridgeConfig::default();

    let batch = ImportBatch::new()
        .with(PERSON, vec![record(json!({"email": "ann@x.com", "name": "Ann"}))])
        .with(COMPANY, vec![record(json!({"name": "Acme", "employees": 3}))]);
    assert_eq!(reconcile(&repo, batch, &ReconcileOptions::default()).created, 2);

    let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let name = export_file_name(
        ExportScope::Query(None),
        &config.import.content_namespace,
        Format::Csv,
        date,
    );
    let projector = ExportProjector::new(&registry, &repo, &config);
    let written = projector
        .export(&ExportRequest::all(), Format::Csv)
        .unwrap()
        .write_to(&dir.path().join(name))
        .unwrap();
    assert_eq!(written.len(), 2);

    let service = ImportService::new(&registry, &repo, &config);
    for path in &written {
        let result = service.import_file(path, &ImportOptions::from_config(&config)).unwrap();
        assert!(result.errors.is_empty(), "{}: {:?}", path.display(), result.error_messages());
        assert_eq!((result.created, result.updated, result.skipped), (0, 0, 1));
    }
    assert_eq!(repo.records(PERSON).len(), 1);
    assert_eq!(repo.records(COMPANY).len(), 1);
}

#[test]
fn test_export_without_matches_has_placeholder_sheet() {
    let registry = registry();
    let repo = MemoryRepository::new();
    let config = SheetbridgeConfig::default();
    let projector = ExportProjector::new(&registry, &repo, &config);

    let ExportOutput::Workbook(workbook) = projector.export(&ExportRequest::all(), Format::Csv).unwrap()
    else {
        panic!("csv export yields a workbook");
    };
    let sheet = workbook.sheet("person").unwrap();
    assert_eq!(sheet.columns.len(), 1);
    assert_eq!(sheet.rows.len(), 1);
    assert!(workbook.sheet("company").is_some());
}

#[test]
fn test_placeholder_export_reimports_as_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let repo = MemoryRepository::new();
    let config = SheetbridgeConfig::default();
    let projector = ExportProjector::new(&registry, &repo, &config);

    let path = dir.path().join("company.company-export-2026-10-18.csv");
    projector
        .export(&ExportRequest::for_type(COMPANY), Format::Csv)
        .unwrap()
        .write_to(&path)
        .unwrap();

    let service = ImportService::new(&registry, &repo, &config);
    let result = service.import_file(&path, &ImportOptions::from_config(&config)).unwrap();
    assert_eq!(result.total_written() + result.skipped, 0);
    assert!(result.errors.is_empty(), "{:?}", result.error_messages());
}
