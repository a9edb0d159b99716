//! `SQLite` repository.
//!
//! Records live in one `records` table as JSON bodies keyed by
//! `(record_type, id)`. Filters are evaluated on populated records in Rust,
//! so they support the same operators and dotted paths as the in-memory
//! backend.
//!
//! ## Concurrency Model
//!
//! A `Mutex<Connection>` is held for the lifetime of a transaction, and each
//! transaction opens with `BEGIN IMMEDIATE`, so one writer runs at a time
//! per process and across processes sharing the file.

mod connection;
mod metrics;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;

use super::document::{self, RecordTable};
use super::traits::{Repository, RepositoryTransaction};
use crate::models::{Filter, Record, RecordId, RecordType};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{instrument, warn};

/// Repository backed by a `SQLite` database file.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRepository {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_data_dir", e))?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::operation("open_sqlite", e))?;
        configure_connection(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        })
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_sqlite_in_memory", e))?;
        configure_connection(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }
}

impl Repository for SqliteRepository {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn begin(&self) -> Result<Box<dyn RepositoryTransaction + '_>> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| Error::operation("begin_transaction", e))?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteTransaction<'_> {
    fn finish(&mut self, statement: &'static str) -> Result<()> {
        self.finished = true;
        self.conn
            .execute_batch(statement)
            .map_err(|e| Error::operation(statement.to_lowercase(), e))
    }

    fn timed<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = f(self);
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(operation, start, status);
        result
    }
}

fn parse_body(body: &str) -> Result<Record> {
    serde_json::from_str(body).map_err(|e| Error::operation("decode_record", e))
}

impl RecordTable for SqliteTransaction<'_> {
    fn load(&mut self, record_type: &str, id: RecordId) -> Result<Option<Record>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE record_type = ?1 AND id = ?2",
                params![record_type, id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::operation("load_record", e))?;
        body.as_deref().map(parse_body).transpose()
    }

    fn load_all(&mut self, record_type: &str) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM records WHERE record_type = ?1 ORDER BY id")
            .map_err(|e| Error::operation("load_records", e))?;
        let bodies = stmt
            .query_map(params![record_type], |row| row.get::<_, String>(0))
            .map_err(|e| Error::operation("load_records", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("load_records", e))?;
        bodies.iter().map(|body| parse_body(body)).collect()
    }

    fn next_id(&mut self, record_type: &str) -> Result<RecordId> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM records WHERE record_type = ?1",
                params![record_type],
                |row| row.get::<_, i64>(0),
            )
            .map(RecordId::new)
            .map_err(|e| Error::operation("next_record_id", e))
    }

    fn save(&mut self, record_type: &str, id: RecordId, body: &Record) -> Result<()> {
        let encoded =
            serde_json::to_string(body).map_err(|e| Error::operation("encode_record", e))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO records (record_type, id, body) VALUES (?1, ?2, ?3)",
                params![record_type, id.get(), encoded],
            )
            .map_err(|e| Error::operation("save_record", e))?;
        Ok(())
    }
}

impl RepositoryTransaction for SqliteTransaction<'_> {
    #[instrument(skip(self, record_type), fields(record_type = %record_type.id, id = %id))]
    fn find_by_id(&mut self, record_type: &RecordType, id: RecordId) -> Result<Option<Record>> {
        self.timed("find_by_id", |tx| document::find_by_id(tx, record_type, id))
    }

    #[instrument(skip(self, record_type, filter), fields(record_type = %record_type.id))]
    fn find_by_filter(&mut self, record_type: &RecordType, filter: &Filter) -> Result<Vec<Record>> {
        self.timed("find_by_filter", |tx| {
            document::find_by_filter(tx, record_type, filter)
        })
    }

    #[instrument(skip(self, record_type, data), fields(record_type = %record_type.id))]
    fn create(&mut self, record_type: &RecordType, data: Record) -> Result<Record> {
        self.timed("create", |tx| document::create(tx, record_type, data))
    }

    #[instrument(skip(self, record_type, data), fields(record_type = %record_type.id, id = %id))]
    fn update(&mut self, record_type: &RecordType, id: RecordId, data: Record) -> Result<Record> {
        self.timed("update", |tx| document::update(tx, record_type, id, data))
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "Failed to roll back abandoned transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cardinality, DataType, FieldSpec};
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn tag() -> RecordType {
        RecordType::new("api::tag.tag").with_field("name", FieldSpec::primitive(DataType::String))
    }

    fn post() -> RecordType {
        RecordType::new("api::post.post")
            .with_field("title", FieldSpec::primitive(DataType::String))
            .with_field("tags", FieldSpec::relation("api::tag.tag", Cardinality::Many))
    }

    #[test]
    fn test_create_find_update() {
        let repo = SqliteRepository::in_memory().unwrap();

        let mut tx = repo.begin().unwrap();
        let red = tx.create(&tag(), record(json!({"name": "red"}))).unwrap();
        let post_record = tx
            .create(
                &post(),
                record(json!({"title": "Hello", "tags": [{"id": red["id"]}]})),
            )
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(post_record["tags"][0]["name"], json!("red"));

        let mut tx = repo.begin().unwrap();
        let updated = tx
            .update(&post(), RecordId::new(1), record(json!({"title": "Bye"})))
            .unwrap();
        assert_eq!(updated["tags"].as_array().unwrap().len(), 1);
        tx.commit().unwrap();

        let mut tx = repo.begin().unwrap();
        let found = tx
            .find_first(&post(), &Filter::eq("tags.name", "red"))
            .unwrap()
            .unwrap();
        assert_eq!(found["title"], json!("Bye"));
    }

    #[test]
    fn test_ids_are_per_record_type() {
        let repo = SqliteRepository::in_memory().unwrap();
        let mut tx = repo.begin().unwrap();
        let a = tx.create(&tag(), record(json!({"name": "a"}))).unwrap();
        let b = tx.create(&post(), record(json!({"title": "b"}))).unwrap();
        tx.commit().unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(1));
    }

    #[test]
    fn test_rollback_and_drop_discard_writes() {
        let repo = SqliteRepository::in_memory().unwrap();

        let mut tx = repo.begin().unwrap();
        tx.create(&tag(), record(json!({"name": "a"}))).unwrap();
        tx.rollback().unwrap();

        {
            let mut tx = repo.begin().unwrap();
            tx.create(&tag(), record(json!({"name": "b"}))).unwrap();
        }

        let mut tx = repo.begin().unwrap();
        assert!(tx.find_by_filter(&tag(), &Filter::All).unwrap().is_empty());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        {
            let repo = SqliteRepository::new(&path).unwrap();
            let mut tx = repo.begin().unwrap();
            tx.create(&tag(), record(json!({"name": "kept"}))).unwrap();
            tx.commit().unwrap();
        }

        let repo = SqliteRepository::new(&path).unwrap();
        assert_eq!(repo.db_path(), Some(&path));
        let mut tx = repo.begin().unwrap();
        let found = tx.find_by_id(&tag(), RecordId::new(1)).unwrap().unwrap();
        assert_eq!(found["name"], json!("kept"));
    }
}
