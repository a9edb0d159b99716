//! In-memory repository.
//!
//! Transactions write straight into the store and keep an undo log of the
//! bodies they replace; rollback (or dropping an uncommitted transaction)
//! replays it in reverse. The store mutex is held for the whole
//! transaction, so writers are serialised.

use super::document::{self, RecordTable};
use super::sqlite::acquire_lock;
use super::traits::{Repository, RepositoryTransaction};
use crate::Result;
use crate::models::{Filter, ID_FIELD, Record, RecordId, RecordType, record_id};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Kind of a journaled write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// A record was created.
    Create,
    /// A record was updated.
    Update,
}

/// A committed write, as passed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    /// Write kind.
    pub kind: WriteKind,
    /// Record type written.
    pub record_type: String,
    /// Id of the written record.
    pub id: RecordId,
    /// Data passed to `create` or `update`.
    pub data: Record,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, BTreeMap<i64, Record>>,
    journal: Vec<WriteOperation>,
}

impl RecordTable for MemoryState {
    fn load(&mut self, record_type: &str, id: RecordId) -> Result<Option<Record>> {
        Ok(self
            .tables
            .get(record_type)
            .and_then(|table| table.get(&id.get()))
            .cloned())
    }

    fn load_all(&mut self, record_type: &str) -> Result<Vec<Record>> {
        Ok(self
            .tables
            .get(record_type)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    fn next_id(&mut self, record_type: &str) -> Result<RecordId> {
        let last = self
            .tables
            .get(record_type)
            .and_then(|table| table.keys().next_back().copied())
            .unwrap_or(0);
        Ok(RecordId::new(last + 1))
    }

    fn save(&mut self, record_type: &str, id: RecordId, body: &Record) -> Result<()> {
        self.tables
            .entry(record_type.to_string())
            .or_default()
            .insert(id.get(), body.clone());
        Ok(())
    }
}

/// Repository backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw body without validation, returning its id.
    ///
    /// Uses the body's `id` when present. Relations must already be `{id}`
    /// references. Seeding is not journaled.
    pub fn seed(&self, record_type: &str, mut body: Record) -> RecordId {
        let mut state = acquire_lock(&self.state);
        let id = record_id(&body).unwrap_or_else(|| {
            let last = state
                .tables
                .get(record_type)
                .and_then(|table| table.keys().next_back().copied())
                .unwrap_or(0);
            RecordId::new(last + 1)
        });
        body.insert(ID_FIELD.to_string(), id.to_value());
        state
            .tables
            .entry(record_type.to_string())
            .or_default()
            .insert(id.get(), body);
        id
    }

    /// Returns the raw stored bodies of a type, ordered by id.
    #[must_use]
    pub fn records(&self, record_type: &str) -> Vec<Record> {
        let state = acquire_lock(&self.state);
        state
            .tables
            .get(record_type)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns committed writes in order.
    #[must_use]
    pub fn operations(&self) -> Vec<WriteOperation> {
        acquire_lock(&self.state).journal.clone()
    }
}

impl Repository for MemoryRepository {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn begin(&self) -> Result<Box<dyn RepositoryTransaction + '_>> {
        let guard = acquire_lock(&self.state);
        let journal_start = guard.journal.len();
        Ok(Box::new(MemoryTransaction {
            guard,
            undo: Vec::new(),
            journal_start,
        }))
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, MemoryState>,
    /// Prior bodies of saved keys, oldest first. `None` marks an insert.
    undo: Vec<(String, i64, Option<Record>)>,
    journal_start: usize,
}

impl MemoryTransaction<'_> {
    fn journal(&mut self, kind: WriteKind, record_type: &RecordType, id: RecordId, data: Record) {
        self.guard.journal.push(WriteOperation {
            kind,
            record_type: record_type.id.clone(),
            id,
            data,
        });
    }

    fn restore(&mut self) {
        let state = &mut *self.guard;
        for (record_type, id, prior) in self.undo.drain(..).rev() {
            let Some(table) = state.tables.get_mut(&record_type) else {
                continue;
            };
            match prior {
                Some(body) => {
                    table.insert(id, body);
                },
                None => {
                    table.remove(&id);
                },
            }
        }
        state.journal.truncate(self.journal_start);
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

impl RecordTable for MemoryTransaction<'_> {
    fn load(&mut self, record_type: &str, id: RecordId) -> Result<Option<Record>> {
        self.guard.load(record_type, id)
    }

    fn load_all(&mut self, record_type: &str) -> Result<Vec<Record>> {
        self.guard.load_all(record_type)
    }

    fn next_id(&mut self, record_type: &str) -> Result<RecordId> {
        self.guard.next_id(record_type)
    }

    fn save(&mut self, record_type: &str, id: RecordId, body: &Record) -> Result<()> {
        let prior = self.guard.load(record_type, id)?;
        self.undo.push((record_type.to_string(), id.get(), prior));
        self.guard.save(record_type, id, body)
    }
}

impl RepositoryTransaction for MemoryTransaction<'_> {
    fn find_by_id(&mut self, record_type: &RecordType, id: RecordId) -> Result<Option<Record>> {
        document::find_by_id(self, record_type, id)
    }

    fn find_by_filter(&mut self, record_type: &RecordType, filter: &Filter) -> Result<Vec<Record>> {
        document::find_by_filter(self, record_type, filter)
    }

    fn create(&mut self, record_type: &RecordType, data: Record) -> Result<Record> {
        let created = document::create(self, record_type, data.clone())?;
        if let Some(id) = record_id(&created) {
            self.journal(WriteKind::Create, record_type, id, data);
        }
        Ok(created)
    }

    fn update(&mut self, record_type: &RecordType, id: RecordId, data: Record) -> Result<Record> {
        let updated = document::update(self, record_type, id, data.clone())?;
        self.journal(WriteKind::Update, record_type, id, data);
        Ok(updated)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.undo.clear();
        self.journal_start = self.guard.journal.len();
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        debug!(writes = self.undo.len(), "Rolling back in-memory transaction");
        self.restore();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::{Cardinality, DataType, FieldSpec};
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn person() -> RecordType {
        RecordType::new("api::person.person")
            .with_field("email", FieldSpec::primitive(DataType::Email).required())
            .with_field("name", FieldSpec::primitive(DataType::String))
    }

    fn company() -> RecordType {
        RecordType::new("api::company.company")
            .with_field("name", FieldSpec::primitive(DataType::String))
            .with_field("owner", FieldSpec::relation("api::person.person", Cardinality::One))
    }

    #[test]
    fn test_commit_and_rollback() {
        let repo = MemoryRepository::new();
        let person = person();

        let mut tx = repo.begin().unwrap();
        tx.create(&person, record(json!({"email": "a@x.com"}))).unwrap();
        tx.rollback().unwrap();
        assert!(repo.records("api::person.person").is_empty());
        assert!(repo.operations().is_empty());

        let mut tx = repo.begin().unwrap();
        let created = tx.create(&person, record(json!({"email": "a@x.com"}))).unwrap();
        tx.commit().unwrap();
        assert_eq!(created["id"], json!(1));
        assert!(created["createdAt"].is_string());
        assert_eq!(repo.operations().len(), 1);
        assert_eq!(repo.operations()[0].kind, WriteKind::Create);
    }

    #[test]
    fn test_drop_rolls_back() {
        let repo = MemoryRepository::new();
        {
            let mut tx = repo.begin().unwrap();
            tx.create(&person(), record(json!({"email": "a@x.com"}))).unwrap();
        }
        assert!(repo.records("api::person.person").is_empty());
    }

    #[test]
    fn test_rollback_restores_replaced_bodies() {
        let repo = MemoryRepository::new();
        repo.seed("api::person.person", record(json!({"id": 1, "email": "a@x.com", "name": "Ann"})));

        let mut tx = repo.begin().unwrap();
        tx.update(&person(), RecordId::new(1), record(json!({"name": "Anna"}))).unwrap();
        tx.update(&person(), RecordId::new(1), record(json!({"name": "Annie"}))).unwrap();
        tx.create(&person(), record(json!({"email": "b@x.com"}))).unwrap();
        tx.rollback().unwrap();

        let stored = repo.records("api::person.person");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["name"], json!("Ann"));
        assert!(repo.operations().is_empty());

        let mut tx = repo.begin().unwrap();
        let created = tx.create(&person(), record(json!({"email": "b@x.com"}))).unwrap();
        tx.commit().unwrap();
        assert_eq!(created["id"], json!(2));
        assert_eq!(repo.operations().len(), 1);
    }

    #[test]
    fn test_reads_populate_relations() {
        let repo = MemoryRepository::new();
        repo.seed("api::person.person", record(json!({"id": 2, "email": "ann@x.com"})));
        repo.seed(
            "api::company.company",
            record(json!({"id": 1, "name": "Acme", "owner": {"id": 2}})),
        );

        let mut tx = repo.begin().unwrap();
        let found = tx.find_by_id(&company(), RecordId::new(1)).unwrap().unwrap();
        assert_eq!(found["owner"]["email"], json!("ann@x.com"));

        let by_path = tx
            .find_by_filter(&company(), &Filter::eq("owner.email", "ann@x.com"))
            .unwrap();
        assert_eq!(by_path.len(), 1);
    }

    #[test]
    fn test_write_rejections() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().unwrap();

        let err = tx.create(&person(), record(json!({"name": "x"}))).unwrap_err();
        assert!(matches!(err, Error::WriteRejected { .. }));
        assert!(err.to_string().contains("email is required"));

        let err = tx
            .create(&company(), record(json!({"owner": "ann@x.com"})))
            .unwrap_err();
        assert!(err.to_string().contains("field owner"));

        let err = tx
            .create(&company(), record(json!({"bogus": 1})))
            .unwrap_err();
        assert!(err.to_string().contains("unknown field bogus"));

        let err = tx
            .update(&company(), RecordId::new(99), record(json!({"name": "x"})))
            .unwrap_err();
        assert!(err.to_string().contains("record 99 not found"));
    }

    #[test]
    fn test_update_is_partial() {
        let repo = MemoryRepository::new();
        repo.seed(
            "api::person.person",
            record(json!({"id": 1, "email": "a@x.com", "name": "Ann"})),
        );

        let mut tx = repo.begin().unwrap();
        let updated = tx
            .update(&person(), RecordId::new(1), record(json!({"name": "Anna"})))
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(updated["email"], json!("a@x.com"));
        assert_eq!(updated["name"], json!("Anna"));
        assert_eq!(repo.operations()[0].kind, WriteKind::Update);
    }
}
