//! Repository traits.

use crate::Result;
use crate::models::{Filter, Record, RecordId, RecordType};

/// A record store that hands out transactions.
///
/// Implementations serialise writers: a second `begin` blocks until the
/// first transaction finishes.
pub trait Repository: Send + Sync {
    /// Returns the backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    fn begin(&self) -> Result<Box<dyn RepositoryTransaction + '_>>;
}

/// Operations available inside a transaction.
///
/// Reads return records with relations populated one level deep. Writes
/// accept relations only as `{id}` references. Dropping a transaction
/// without committing rolls it back.
pub trait RepositoryTransaction {
    /// Finds a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_by_id(&mut self, record_type: &RecordType, id: RecordId) -> Result<Option<Record>>;

    /// Finds all records matching a filter, ordered by id.
    ///
    /// Filters are evaluated against populated records, so dotted paths
    /// reach into relation targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_by_filter(&mut self, record_type: &RecordType, filter: &Filter) -> Result<Vec<Record>>;

    /// Finds the first record (lowest id) matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_first(&mut self, record_type: &RecordType, filter: &Filter) -> Result<Option<Record>> {
        Ok(self.find_by_filter(record_type, filter)?.into_iter().next())
    }

    /// Creates a record and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteRejected`] if the data does not fit the
    /// record type.
    fn create(&mut self, record_type: &RecordType, data: Record) -> Result<Record>;

    /// Applies a partial update and returns the record as stored.
    ///
    /// Only keys present in `data` change. Component objects carrying the
    /// id of an existing component update it in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteRejected`] if the record is missing or
    /// the data does not fit the record type.
    fn update(&mut self, record_type: &RecordType, id: RecordId, data: Record) -> Result<Record>;

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(self: Box<Self>) -> Result<()>;
}
