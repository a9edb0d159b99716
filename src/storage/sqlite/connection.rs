//! Connection handling for the `SQLite` backend.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex with poison recovery.
///
/// A panic inside an earlier critical section poisons the mutex; the inner
/// value is recovered and a warning logged instead of failing every later
/// caller.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Store mutex was poisoned, recovering");
            metrics::counter!("sheetbridge_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection: WAL journal, NORMAL sync, 5 second busy timeout,
/// and creates the records table.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the schema cannot be created.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so it cannot go through execute_batch
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            record_type TEXT NOT NULL,
            id INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (record_type, id)
        )",
    )
    .map_err(|e| Error::operation("create_records_table", e))
}
