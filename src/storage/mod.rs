//! Record storage.
//!
//! The reconciler and the export projector talk to a [`Repository`], which
//! hands out [`RepositoryTransaction`]s. Two backends ship with the crate:
//! - **Memory**: process-local maps with copy-on-begin transactions
//! - **`SQLite`**: JSON bodies in a single table
//!
//! Both share the document rules in [`document`].

// Dropping the store guard early buys nothing while a transaction is open.
#![allow(clippy::significant_drop_tightening)]

pub mod document;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::{MemoryRepository, WriteKind, WriteOperation};
pub use sqlite::SqliteRepository;
pub use traits::{Repository, RepositoryTransaction};
