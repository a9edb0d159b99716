//! Bulk reconciliation of import batches.
//!
//! Each row walks the same path:
//!
//! ```text
//! lookup existing -> drop system keys -> resolve relations -> merge components -> create | update | skip
//! ```
//!
//! Rows without a usable id always create. Rows whose id matches a stored
//! record update it when [`DiffEngine`] reports a change, and are skipped
//! otherwise. Failures are reported per row as
//! `Failed {creating|updating} on row N: ...`, where `N` counts the header
//! row, so the first data row is row 2.
//!
//! # Transactions
//!
//! | Scope | Boundary | On row error |
//! |-------|----------|--------------|
//! | [`TransactionScope::PerRow`] | one per row | that row is rolled back, the rest continue |
//! | [`TransactionScope::Batch`] | one per record type | the slice is rolled back, its counts are zeroed, and it stops |
//!
//! A dry run rolls back every transaction after computing the outcome.

use super::components::ComponentMerger;
use super::diff::DiffEngine;
use super::relations::RelationResolver;
use crate::config::{CodecConfig, ImportConfig, TransactionScope};
use crate::models::{
    BatchSlice, ID_FIELD, ImportBatch, Record, RecordId, RecordType, ReconcileResult, RowError,
};
use crate::schema::SchemaRegistry;
use crate::storage::{Repository, RepositoryTransaction};
use crate::{Error, Result};
use std::time::Instant;
use tracing::{debug, info, info_span, instrument, warn};

/// Options for one reconcile call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Transaction granularity.
    pub scope: TransactionScope,
    /// Roll back every write after computing the outcome.
    pub dry_run: bool,
}

impl ReconcileOptions {
    /// Builds options from the import configuration.
    #[must_use]
    pub const fn from_config(config: &ImportConfig) -> Self {
        Self {
            scope: config.transaction_scope,
            dry_run: false,
        }
    }

    /// Sets the transaction scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: TransactionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Terminal state of a reconciled row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Created,
    Updated,
    Skipped,
}

impl RowOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }

    fn count(self, result: &mut ReconcileResult) {
        match self {
            Self::Created => result.created += 1,
            Self::Updated => result.updated += 1,
            Self::Skipped => result.skipped += 1,
        }
    }
}

/// A row failure tagged with the write it was attempting.
struct RowFailure {
    updating: bool,
    error: Error,
}

impl RowFailure {
    fn into_row_error(self, record_type: &str, index: usize) -> RowError {
        let action = if self.updating { "updating" } else { "creating" };
        RowError::row(
            record_type,
            index + 2,
            format!("Failed {action} on row {}: {}", index + 2, self.error),
        )
    }
}

/// Applies import batches to a repository.
pub struct BulkReconciler<'a> {
    registry: &'a dyn SchemaRegistry,
    repository: &'a dyn Repository,
    config: &'a CodecConfig,
}

impl<'a> BulkReconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        registry: &'a dyn SchemaRegistry,
        repository: &'a dyn Repository,
        config: &'a CodecConfig,
    ) -> Self {
        Self {
            registry,
            repository,
            config,
        }
    }

    /// Reconciles every slice of a batch.
    ///
    /// Never fails as a whole: unknown record types, row failures and
    /// reader issues carried on the batch are all reported in
    /// [`ReconcileResult::errors`].
    #[instrument(
        name = "sheetbridge.reconcile",
        skip(self, batch),
        fields(
            backend = self.repository.name(),
            rows = batch.len(),
            scope = %options.scope,
            dry_run = options.dry_run
        )
    )]
    pub fn reconcile(&self, batch: ImportBatch, options: &ReconcileOptions) -> ReconcileResult {
        let start = Instant::now();
        let mut result = ReconcileResult::new();
        result.errors.extend(
            batch
                .issues
                .iter()
                .map(|issue| RowError::slice(String::new(), issue.clone())),
        );

        for slice in batch.into_slices() {
            let Some(record_type) = self.registry.get_record_type(&slice.record_type) else {
                warn!(record_type = %slice.record_type, "Skipping unknown record type");
                let error = Error::UnknownRecordType(slice.record_type.clone());
                result
                    .errors
                    .push(RowError::slice(slice.record_type, error.to_string()));
                continue;
            };
            result.merge(self.reconcile_slice(record_type, slice, options));
        }

        metrics::histogram!("sheetbridge_reconcile_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        info!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            errors = result.errors.len(),
            "Reconcile finished"
        );
        result
    }

    fn reconcile_slice(
        &self,
        record_type: &RecordType,
        slice: BatchSlice,
        options: &ReconcileOptions,
    ) -> ReconcileResult {
        let _span = info_span!(
            "sheetbridge.reconcile.slice",
            record_type = %record_type.id,
            rows = slice.records.len()
        )
        .entered();

        match options.scope {
            TransactionScope::PerRow => self.reconcile_per_row(record_type, slice, options.dry_run),
            TransactionScope::Batch => self.reconcile_batch(record_type, slice, options.dry_run),
        }
    }

    fn reconcile_per_row(
        &self,
        record_type: &RecordType,
        slice: BatchSlice,
        dry_run: bool,
    ) -> ReconcileResult {
        let mut result = ReconcileResult::new();

        for (index, row) in slice.records.into_iter().enumerate() {
            let mut tx = match self.repository.begin() {
                Ok(tx) => tx,
                Err(error) => {
                    let failure = RowFailure {
                        updating: false,
                        error,
                    };
                    result.errors.push(failure.into_row_error(&record_type.id, index));
                    continue;
                },
            };

            let outcome = match self.reconcile_row(tx.as_mut(), record_type, row) {
                Ok(outcome) => finish(tx, dry_run)
                    .map(|()| outcome)
                    .map_err(|error| RowFailure {
                        updating: outcome == RowOutcome::Updated,
                        error,
                    }),
                Err(failure) => {
                    if let Err(e) = tx.rollback() {
                        warn!(error = %e, "Failed to roll back row");
                    }
                    Err(failure)
                },
            };

            match outcome {
                Ok(outcome) => record_outcome(outcome, &mut result),
                Err(failure) => {
                    metrics::counter!("sheetbridge_rows_total", "outcome" => "failed").increment(1);
                    let error = failure.into_row_error(&record_type.id, index);
                    debug!(error = %error, "Row failed");
                    result.errors.push(error);
                },
            }
        }

        result
    }

    fn reconcile_batch(
        &self,
        record_type: &RecordType,
        slice: BatchSlice,
        dry_run: bool,
    ) -> ReconcileResult {
        let mut result = ReconcileResult::new();
        let mut tx = match self.repository.begin() {
            Ok(tx) => tx,
            Err(error) => {
                result
                    .errors
                    .push(RowError::slice(record_type.id.clone(), error.to_string()));
                return result;
            },
        };

        let mut outcomes = Vec::with_capacity(slice.records.len());
        for (index, row) in slice.records.into_iter().enumerate() {
            match self.reconcile_row(tx.as_mut(), record_type, row) {
                Ok(outcome) => outcomes.push(outcome),
                Err(failure) => {
                    metrics::counter!("sheetbridge_rows_total", "outcome" => "failed").increment(1);
                    result
                        .errors
                        .push(failure.into_row_error(&record_type.id, index));
                    if let Err(e) = tx.rollback() {
                        warn!(error = %e, "Failed to roll back slice");
                    }
                    warn!(record_type = %record_type.id, "Rolled back record type after row error");
                    return result;
                },
            }
        }

        match finish(tx, dry_run) {
            Ok(()) => {
                for outcome in outcomes {
                    record_outcome(outcome, &mut result);
                }
            },
            Err(error) => result
                .errors
                .push(RowError::slice(record_type.id.clone(), error.to_string())),
        }
        result
    }

    /// Runs one row through lookup, resolution and the write decision.
    fn reconcile_row(
        &self,
        tx: &mut dyn RepositoryTransaction,
        record_type: &RecordType,
        mut row: Record,
    ) -> std::result::Result<RowOutcome, RowFailure> {
        let id = row.shift_remove(ID_FIELD).as_ref().and_then(RecordId::from_value);

        let existing = match id {
            Some(id) => tx.find_by_id(record_type, id).map_err(|error| RowFailure {
                updating: true,
                error,
            })?,
            None => None,
        };
        let updating = existing.is_some();

        self.apply(tx, record_type, existing.as_ref(), row)
            .map_err(|error| RowFailure { updating, error })
    }

    fn apply(
        &self,
        tx: &mut dyn RepositoryTransaction,
        record_type: &RecordType,
        existing: Option<&Record>,
        mut row: Record,
    ) -> Result<RowOutcome> {
        row.retain(|key, _| !self.config.is_system_key(key));
        RelationResolver::new(self.registry, self.config).resolve_record(
            tx,
            record_type,
            &mut row,
        )?;
        ComponentMerger::new(self.registry, self.config).prepare(record_type, existing, &mut row);

        let Some(existing) = existing else {
            tx.create(record_type, row)?;
            return Ok(RowOutcome::Created);
        };

        if !DiffEngine::new(&self.config.system_keys).has_changes(existing, &row) {
            return Ok(RowOutcome::Skipped);
        }

        let id = existing
            .get(ID_FIELD)
            .and_then(RecordId::from_value)
            .ok_or_else(|| Error::operation("reconcile_row", "stored record has no id"))?;
        tx.update(record_type, id, row)?;
        Ok(RowOutcome::Updated)
    }
}

fn finish(tx: Box<dyn RepositoryTransaction + '_>, dry_run: bool) -> Result<()> {
    if dry_run { tx.rollback() } else { tx.commit() }
}

fn record_outcome(outcome: RowOutcome, result: &mut ReconcileResult) {
    metrics::counter!("sheetbridge_rows_total", "outcome" => outcome.as_str()).increment(1);
    outcome.count(result);
}
