//! Import service.
//!
//! Reads an import file into an [`ImportBatch`] and hands it to the
//! [`BulkReconciler`]. JSON files carry nested records and bypass the row
//! codec; CSV sheets are unflattened against the schema first.

use super::reconcile::{BulkReconciler, ReconcileOptions};
use crate::config::SheetbridgeConfig;
use crate::io::formats::{csv::CsvSheetSource, json};
use crate::io::{Format, RowCodec, SheetSource};
use crate::models::{ImportBatch, ReconcileResult, Record, Workbook};
use crate::schema::{SchemaRegistry, record_type_for_sheet};
use crate::storage::Repository;
use crate::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Options for one import call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Record type every sheet is imported into, overriding the sheet name
    /// mapping. Ignored for JSON files.
    pub target_type: Option<String>,
    /// Reconcile options.
    pub reconcile: ReconcileOptions,
}

impl ImportOptions {
    /// Builds options from the import configuration.
    #[must_use]
    pub fn from_config(config: &SheetbridgeConfig) -> Self {
        Self {
            target_type: None,
            reconcile: ReconcileOptions::from_config(&config.import),
        }
    }

    /// Sets the target record type.
    #[must_use]
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }
}

/// Deletes an uploaded file when dropped.
struct UploadGuard {
    path: PathBuf,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed uploaded file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove uploaded file"),
        }
    }
}

/// Service for importing files.
pub struct ImportService<'a> {
    registry: &'a dyn SchemaRegistry,
    repository: &'a dyn Repository,
    config: &'a SheetbridgeConfig,
}

impl<'a> ImportService<'a> {
    /// Creates an import service.
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

    /// Imports a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for an unknown extension, or
    /// [`Error::InvalidInput`] when the file cannot be read or parsed.
    /// Row and record type failures are reported in the result instead.
    #[instrument(
        name = "sheetbridge.import",
        skip(self, options),
        fields(path = %path.display(), dry_run = options.reconcile.dry_run)
    )]
    pub fn import_file(&self, path: &Path, options: &ImportOptions) -> Result<ReconcileResult> {
        let batch = self.read_batch(path, path, options.target_type.as_deref())?;
        Ok(self.reconcile(batch, options))
    }

    /// Imports an uploaded temporary file, deleting it afterwards.
    ///
    /// The format and the sheet name come from `original_name`, since
    /// uploaded files are usually stored under a generated name. The file
    /// is removed whether the import succeeds or fails.
    ///
    /// # Errors
    ///
    /// Same as [`Self::import_file`].
    #[instrument(
        name = "sheetbridge.import_upload",
        skip(self, upload, options),
        fields(original_name = %original_name)
    )]
    pub fn import_upload(
        &self,
        upload: PathBuf,
        original_name: &str,
        options: &ImportOptions,
    ) -> Result<ReconcileResult> {
        let guard = UploadGuard { path: upload };
        let batch = self.read_batch(
            &guard.path,
            Path::new(original_name),
            options.target_type.as_deref(),
        )?;
        Ok(self.reconcile(batch, options))
    }

    /// Reads `path` into a batch, detecting the format from `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] or [`Error::InvalidInput`].
    pub fn read_batch(
        &self,
        path: &Path,
        name: &Path,
        target_type: Option<&str>,
    ) -> Result<ImportBatch> {
        let format = Format::from_path(name)?;
        let file = File::open(path)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;
        let reader = BufReader::new(file);

        let batch = match format {
            Format::Json => json::read_batch(reader)?,
            Format::Csv => {
                let sheet_name = name
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("sheet");
                let workbook = CsvSheetSource::new(reader, sheet_name).read_workbook()?;
                self.batch_from_workbook(workbook, target_type)
            },
        };
        info!(
            format = %format,
            record_types = batch.slices().len(),
            rows = batch.len(),
            "Read import file"
        );
        Ok(batch)
    }

    /// Unflattens sheets into a batch.
    ///
    /// Empty sheets and the placeholder sheets written by exports without
    /// matches are skipped. Sheets mapping to an unknown record type are
    /// kept as-is so the reconciler reports them.
    #[must_use]
    pub fn batch_from_workbook(&self, workbook: Workbook, target_type: Option<&str>) -> ImportBatch {
        let codec = RowCodec::new(self.registry, &self.config.codec);
        let namespace = &self.config.import.content_namespace;
        let export = &self.config.export;
        let mut batch = ImportBatch::new();

        for sheet in workbook.sheets {
            if sheet.rows.is_empty() {
                debug!(sheet = %sheet.name, "Skipping empty sheet");
                continue;
            }
            if sheet
                .placeholder_message()
                .is_some_and(|m| m == export.placeholder_message || m == export.no_data_message)
            {
                debug!(sheet = %sheet.name, "Skipping placeholder sheet");
                continue;
            }
            let record_type_id = target_type.map_or_else(
                || record_type_for_sheet(self.registry, &sheet.name, namespace),
                ToString::to_string,
            );
            let records: Vec<Record> = match self.registry.get_record_type(&record_type_id) {
                Some(record_type) => sheet
                    .rows
                    .iter()
                    .map(|row| codec.unflatten(row, record_type))
                    .collect(),
                None => sheet.rows,
            };
            batch.push(record_type_id, records);
        }
        batch
    }

    fn reconcile(&self, batch: ImportBatch, options: &ImportOptions) -> ReconcileResult {
        BulkReconciler::new(self.registry, self.repository, &self.config.codec)
            .reconcile(batch, &options.reconcile)
    }
}
