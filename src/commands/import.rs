//! Import command handler.

use super::CommandContext;
use clap::Args;
use sheetbridge::config::TransactionScope;
use sheetbridge::services::{ImportOptions, ImportService};
use std::path::PathBuf;

/// Arguments of the `import` command.
#[derive(Args)]
pub struct ImportArgs {
    /// File to import (.json or .csv).
    pub file: PathBuf,

    /// Record type for every sheet, overriding the sheet name.
    #[arg(short = 't', long = "type")]
    pub record_type: Option<String>,

    /// Transaction scope: per-row or batch.
    #[arg(long)]
    pub scope: Option<String>,

    /// Report what would change without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Treat the file as an upload and delete it afterwards, taking the
    /// format from this name.
    #[arg(long, value_name = "ORIGINAL_NAME")]
    pub upload: Option<String>,
}

/// Import command.
pub fn cmd_import(ctx: &CommandContext, args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ImportOptions::from_config(&ctx.config);
    options.target_type = args.record_type;
    options.reconcile.dry_run = args.dry_run;
    if let Some(scope) = args.scope.as_deref() {
        options.reconcile.scope = scope.parse::<TransactionScope>()?;
    }

    let service = ImportService::new(&ctx.registry, &ctx.repository, &ctx.config);
    let result = match args.upload.as_deref() {
        Some(original_name) => service.import_upload(args.file, original_name, &options)?,
        None => service.import_file(&args.file, &options)?,
    };
    let summary = result.summary();

    println!("{}", summary.message());
    if args.dry_run {
        println!("  (dry run, nothing was written)");
    }
    println!("  Created: {}", summary.created);
    println!("  Updated: {}", summary.updated);
    println!("  Unchanged: {}", result.skipped);
    if result.has_errors() {
        println!();
        println!("Errors ({}):", summary.errors.len());
        for error in &summary.errors {
            println!("  - {error}");
        }
    }

    Ok(())
}
