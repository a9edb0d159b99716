//! Binary entry point for sheetbridge.
//!
//! This binary provides the CLI interface for spreadsheet and JSON import
//! and export.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{CommandContext, ExportArgs, ImportArgs, SchemaAction};
use sheetbridge::config::SheetbridgeConfig;
use sheetbridge::observability;
use std::path::PathBuf;
use std::process::ExitCode;

/// Sheetbridge - bulk import and export of schema-driven records.
#[derive(Parser)]
#[command(name = "sheetbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Import a JSON or CSV file.
    Import(ImportArgs),

    /// Export records.
    Export(ExportArgs),

    /// Export a single record.
    ExportEntry {
        /// Record type id.
        record_type: String,

        /// Record id.
        id: i64,

        /// Output format: json or csv.
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file (default: generated name in the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect the schema.
    Schema {
        /// Schema subcommand.
        #[command(subcommand)]
        action: SchemaAction,
    },

    /// Show the effective configuration.
    Config,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(
    command: Commands,
    config: SheetbridgeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Config = command {
        return commands::cmd_config(&config);
    }

    let ctx = CommandContext::open(config)?;
    match command {
        Commands::Import(args) => commands::cmd_import(&ctx, args),
        Commands::Export(args) => commands::cmd_export(&ctx, args),
        Commands::ExportEntry {
            record_type,
            id,
            format,
            output,
        } => commands::cmd_export_entry(&ctx, &record_type, id, &format, output),
        Commands::Schema { action } => commands::cmd_schema(&ctx, action),
        Commands::Config => commands::cmd_config(&ctx.config),
    }
}

/// Loads configuration.
///
/// An explicit path wins over `SHEETBRIDGE_CONFIG_PATH` and the platform
/// config directory. Environment overrides apply last.
fn load_config(path: Option<&std::path::Path>) -> Result<SheetbridgeConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => SheetbridgeConfig::load_from_file(path)?,
        None => SheetbridgeConfig::load_default(),
    };
    Ok(config.apply_env_overrides()?)
}
