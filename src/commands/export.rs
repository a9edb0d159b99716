//! Export command handlers.

use super::CommandContext;
use clap::Args;
use sheetbridge::RecordId;
use sheetbridge::io::Format;
use sheetbridge::services::{
    ExportProjector, ExportRequest, ExportScope, SEARCH_KEY, Selection, export_file_name,
    parse_query,
};
use serde_json::Value;
use std::path::PathBuf;

/// Arguments of the `export` command.
#[derive(Args)]
pub struct ExportArgs {
    /// Record type to export (default: every content type).
    #[arg(short = 't', long = "type")]
    pub record_type: Option<String>,

    /// Output format: json or csv.
    #[arg(short, long, default_value = "json")]
    pub format: String,

    /// Output file (default: generated name in the current directory).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Query parameter as KEY=VALUE, e.g. `filters[name][$eq]=Acme`.
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Free-text search.
    #[arg(short, long)]
    pub search: Option<String>,

    /// Export only these values of `--field` (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Lookup field for `--ids`.
    #[arg(long, default_value = "id")]
    pub field: String,
}

/// Export command.
pub fn cmd_export(ctx: &CommandContext, args: ExportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let format: Format = args.format.parse()?;

    let mut params = Vec::with_capacity(args.filters.len() + 1);
    for entry in &args.filters {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("Invalid --filter (expected KEY=VALUE): {entry}"))?;
        params.push((key, value));
    }
    if let Some(search) = args.search.as_deref() {
        params.push((SEARCH_KEY, search));
    }

    let mut request = ExportRequest {
        record_type: args.record_type.clone(),
        query: parse_query(params)?,
        selection: None,
    };
    if !args.ids.is_empty() {
        let ids = args.ids.iter().map(|id| Value::String(id.clone())).collect();
        request = request.with_selection(Selection::by_field(&args.field, ids));
    }

    let scope = match (&args.record_type, args.ids.len()) {
        (Some(record_type), n) if n > 0 => ExportScope::Selection(record_type, n),
        (record_type, _) => ExportScope::Query(record_type.as_deref()),
    };
    let output = args.output.unwrap_or_else(|| default_name(ctx, scope, format));

    let projector = ExportProjector::new(&ctx.registry, &ctx.repository, &ctx.config);
    let written = projector.export(&request, format)?.write_to(&output)?;
    print_written(&written);
    Ok(())
}

/// Export-entry command.
pub fn cmd_export_entry(
    ctx: &CommandContext,
    record_type: &str,
    id: i64,
    format: &str,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let format: Format = format.parse()?;
    let id = RecordId::new(id);
    let output = output.unwrap_or_else(|| default_name(ctx, ExportScope::Entry(id), format));

    let projector = ExportProjector::new(&ctx.registry, &ctx.repository, &ctx.config);
    let written = projector
        .export_single(record_type, id, format)?
        .write_to(&output)?;
    print_written(&written);
    Ok(())
}

fn default_name(ctx: &CommandContext, scope: ExportScope<'_>, format: Format) -> PathBuf {
    let today = chrono::Local::now().date_naive();
    PathBuf::from(export_file_name(
        scope,
        &ctx.config.import.content_namespace,
        format,
        today,
    ))
}

fn print_written(written: &[PathBuf]) {
    println!("Exported to:");
    for path in written {
        println!("  {}", path.display());
    }
}
