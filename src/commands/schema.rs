//! Schema command handler.

use super::CommandContext;
use clap::Subcommand;
use sheetbridge::schema::{SchemaRegistry, is_user_content, sheet_name};

/// Schema subcommands.
#[derive(Subcommand)]
pub enum SchemaAction {
    /// List record types.
    List {
        /// Include components and non-content types.
        #[arg(long)]
        all: bool,
    },

    /// Show the fields of a record type.
    Show {
        /// Record type id.
        record_type: String,
    },
}

/// Schema command.
pub fn cmd_schema(ctx: &CommandContext, action: SchemaAction) -> Result<(), Box<dyn std::error::Error>> {
    let namespace = &ctx.config.import.content_namespace;
    match action {
        SchemaAction::List { all } => {
            for record_type in ctx.registry.list_record_types() {
                if !all && !is_user_content(&record_type.id, namespace) {
                    continue;
                }
                println!(
                    "{:<40} sheet={:<20} fields={}",
                    record_type.id,
                    sheet_name(&record_type.id),
                    record_type.fields.len()
                );
            }
        },
        SchemaAction::Show { record_type } => {
            let record_type = ctx.registry.require(&record_type)?;
            println!("{}", record_type.id);
            for (name, spec) in record_type.iter_fields() {
                let mut line = format!("  {name:<24} {}", spec.kind);
                if let Some(target) = &spec.target {
                    line.push_str(&format!(" -> {target} ({:?})", spec.cardinality()));
                } else if let Some(data_type) = spec.data_type {
                    line.push_str(&format!(" {data_type:?}"));
                }
                if spec.custom_list {
                    line.push_str(" [list]");
                }
                if spec.required {
                    line.push_str(" [required]");
                }
                println!("{line}");
            }
        },
    }
    Ok(())
}
