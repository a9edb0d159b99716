//! Config command handler.

use sheetbridge::config::SheetbridgeConfig;

/// Config command.
pub fn cmd_config(config: &SheetbridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current Configuration");
    println!("=====================");
    println!();

    println!("Data Directory: {}", config.data_dir.display());
    println!("Schema: {}", config.schema_path.display());
    println!("Database: {}", config.database_path().display());
    println!();

    println!("Codec:");
    println!("  List Delimiter: {}", config.codec.list_delimiter);
    println!("  Component Separator: {}", config.codec.component_separator);
    println!("  Shortcut Fields: {}", config.codec.shortcut_fields.join(", "));
    println!("  Candidate Keys: {}", config.codec.candidate_keys.join(", "));
    println!("  System Keys: {}", config.codec.system_keys.join(", "));
    println!();

    println!("Import:");
    println!("  Transaction Scope: {}", config.import.transaction_scope);
    println!("  Content Namespace: {}", config.import.content_namespace);
    println!();

    println!("Export:");
    if config.export.excluded_fields.is_empty() {
        println!("  Excluded Fields: (none)");
    } else {
        println!("  Excluded Fields: {}", config.export.excluded_fields.join(", "));
    }
    println!("  Placeholder: {}", config.export.placeholder_message);
    println!();

    println!("Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {:?}", config.logging.format);

    Ok(())
}
