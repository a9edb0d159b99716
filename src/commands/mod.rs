//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `import.rs`: File import
//! - `export.rs`: Query, selection and single-record export
//! - `schema.rs`: Schema inspection
//! - `config.rs`: Configuration display

mod config;
mod export;
mod import;
mod schema;

use sheetbridge::config::SheetbridgeConfig;
use sheetbridge::{SqliteRepository, StaticSchemaRegistry};

pub use config::cmd_config;
pub use export::{ExportArgs, cmd_export, cmd_export_entry};
pub use import::{ImportArgs, cmd_import};
pub use schema::{SchemaAction, cmd_schema};

/// Dependencies shared by commands that touch records.
pub struct CommandContext {
    /// Effective configuration.
    pub config: SheetbridgeConfig,
    /// Loaded schema.
    pub registry: StaticSchemaRegistry,
    /// Record store.
    pub repository: SqliteRepository,
}

impl CommandContext {
    /// Loads the schema and opens the database named by the configuration.
    pub fn open(config: SheetbridgeConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = StaticSchemaRegistry::load(&config.schema_path)?;
        let repository = SqliteRepository::new(config.database_path())?;
        Ok(Self {
            config,
            registry,
            repository,
        })
    }
}
