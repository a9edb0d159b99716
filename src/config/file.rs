//! TOML config file representation.

use super::{LogFormat, SheetbridgeConfig, TransactionScope};
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration file structure (for TOML parsing).
///
/// Every field is optional; absent values leave defaults in place.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Schema definition file.
    pub schema_path: Option<String>,
    /// `SQLite` database path.
    pub database_path: Option<String>,
    /// Codec section.
    pub codec: Option<ConfigFileCodec>,
    /// Import section.
    pub import: Option<ConfigFileImport>,
    /// Export section.
    pub export: Option<ConfigFileExport>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Codec section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCodec {
    /// List delimiter.
    pub list_delimiter: Option<char>,
    /// Component separator.
    pub component_separator: Option<char>,
    /// Shortcut fields.
    pub shortcut_fields: Option<Vec<String>>,
    /// Candidate keys.
    pub candidate_keys: Option<Vec<String>>,
    /// System keys.
    pub system_keys: Option<Vec<String>>,
}

/// Import section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileImport {
    /// `per-row` or `batch`.
    pub transaction_scope: Option<String>,
    /// Content namespace prefix.
    pub content_namespace: Option<String>,
}

/// Export section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileExport {
    /// Extra excluded fields.
    pub excluded_fields: Option<Vec<String>>,
    /// Placeholder message.
    pub placeholder_message: Option<String>,
    /// Message for the empty-export sheet.
    pub no_data_message: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
}

impl ConfigFile {
    /// Applies the file's values over a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an enumerated value is invalid.
    pub fn apply_to(self, config: &mut SheetbridgeConfig) -> crate::Result<()> {
        if let Some(data_dir) = self.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(schema_path) = self.schema_path {
            config.schema_path = PathBuf::from(schema_path);
        }
        if let Some(database_path) = self.database_path {
            config.database_path = Some(PathBuf::from(database_path));
        }

        if let Some(codec) = self.codec {
            let target = &mut config.codec;
            if let Some(v) = codec.list_delimiter {
                target.list_delimiter = v;
            }
            if let Some(v) = codec.component_separator {
                target.component_separator = v;
            }
            if let Some(v) = codec.shortcut_fields {
                target.shortcut_fields = v;
            }
            if let Some(v) = codec.candidate_keys {
                target.candidate_keys = v;
            }
            if let Some(v) = codec.system_keys {
                target.system_keys = v;
            }
        }

        if let Some(import) = self.import {
            if let Some(scope) = import.transaction_scope {
                config.import.transaction_scope = scope.parse::<TransactionScope>()?;
            }
            if let Some(ns) = import.content_namespace {
                config.import.content_namespace = ns;
            }
        }

        if let Some(export) = self.export {
            if let Some(v) = export.excluded_fields {
                config.export.excluded_fields = v;
            }
            if let Some(v) = export.placeholder_message {
                config.export.placeholder_message = v;
            }
            if let Some(v) = export.no_data_message {
                config.export.no_data_message = v;
            }
        }

        if let Some(logging) = self.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
        }

        Ok(())
    }
}
