//! Configuration management.
//!
//! Configuration is read from TOML, then overridden from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `SHEETBRIDGE_CONFIG_PATH` | Config file location |
//! | `SHEETBRIDGE_DATA_DIR` | `data_dir` |
//! | `SHEETBRIDGE_SCHEMA_PATH` | `schema_path` |
//! | `SHEETBRIDGE_DATABASE_PATH` | `database_path` |
//! | `SHEETBRIDGE_TRANSACTION_SCOPE` | `import.transaction_scope` |
//! | `SHEETBRIDGE_LOG` | `logging.level` |

mod file;

pub use file::ConfigFile;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SHEETBRIDGE_CONFIG_PATH";

/// Main configuration for sheetbridge.
#[derive(Debug, Clone)]
pub struct SheetbridgeConfig {
    /// Directory for the default database and temporary uploads.
    pub data_dir: PathBuf,
    /// Schema definition file (YAML or JSON).
    pub schema_path: PathBuf,
    /// `SQLite` database path. Defaults to `<data_dir>/records.db`.
    pub database_path: Option<PathBuf>,
    /// Row codec settings.
    pub codec: CodecConfig,
    /// Import settings.
    pub import: ImportConfig,
    /// Export settings.
    pub export: ExportConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for SheetbridgeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".sheetbridge"),
            schema_path: PathBuf::from("schema.yaml"),
            database_path: None,
            codec: CodecConfig::default(),
            import: ImportConfig::default(),
            export: ExportConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Conventions for flattening records into rows and resolving them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Joins list values inside one cell.
    pub list_delimiter: char,
    /// Separates component name from sub-field in column names.
    pub component_separator: char,
    /// Fields tried, in order, to represent a relation on export.
    pub shortcut_fields: Vec<String>,
    /// Fields tried, in order, to look up a relation target on import.
    pub candidate_keys: Vec<String>,
    /// Store-owned fields never diffed, exported or written by imports.
    pub system_keys: Vec<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        let shortcut_fields: Vec<String> = ["email", "businessEmail", "name", "title", "tickerCode"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut candidate_keys = vec!["id".to_string()];
        candidate_keys.extend(shortcut_fields.iter().cloned());

        Self {
            list_delimiter: '|',
            component_separator: '_',
            shortcut_fields,
            candidate_keys,
            system_keys: [
                "documentId",
                "locale",
                "createdAt",
                "updatedAt",
                "publishedAt",
                "createdBy",
                "updatedBy",
                "localizations",
                "status",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl CodecConfig {
    /// Returns whether a key is a system key.
    #[must_use]
    pub fn is_system_key(&self, key: &str) -> bool {
        self.system_keys.iter().any(|k| k == key)
    }
}

/// Transaction granularity for a reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionScope {
    /// Each row commits on its own; failing rows are reported and skipped.
    #[default]
    PerRow,
    /// One transaction per record type; any row error rolls the slice back.
    Batch,
}

impl TransactionScope {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PerRow => "per-row",
            Self::Batch => "batch",
        }
    }
}

impl FromStr for TransactionScope {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-row" | "row" => Ok(Self::PerRow),
            "batch" | "all" => Ok(Self::Batch),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown transaction scope: {other}"
            ))),
        }
    }
}

impl fmt::Display for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Import settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Transaction granularity.
    pub transaction_scope: TransactionScope,
    /// Namespace prefix marking user content record types.
    pub content_namespace: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            transaction_scope: TransactionScope::PerRow,
            content_namespace: "api::".to_string(),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Additional field names never exported.
    pub excluded_fields: Vec<String>,
    /// Message written into placeholder sheets for empty record types.
    pub placeholder_message: String,
    /// Message written into the sheet emitted when nothing matched at all.
    pub no_data_message: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            excluded_fields: Vec::new(),
            placeholder_message: "No data found".to_string(),
            no_data_message: "No data to export".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `sheetbridge=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl SheetbridgeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::operation("read_config_file", e))?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::operation("parse_config_file", e))?;

        let mut config = Self::default();
        file.apply_to(&mut config)?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `SHEETBRIDGE_CONFIG_PATH`, then the platform config dir
    /// (`sheetbridge/config.toml`). Returns defaults if nothing is found.
    #[must_use]
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                match Self::load_from_file(Path::new(&path)) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %path, error = %e, "Ignoring unreadable config"),
                }
            }
        }

        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("sheetbridge").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Applies `SHEETBRIDGE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_env_overrides(mut self) -> crate::Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Applies overrides from an arbitrary key lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<()> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("SHEETBRIDGE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("SHEETBRIDGE_SCHEMA_PATH") {
            self.schema_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("SHEETBRIDGE_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("SHEETBRIDGE_TRANSACTION_SCOPE") {
            self.import.transaction_scope = v.parse()?;
        }
        if let Some(v) = non_empty("SHEETBRIDGE_LOG") {
            self.logging.level = v;
        }
        Ok(())
    }

    /// Returns the effective database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("records.db"))
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the schema path.
    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    /// Sets the transaction scope.
    #[must_use]
    pub const fn with_transaction_scope(mut self, scope: TransactionScope) -> Self {
        self.import.transaction_scope = scope;
        self
    }
}
