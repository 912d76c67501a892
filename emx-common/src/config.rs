//! Configuration loading
//!
//! Bootstrap configuration comes from a TOML file located by priority:
//! 1. Command-line argument (highest priority)
//! 2. `EMX_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/emotiox/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing file is not an error: a warning is logged and defaults are used.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cleanup::CleanupOptions;
use crate::legacy::{LegacyAliasTable, LegacyKeyResolver};
use crate::store::DEFAULT_PAGE_SIZE;
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "EMX_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite response database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Alias table file; the built-in table is used when absent
    #[serde(default)]
    pub aliases_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Maintenance pass tuning
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("emotiox").join("responses.db"))
        .unwrap_or_else(|| PathBuf::from("./emotiox_data/responses.db"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_write_concurrency() -> usize {
    4
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            aliases_path: None,
            logging: LoggingConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            write_concurrency: default_write_concurrency(),
        }
    }
}

impl CleanupConfig {
    pub fn to_options(&self, dry_run: bool) -> CleanupOptions {
        CleanupOptions {
            page_size: self.page_size.max(1),
            write_concurrency: self.write_concurrency.max(1),
            dry_run,
        }
    }
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Alias table from `aliases_path`, or the built-in table
    pub fn alias_table(&self) -> Result<LegacyAliasTable> {
        match &self.aliases_path {
            Some(path) => {
                info!("Loading alias table: {}", path.display());
                LegacyAliasTable::load(path)
            }
            None => Ok(LegacyAliasTable::builtin()),
        }
    }

    /// Validated resolver over the configured alias table
    pub fn resolver(&self) -> Result<LegacyKeyResolver> {
        LegacyKeyResolver::new(&self.alias_table()?)
    }
}

/// Locate the config file following the priority order above
///
/// Returns `None` when neither an override nor the platform default exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("emotiox").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load configuration, falling back to defaults when no file is available
///
/// # Errors
/// `Config` when a file exists but cannot be parsed; `Io` when it cannot be read.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded config: {}", path.display());
    Ok(config)
}
