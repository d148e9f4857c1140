//! Configuration loading and data folder resolution
//!
//! Config file lookup follows this priority order:
//! 1. Explicit path (highest priority)
//! 2. `PRIMSRC_CONFIG` environment variable
//! 3. User config dir (`~/.config/primsrc/config.toml`)
//! 4. System config (`/etc/primsrc/config.toml`, Linux only)
//!
//! When no file is found the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PRIMSRC_CONFIG";

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV_VAR: &str = "PRIMSRC_DATA_FOLDER";

/// Environment variable carrying the search service API key
pub const SEARCH_API_KEY_ENV_VAR: &str = "PRIMSRC_SEARCH_API_KEY";

/// Registry database file name inside the data folder
pub const REGISTRY_DB_FILE: &str = "primary_sources.db";

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset (trace/debug/info/warn/error)
    pub level: String,
    /// Emit span/event targets
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
        }
    }
}

/// Top-level TOML configuration
///
/// The `[resolver]` table is kept raw here; the resolver crate parses it
/// into its own policy type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub search_api_key: Option<String>,
    pub logging: LoggingConfig,
    pub resolver: toml::Table,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Locate and load the config file, falling back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match locate_config_file(explicit)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_from(&path)
            }
            None => {
                info!("No configuration file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Find the config file to use, if any
///
/// An explicit path or `PRIMSRC_CONFIG` that does not exist is an error;
/// missing default locations are not.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!("Config file not found: {}", path.display())));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!(
            "{} points to missing file: {}",
            CONFIG_ENV_VAR,
            path.display()
        )));
    }

    if let Some(user) = dirs::config_dir().map(|d| d.join("primsrc").join("config.toml")) {
        if user.exists() {
            return Ok(Some(user));
        }
    }

    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/primsrc/config.toml");
        if system.exists() {
            return Ok(Some(system));
        }
    }

    Ok(None)
}

/// Data folder resolution:
/// 1. Explicit argument
/// 2. `PRIMSRC_DATA_FOLDER`
/// 3. `data_folder` from TOML
/// 4. OS-dependent default
pub fn resolve_data_folder(explicit: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// Get OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("primsrc"))
        .unwrap_or_else(|| PathBuf::from("./primsrc_data"))
}

/// Path of the registry database inside a data folder
pub fn registry_db_path(data_folder: &Path) -> PathBuf {
    data_folder.join(REGISTRY_DB_FILE)
}

/// Resolve the search service API key
///
/// **Priority:** ENV → TOML
pub fn resolve_search_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(SEARCH_API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .search_api_key
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Search API key found in both environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("Search API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("Search API key loaded from TOML config");
        return Ok(key.clone());
    }

    Err(Error::Config(format!(
        "Search API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: ~/.config/primsrc/config.toml (search_api_key = \"your-key\")",
        SEARCH_API_KEY_ENV_VAR
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Write configuration atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 since it may hold an API key.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
