//! Configuration file loading and default path resolution
//!
//! Config file lookup priority:
//! 1. Command-line argument (highest priority)
//! 2. `LMIA_CONFIG` environment variable
//! 3. OS-dependent default (`<config dir>/lmia/geocoder.toml`), only if it exists
//!
//! A missing default config file is not an error; callers fall back to
//! compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LMIA_CONFIG";

/// Application directory name under the platform config/data directories
const APP_DIR: &str = "lmia";

/// Default config file name
const CONFIG_FILE_NAME: &str = "geocoder.toml";

/// TOML configuration file contents
///
/// Every field is optional so partial files stay valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Postal-code cache table path
    pub cache_file: Option<PathBuf>,
    /// Bogon list path
    pub bogon_file: Option<PathBuf>,
    /// Pacing delay override applied to every provider (milliseconds)
    pub pacing_ms: Option<u64>,
    /// Try the first configured premium provider before the free ones
    pub turbo: Option<bool>,
    /// Maximum number of premium-provider calls per run
    pub premium_budget: Option<u64>,
    /// Total per-request timeout (seconds)
    pub timeout_secs: Option<u64>,
    /// Connect timeout (seconds)
    pub connect_timeout_secs: Option<u64>,
    /// Provider credentials
    pub providers: ProviderKeys,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Provider credentials section (`[providers]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderKeys {
    pub google_api_key: Option<String>,
    pub mapbox_token: Option<String>,
    pub geocoder_ca_auth: Option<String>,
}

/// Logging section (`[logging]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locate the config file to load, if any
///
/// Returns `Ok(None)` when no explicit path is given and the default file does
/// not exist. An explicit path (CLI or environment) that does not exist is a
/// configuration error.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf(), "command line");
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path), CONFIG_ENV_VAR);
        }
    }

    // Priority 3: OS-dependent default, optional
    match default_config_path() {
        Some(path) if path.exists() => Ok(Some(path)),
        Some(path) => {
            debug!("No config file at {}, using defaults", path.display());
            Ok(None)
        }
        None => Ok(None),
    }
}

fn require_existing(path: PathBuf, source: &str) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!(
            "Config file from {} not found: {}",
            source,
            path.display()
        )))
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate and load the config file, or return defaults when there is none
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(cli_arg)? {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Write config atomically (temp file + rename)
///
/// The file holds API keys, so on Unix it is created with mode 0600.
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

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

/// Default config file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// OS-dependent default data folder for the cache and bogon files
pub fn default_data_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join(APP_DIR),
        None => {
            warn!("Could not determine local data directory, using ./lmia_data");
            PathBuf::from("./lmia_data")
        }
    }
}

/// Treat empty or whitespace-only keys as absent
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
