//! Settings resolution for the geocoder
//!
//! Every setting resolves with priority CLI → environment → TOML → compiled
//! default. Provider credentials have no CLI tier; when a key is present in
//! more than one tier a warning names the sources and the highest one wins.

use lmia_common::config::{default_data_dir, is_valid_key, TomlConfig};
use lmia_common::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_CACHE_FILE: &str = "LMIA_CACHE_FILE";
pub const ENV_BOGON_FILE: &str = "LMIA_BOGON_FILE";
pub const ENV_PACING_MS: &str = "LMIA_PACING_MS";
pub const ENV_TURBO: &str = "LMIA_TURBO";
pub const ENV_PREMIUM_BUDGET: &str = "LMIA_PREMIUM_BUDGET";
pub const ENV_TIMEOUT_SECS: &str = "LMIA_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "LMIA_CONNECT_TIMEOUT_SECS";
pub const ENV_GOOGLE_API_KEY: &str = "LMIA_GOOGLE_API_KEY";
pub const ENV_MAPBOX_TOKEN: &str = "LMIA_MAPBOX_TOKEN";
pub const ENV_GEOCODER_CA_AUTH: &str = "LMIA_GEOCODER_CA_AUTH";

const DEFAULT_CACHE_FILE: &str = "postal_cache.csv";
const DEFAULT_BOGON_FILE: &str = "bogons.txt";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub cache_file: Option<PathBuf>,
    pub bogon_file: Option<PathBuf>,
    pub pacing_ms: Option<u64>,
    /// `--turbo` can only switch turbo on
    pub turbo: bool,
}

/// Fully resolved geocoder settings
#[derive(Debug, Clone, PartialEq)]
pub struct GeocoderSettings {
    pub cache_file: PathBuf,
    pub bogon_file: PathBuf,
    /// Replaces every provider's own pacing delay when set
    pub pacing_override: Option<Duration>,
    pub turbo: bool,
    /// Premium-provider calls allowed per run; `None` is unlimited
    pub premium_budget: Option<u64>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub google_api_key: Option<String>,
    pub mapbox_token: Option<String>,
    pub geocoder_ca_auth: Option<String>,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl GeocoderSettings {
    /// Settings with defaults only, rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            cache_file: data_dir.join(DEFAULT_CACHE_FILE),
            bogon_file: data_dir.join(DEFAULT_BOGON_FILE),
            pacing_override: None,
            turbo: false,
            premium_budget: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            google_api_key: None,
            mapbox_token: None,
            geocoder_ca_auth: None,
            log_level: "info".to_string(),
        }
    }

    /// Write the effective settings back out as a TOML config
    pub fn to_toml_config(&self) -> TomlConfig {
        let mut config = TomlConfig {
            cache_file: Some(self.cache_file.clone()),
            bogon_file: Some(self.bogon_file.clone()),
            pacing_ms: self.pacing_override.map(|d| d.as_millis() as u64),
            turbo: Some(self.turbo),
            premium_budget: self.premium_budget,
            timeout_secs: Some(self.timeout.as_secs()),
            connect_timeout_secs: Some(self.connect_timeout.as_secs()),
            ..TomlConfig::default()
        };
        config.providers.google_api_key = self.google_api_key.clone();
        config.providers.mapbox_token = self.mapbox_token.clone();
        config.providers.geocoder_ca_auth = self.geocoder_ca_auth.clone();
        config.logging.level = self.log_level.clone();
        config
    }
}

/// Resolve settings from CLI overrides, environment and TOML config
pub fn resolve_settings(toml: &TomlConfig, cli: &CliOverrides) -> Result<GeocoderSettings> {
    let mut settings = GeocoderSettings::with_data_dir(default_data_dir());

    settings.cache_file = cli
        .cache_file
        .clone()
        .or_else(|| env_value(ENV_CACHE_FILE).map(PathBuf::from))
        .or_else(|| toml.cache_file.clone())
        .unwrap_or(settings.cache_file);

    settings.bogon_file = cli
        .bogon_file
        .clone()
        .or_else(|| env_value(ENV_BOGON_FILE).map(PathBuf::from))
        .or_else(|| toml.bogon_file.clone())
        .unwrap_or(settings.bogon_file);

    let pacing_ms = match cli.pacing_ms {
        Some(ms) => Some(ms),
        None => parse_env::<u64>(ENV_PACING_MS)?.or(toml.pacing_ms),
    };
    settings.pacing_override = pacing_ms.map(Duration::from_millis);

    settings.turbo = cli.turbo || parse_env_bool(ENV_TURBO)?.or(toml.turbo).unwrap_or(false);

    settings.premium_budget = parse_env::<u64>(ENV_PREMIUM_BUDGET)?.or(toml.premium_budget);

    if let Some(secs) = parse_env::<u64>(ENV_TIMEOUT_SECS)?.or(toml.timeout_secs) {
        settings.timeout = positive_secs(secs, ENV_TIMEOUT_SECS)?;
    }
    if let Some(secs) = parse_env::<u64>(ENV_CONNECT_TIMEOUT_SECS)?.or(toml.connect_timeout_secs) {
        settings.connect_timeout = positive_secs(secs, ENV_CONNECT_TIMEOUT_SECS)?;
    }

    settings.google_api_key = resolve_key(
        "Google API key",
        ENV_GOOGLE_API_KEY,
        toml.providers.google_api_key.as_deref(),
    );
    settings.mapbox_token = resolve_key(
        "Mapbox token",
        ENV_MAPBOX_TOKEN,
        toml.providers.mapbox_token.as_deref(),
    );
    settings.geocoder_ca_auth = resolve_key(
        "geocoder.ca auth code",
        ENV_GEOCODER_CA_AUTH,
        toml.providers.geocoder_ca_auth.as_deref(),
    );

    settings.log_level = toml.logging.level.clone();

    Ok(settings)
}

/// Resolve one optional credential: environment, then TOML
fn resolve_key(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_key = env_value(env_var);
    let toml_key = toml_value.filter(|k| is_valid_key(k)).map(|k| k.trim().to_string());

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(key) = env_key {
        info!("{} loaded from environment variable", label);
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("{} loaded from TOML config", label);
        return Some(key);
    }
    None
}

/// Non-empty, trimmed environment value
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| is_valid_key(v))
        .map(|v| v.trim().to_string())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_value(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", name, raw, e))),
        None => Ok(None),
    }
}

fn parse_env_bool(name: &str) -> Result<Option<bool>> {
    match env_value(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::Config(format!(
                "{}={:?} is not a boolean (use true/false)",
                name, raw
            ))),
        },
        None => Ok(None),
    }
}

fn positive_secs(secs: u64, name: &str) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::Config(format!("{} must be at least 1 second", name)));
    }
    Ok(Duration::from_secs(secs))
}
