//! Settings resolution tests
//!
//! Uses serial_test: every test here reads or writes `LMIA_*` environment
//! variables, so they must not run in parallel.

use lmia_common::config::TomlConfig;
use lmia_geo::config::{
    resolve_settings, CliOverrides, ENV_BOGON_FILE, ENV_CACHE_FILE, ENV_GOOGLE_API_KEY,
    ENV_PACING_MS, ENV_PREMIUM_BUDGET, ENV_TIMEOUT_SECS, ENV_TURBO,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const ALL_VARS: [&str; 7] = [
    ENV_BOGON_FILE,
    ENV_CACHE_FILE,
    ENV_GOOGLE_API_KEY,
    ENV_PACING_MS,
    ENV_PREMIUM_BUDGET,
    ENV_TIMEOUT_SECS,
    ENV_TURBO,
];

fn clear_env() {
    for var in ALL_VARS {
        env::remove_var(var);
    }
}

fn toml_with_cache(path: &str) -> TomlConfig {
    TomlConfig {
        cache_file: Some(PathBuf::from(path)),
        pacing_ms: Some(300),
        ..TomlConfig::default()
    }
}

#[test]
#[serial]
fn test_defaults_without_any_source() {
    clear_env();
    let settings = resolve_settings(&TomlConfig::default(), &CliOverrides::default()).unwrap();

    assert!(settings.cache_file.ends_with("postal_cache.csv"));
    assert!(settings.bogon_file.ends_with("bogons.txt"));
    assert!(!settings.turbo);
    assert_eq!(settings.pacing_override, None);
    assert_eq!(settings.premium_budget, None);
    assert_eq!(settings.google_api_key, None);
    assert_eq!(settings.log_level, "info");
}

#[test]
#[serial]
fn test_toml_beats_default() {
    clear_env();
    let settings =
        resolve_settings(&toml_with_cache("/toml/cache.csv"), &CliOverrides::default()).unwrap();

    assert_eq!(settings.cache_file, PathBuf::from("/toml/cache.csv"));
    assert_eq!(settings.pacing_override, Some(Duration::from_millis(300)));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    clear_env();
    env::set_var(ENV_CACHE_FILE, "/env/cache.csv");
    env::set_var(ENV_PACING_MS, "50");

    let settings =
        resolve_settings(&toml_with_cache("/toml/cache.csv"), &CliOverrides::default()).unwrap();

    assert_eq!(settings.cache_file, PathBuf::from("/env/cache.csv"));
    assert_eq!(settings.pacing_override, Some(Duration::from_millis(50)));
    clear_env();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env();
    env::set_var(ENV_CACHE_FILE, "/env/cache.csv");
    env::set_var(ENV_PACING_MS, "50");

    let cli = CliOverrides {
        cache_file: Some(PathBuf::from("/cli/cache.csv")),
        pacing_ms: Some(0),
        ..CliOverrides::default()
    };
    let settings = resolve_settings(&toml_with_cache("/toml/cache.csv"), &cli).unwrap();

    assert_eq!(settings.cache_file, PathBuf::from("/cli/cache.csv"));
    assert_eq!(settings.pacing_override, Some(Duration::ZERO));
    clear_env();
}

#[test]
#[serial]
fn test_env_key_beats_toml_key() {
    clear_env();
    env::set_var(ENV_GOOGLE_API_KEY, "env-key");

    let mut toml = TomlConfig::default();
    toml.providers.google_api_key = Some("toml-key".to_string());

    let settings = resolve_settings(&toml, &CliOverrides::default()).unwrap();
    assert_eq!(settings.google_api_key.as_deref(), Some("env-key"));
    clear_env();
}

#[test]
#[serial]
fn test_blank_values_are_absent() {
    clear_env();
    env::set_var(ENV_GOOGLE_API_KEY, "   ");

    let mut toml = TomlConfig::default();
    toml.providers.google_api_key = Some(String::new());

    let settings = resolve_settings(&toml, &CliOverrides::default()).unwrap();
    assert_eq!(settings.google_api_key, None);
    clear_env();
}

#[test]
#[serial]
fn test_turbo_from_env_and_cli() {
    clear_env();
    env::set_var(ENV_TURBO, "yes");
    let settings = resolve_settings(&TomlConfig::default(), &CliOverrides::default()).unwrap();
    assert!(settings.turbo);

    env::set_var(ENV_TURBO, "off");
    let cli = CliOverrides {
        turbo: true,
        ..CliOverrides::default()
    };
    let settings = resolve_settings(&TomlConfig::default(), &cli).unwrap();
    assert!(settings.turbo);
    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_values_are_config_errors() {
    clear_env();
    env::set_var(ENV_TURBO, "maybe");
    assert!(resolve_settings(&TomlConfig::default(), &CliOverrides::default()).is_err());

    clear_env();
    env::set_var(ENV_PREMIUM_BUDGET, "lots");
    assert!(resolve_settings(&TomlConfig::default(), &CliOverrides::default()).is_err());

    clear_env();
    env::set_var(ENV_TIMEOUT_SECS, "0");
    assert!(resolve_settings(&TomlConfig::default(), &CliOverrides::default()).is_err());
    clear_env();
}

#[test]
#[serial]
fn test_premium_budget_from_toml() {
    clear_env();
    let toml = TomlConfig {
        premium_budget: Some(25),
        ..TomlConfig::default()
    };
    let settings = resolve_settings(&toml, &CliOverrides::default()).unwrap();
    assert_eq!(settings.premium_budget, Some(25));
}
