//! Hierarchical configuration loading (ambient stack, SPEC_FULL.md "Configuration").

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}, must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("global_worker_cap must be at least 1")]
    InvalidWorkerCap,
}

/// Load configuration with hierarchical merging.
///
/// Precedence (lowest to highest):
/// 1. Programmatic defaults
/// 2. `.fleet/config.yaml` (project config)
/// 3. `.fleet/local.yaml` (optional local overrides)
/// 4. Environment variables (`FLEET_` prefix, `__` nesting)
pub fn load() -> Result<Config> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Yaml::file(".fleet/config.yaml"))
        .merge(Yaml::file(".fleet/local.yaml"))
        .merge(Env::prefixed("FLEET_").split("__"))
        .extract()
        .context("failed to extract configuration from figment")?;

    validate(&config)?;
    Ok(config)
}

pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Yaml::file(path.as_ref()))
        .extract()
        .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.path.is_empty() {
        return Err(ConfigError::EmptyDatabasePath);
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
    }
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }
    if config.supervisor.global_worker_cap == 0 {
        return Err(ConfigError::InvalidWorkerCap);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        validate(&config).expect("default config should be valid");
    }

    #[test]
    fn rejects_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".into();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn hierarchical_merge_lets_override_win() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base = NamedTempFile::new().unwrap();
        writeln!(base, "logging:\n  level: info").unwrap();
        base.flush().unwrap();

        let mut over = NamedTempFile::new().unwrap();
        writeln!(over, "logging:\n  level: debug").unwrap();
        over.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(over.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn load_from_file_reads_a_single_yaml_source() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: debug\ndatabase:\n  max_connections: 7").unwrap();
        file.flush().unwrap();

        let config = load_from_file(file.path()).expect("config loads from explicit file");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.database.max_connections, 7);
    }
}
