//! Layered application configuration.
//!
//! Values come from serde defaults, then an optional YAML file, then
//! `AUTHZ__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config as ConfigBuilder, Environment, File};
use decision_cache::DECISION_TTL;
use policy_facade::{FacadeOptions, HttpEngineConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "AUTHZ";
pub const CONFIG_DIR_NAME: &str = "authzctl";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSettings,
    pub cache: CacheSettings,
    pub facade: FacadeOptions,
    /// Acting subject when `--subject` is not given.
    pub subject: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub base_url: String,
    pub timeout: String,
    pub bearer_token: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8181".to_string(),
            timeout: "10s".to_string(),
            bearer_token: None,
        }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("engine.timeout", &self.timeout)
    }

    pub fn http_config(&self) -> Result<HttpEngineConfig, ConfigError> {
        Ok(HttpEngineConfig {
            base_url: self.base_url.clone(),
            timeout: self.timeout()?,
            bearer_token: self.bearer_token.clone(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: humantime::format_duration(DECISION_TTL).to_string(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration("cache.ttl", &self.ttl)
    }
}

impl AppConfig {
    /// Reject values that only fail once used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.timeout()?;
        self.cache.ttl()?;
        Ok(())
    }
}

fn parse_duration(field: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|_| ConfigError::InvalidDuration {
        field,
        value: raw.to_string(),
    })
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub from_file: bool,
}

/// `<config_dir>/authzctl/config.yaml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    path.push(CONFIG_DIR_NAME);
    path.push(CONFIG_FILE_NAME);
    Ok(path)
}

/// Load from `path` (or the default location) and apply environment overrides.
///
/// A missing file is not an error; defaults and environment values still apply.
pub fn load(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    let from_file = path.exists();
    if from_file {
        info!("Loading configuration from: {}", path.display());
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            path.display()
        );
    }

    let config: AppConfig = ConfigBuilder::builder()
        .add_source(File::from(path.as_path()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    config.validate()?;

    Ok(LoadedConfig {
        config,
        path,
        from_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_facade::Action;

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.engine.timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.cache.ttl().unwrap(), DECISION_TTL);
        assert!(config.facade.auto_validate);
        assert!(config.subject.is_none());
    }

    #[test]
    fn invalid_duration_names_the_field() {
        let mut config = AppConfig::default();
        config.cache.ttl = "soon".into();
        match config.validate() {
            Err(ConfigError::InvalidDuration { field, value }) => {
                assert_eq!(field, "cache.ttl");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn yaml_document_fills_missing_sections_with_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "engine:\n  base_url: https://pdp.internal\nfacade:\n  check_keys: [read, auth]\n",
        )
        .unwrap();
        assert_eq!(config.engine.base_url, "https://pdp.internal");
        assert_eq!(config.engine.timeout, "10s");
        assert_eq!(config.facade.check_keys, vec![Action::Read, Action::Auth]);
        assert!(config.facade.skip_role_check);
    }
}
