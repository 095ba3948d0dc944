//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::Config;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a YAML file and apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: Config = serde_yaml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);

    Ok(config)
}

/// SSL settings can be flipped from the environment without editing the file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(enabled) = std::env::var("API_SSL_ENABLED") {
        config.api.ssl.enabled = enabled == "true";
    }
    if config.api.ssl.enabled {
        if let Ok(cert) = std::env::var("API_SSL_CERT") {
            config.api.ssl.cert = cert;
        }
        if let Ok(key) = std::env::var("API_SSL_KEY") {
            config.api.ssl.key = key;
        }
    }

    if let Ok(enabled) = std::env::var("GATEWAY_SSL_ENABLED") {
        config.gateway.ssl.enabled = enabled == "true";
    }
    if config.gateway.ssl.enabled {
        if let Ok(cert) = std::env::var("GATEWAY_SSL_CERT") {
            config.gateway.ssl.cert = cert;
        }
        if let Ok(key) = std::env::var("GATEWAY_SSL_KEY") {
            config.gateway.ssl.key = key;
        }
    }
}
