//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Registry selection and storage settings.
    pub global: GlobalConfig,

    /// Management API surface binding.
    pub api: ApiConfig,

    /// Proxy surface binding.
    pub gateway: GatewayConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Plugin settings.
    pub plugins: PluginConfig,
}

/// Registry selection and backing-store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Which registry backing to use: `memory`, `yaml`, `redis` or `mongo`.
    pub service_type: String,

    /// Path of the services file for the `yaml` registry.
    pub services_file: String,

    /// Connection URI for the `redis` registry.
    pub redis_uri: String,

    /// Key namespace for the `redis` registry.
    pub redis_namespace: String,

    /// Connection URI for the `mongo` registry.
    pub mongo_uri: String,

    /// Database name for the `mongo` registry.
    pub mongo_db_name: String,

    /// Collection name for the `mongo` registry.
    pub mongo_collection_name: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            service_type: "memory".to_string(),
            services_file: "services.yml".to_string(),
            redis_uri: String::new(),
            redis_namespace: String::new(),
            mongo_uri: String::new(),
            mongo_db_name: "gatehouse".to_string(),
            mongo_collection_name: "services".to_string(),
        }
    }
}

/// SSL settings for a listening surface.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SslConfig {
    /// Enable TLS termination on this surface.
    pub enabled: bool,

    /// Path to the certificate file (PEM).
    pub cert: String,

    /// Path to the private key file (PEM).
    pub key: String,
}

/// Management API server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address for the management API.
    pub addr: String,

    /// Optional TLS termination.
    pub ssl: SslConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            ssl: SslConfig::default(),
        }
    }
}

/// Proxy server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address for the proxy surface.
    pub addr: String,

    /// Optional TLS termination.
    pub ssl: SslConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            ssl: SslConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PluginConfig {
    /// Enable plugin hooks on the request path.
    pub enabled: bool,

    /// Plugin load order; hooks run in this order for both phases.
    pub order: Vec<String>,
}
