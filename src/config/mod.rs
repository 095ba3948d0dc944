//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (API_SSL_*, GATEWAY_SSL_*)
//!     → Config (immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - SSL toggles can be flipped from the environment without touching the file

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, Config, GatewayConfig, GlobalConfig, LoggingConfig, PluginConfig, SslConfig,
};
