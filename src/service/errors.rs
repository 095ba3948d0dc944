//! Registry error taxonomy.

use thiserror::Error;

use crate::load_balancer::PolicyError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service with name '{0}' already exists")]
    ServiceExists(String),

    #[error("service with name '{0}' not found")]
    ServiceNotFound(String),

    #[error("unsupported service type: {0}")]
    UnsupportedServiceType(String),

    #[error("invalid service definition: {0}")]
    InvalidService(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("bson serialization error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),
}
