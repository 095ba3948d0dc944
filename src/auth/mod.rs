//! Token validation for backends that declare an `auth` block.
//!
//! Two validator kinds sit behind one contract: signed tokens checked against
//! a fetched key set, and shared-secret basic credentials. Validators are
//! built lazily on a backend's first authenticated request and cached on the
//! descriptor; after construction they are immutable and shared.

pub mod basic;
pub mod jwt;

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use basic::BasicAuthValidator;
pub use jwt::JwtValidator;

/// Claims extracted from a validated token, keyed deterministically.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Validation failures surfaced as 401 on the request path.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuthHeader,

    #[error("invalid format for authorization header")]
    BadFormatAuthHeader,

    #[error("unsupported authorization type, expected 'Bearer'")]
    UnsupportedAuthType,

    #[error("no suitable key found in key set")]
    UnknownKey,

    #[error("{0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("failed to load key set from {url}: {source}")]
    KeySet {
        url: String,
        source: reqwest::Error,
    },

    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("failed to read credentials file {path}: {source}")]
    CredentialsFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse credentials file: {0}")]
    CredentialsParse(#[from] serde_yaml::Error),

    #[error("unrecognized auth type: {0}")]
    UnknownAuthType(String),
}

/// Single-operation validation contract.
///
/// Validation is a pure function of the request headers and the validator's
/// configuration; `None` claims mean authenticated without user data.
pub trait TokenValidator: Send + Sync + std::fmt::Debug {
    fn validate(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError>;
}

/// Authentication block on a backend descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    /// Validator kind: `jwt` or `basic`.
    #[serde(rename = "type")]
    pub auth_type: String,

    /// Header carrying the serialized claims towards the upstream.
    /// Empty means the default (`user`).
    pub user_data_header: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicAuthConfig>,
}

/// Signed-token validator settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtConfig {
    /// JWKS endpoint; empty skips the fetch (key set stays empty).
    pub keys_url: String,
    pub issuer: String,
    pub audience: String,
}

/// Shared-secret validator settings. One of literal credentials,
/// environment-variable names, or a credentials file path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
    pub username_env: String,
    pub password_env: String,
    pub credentials_file: String,
}

/// Build the validator declared by an auth block.
pub async fn token_validator(config: &AuthConfig) -> Result<Arc<dyn TokenValidator>, AuthError> {
    match config.auth_type.as_str() {
        "jwt" => {
            let jwt_config = config.jwt.clone().unwrap_or_default();
            Ok(Arc::new(JwtValidator::new(&jwt_config).await?))
        }
        "basic" => {
            let basic_config = config.basic.clone().unwrap_or_default();
            Ok(Arc::new(BasicAuthValidator::new(&basic_config)?))
        }
        other => Err(AuthError::UnknownAuthType(other.to_string())),
    }
}
