//! Shared-secret basic authentication.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::auth::{AuthError, BasicAuthConfig, Claims, TokenValidator};

/// Validates `Authorization: Basic` credentials against a configured pair.
#[derive(Debug, Deserialize)]
pub struct BasicAuthValidator {
    username: String,
    password: String,
}

impl BasicAuthValidator {
    /// Resolve credentials from the config: a credentials file wins,
    /// otherwise literal values, otherwise the named environment variables.
    pub fn new(config: &BasicAuthConfig) -> Result<Self, AuthError> {
        if !config.credentials_file.is_empty() {
            let raw = std::fs::read_to_string(&config.credentials_file).map_err(|source| {
                AuthError::CredentialsFile {
                    path: config.credentials_file.clone(),
                    source,
                }
            })?;
            let validator: BasicAuthValidator = serde_yaml::from_str(&raw)?;
            return Ok(validator);
        }

        let username = if !config.username.is_empty() {
            config.username.clone()
        } else {
            std::env::var(&config.username_env).unwrap_or_default()
        };
        let password = if !config.password.is_empty() {
            config.password.clone()
        } else {
            std::env::var(&config.password_env).unwrap_or_default()
        };

        Ok(Self { username, password })
    }
}

/// Pull the username/password pair out of a `Basic` authorization header.
fn decode_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

impl TokenValidator for BasicAuthValidator {
    fn validate(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        let (username, password) = decode_basic(headers).ok_or(AuthError::MissingCredentials)?;

        if username != self.username || password != self.password {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(None)
    }
}
