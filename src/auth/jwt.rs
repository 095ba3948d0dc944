//! Signed-token validation against a remote key set.

use axum::http::{header, HeaderMap};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use crate::auth::{AuthError, Claims, JwtConfig, TokenValidator};

const BEARER: &str = "bearer";

/// Claim names owned by the token layer; everything else is private data
/// handed to the upstream.
const REGISTERED_CLAIMS: [&str; 7] = ["iss", "sub", "aud", "exp", "nbf", "iat", "jti"];

/// Validates `Authorization: Bearer` tokens against a JWKS fetched once at
/// construction.
#[derive(Debug)]
pub struct JwtValidator {
    issuer: String,
    audience: String,
    keys: JwkSet,
}

impl JwtValidator {
    /// Fetch the key set and build the validator. An empty `keysUrl` leaves
    /// the key set empty, which is acceptable for tests.
    pub async fn new(config: &JwtConfig) -> Result<Self, AuthError> {
        let keys = if config.keys_url.is_empty() {
            JwkSet { keys: Vec::new() }
        } else {
            fetch_key_set(&config.keys_url).await?
        };

        Ok(Self::with_key_set(&config.issuer, &config.audience, keys))
    }

    /// Build a validator around an already-loaded key set.
    pub fn with_key_set(issuer: &str, audience: &str, keys: JwkSet) -> Self {
        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            keys,
        }
    }
}

async fn fetch_key_set(url: &str) -> Result<JwkSet, AuthError> {
    let response = reqwest::get(url).await.map_err(|source| AuthError::KeySet {
        url: url.to_string(),
        source,
    })?;

    response
        .json::<JwkSet>()
        .await
        .map_err(|source| AuthError::KeySet {
            url: url.to_string(),
            source,
        })
}

impl TokenValidator for JwtValidator {
    fn validate(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        let raw = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if raw.is_empty() {
            return Err(AuthError::MissingAuthHeader);
        }

        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(AuthError::BadFormatAuthHeader);
        }
        if !fields[0].eq_ignore_ascii_case(BEARER) {
            return Err(AuthError::UnsupportedAuthType);
        }
        let token = fields[fields.len() - 1];

        let header = decode_header(token)?;
        let jwk = match &header.kid {
            Some(kid) => self.keys.find(kid),
            None => self.keys.keys.first(),
        }
        .ok_or(AuthError::UnknownKey)?;

        let key = DecodingKey::from_jwk(jwk)?;
        // infer the algorithm from the matching key, falling back to the header
        let algorithm = jwk
            .common
            .key_algorithm
            .and_then(|a| a.to_string().parse::<Algorithm>().ok())
            .unwrap_or(header.alg);

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        if self.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[self.audience.as_str()]);
        }
        if !self.issuer.is_empty() {
            validation.set_issuer(&[self.issuer.as_str()]);
        }

        let data = decode::<Claims>(token, &key, &validation)?;

        let mut claims = data.claims;
        for name in REGISTERED_CLAIMS {
            claims.remove(name);
        }

        Ok(Some(claims))
    }
}
