//! Plugin contract for the request path.
//!
//! Plugins are constructed once at startup in configured order; the engine
//! calls `pre_request` before routing and `post_response` after the upstream
//! answers, in the same declared order for both phases. Hooks run
//! synchronously on the request task. A returned [`PluginError`] aborts the
//! request with the plugin's own status code.

use std::fmt;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use crate::config::Config;
use crate::service::ServiceRegistry;

/// Rejection raised by a plugin hook; carries the HTTP status to answer with.
#[derive(Debug, Clone)]
pub struct PluginError {
    pub status_code: StatusCode,
    pub message: String,
}

impl PluginError {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PluginError {}

/// Four-operation capability every plugin must satisfy.
pub trait GatewayPlugin: Send + Sync {
    /// Identifies the plugin in logs.
    fn name(&self) -> &str;

    /// Called before the request is matched and forwarded.
    fn pre_request(
        &self,
        request: &Request<Body>,
        registry: &dyn ServiceRegistry,
        config: &Config,
    ) -> Result<(), PluginError>;

    /// Called after the upstream responded, before the body is streamed back.
    fn post_response(
        &self,
        response: &reqwest::Response,
        registry: &dyn ServiceRegistry,
        config: &Config,
    ) -> Result<(), PluginError>;

    /// Called when the gateway shuts down.
    fn close(&self) -> Result<(), PluginError>;
}
