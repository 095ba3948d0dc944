//! Request-processing engine.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → pre-request plugin hooks (declared order)
//!     → routing trie lookup (read lock held for the walk)
//!     → load balancer picks one upstream target
//!     → URL composition (strip-path, rewrite, query)
//!     → token validation + claims header
//!     → streamed forward through the backend's pooled client
//!     → done() accounting, post-response hooks
//!     → headers/status/body copied back to the client
//! ```

pub mod engine;

use std::sync::Arc;

use axum::routing::any;
use axum::Router;

use crate::config::Config;
use crate::plugins::GatewayPlugin;
use crate::service::ServiceRegistry;

/// State injected into the proxy handler.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<dyn ServiceRegistry>,
    pub plugins: Arc<Vec<Arc<dyn GatewayPlugin>>>,
    pub config: Arc<Config>,
}

/// The proxy surface: any method, any path.
pub fn proxy_router(state: GatewayState) -> Router {
    Router::new()
        .route("/{*path}", any(engine::proxy_handler))
        .route("/", any(engine::proxy_handler))
        .with_state(state)
}
