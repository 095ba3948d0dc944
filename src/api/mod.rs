//! Management REST surface over the service registry.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::service::ServiceRegistry;
use handlers::*;

/// State injected into the management handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<dyn ServiceRegistry>,
}

pub fn services_router(registry: Arc<dyn ServiceRegistry>) -> Router {
    Router::new()
        .route(
            "/api/services",
            get(get_services_handler).post(add_service_handler),
        )
        .route(
            "/api/services/{name}",
            put(update_service_handler).delete(remove_service_handler),
        )
        .route("/api/health", get(get_health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { registry })
}
