use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use url::Url;

use crate::api::ApiState;
use crate::load_balancer::ROUND_ROBIN;
use crate::service::backend::DEFAULT_TIMEOUT_SECS;
use crate::service::{BackendService, RegistryError};

pub async fn get_services_handler(State(state): State<ApiState>) -> Json<Vec<Arc<BackendService>>> {
    Json(state.registry.get_services().await)
}

pub async fn add_service_handler(
    State(state): State<ApiState>,
    Json(mut service): Json<BackendService>,
) -> Response {
    if let Err(err) = validate_service(&mut service) {
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    match state.registry.add_service(service.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(service)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

pub async fn update_service_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(mut service): Json<BackendService>,
) -> Response {
    service.name = name;

    if let Err(err) = validate_service(&mut service) {
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    match state.registry.update_service(service.clone()).await {
        Ok(()) => (StatusCode::OK, Json(service)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

pub async fn remove_service_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    match state.registry.remove_service(&name).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": format!("Removed service {name}")})),
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

pub async fn get_health_handler(State(state): State<ApiState>) -> Json<BTreeMap<String, bool>> {
    let mut health = BTreeMap::new();
    for service in state.registry.get_services().await {
        health.insert(service.name.clone(), service.check_health().await);
    }
    Json(health)
}

/// Check required fields and fill the documented defaults before the
/// descriptor reaches the registry.
pub(crate) fn validate_service(service: &mut BackendService) -> Result<(), RegistryError> {
    if service.name.is_empty() {
        return Err(RegistryError::InvalidService(
            "name is a required field".to_string(),
        ));
    }

    if service.path.is_empty() || !service.path.starts_with('/') {
        return Err(RegistryError::InvalidService(
            "path must be a non-empty prefix beginning with '/'".to_string(),
        ));
    }

    if service.upstream_targets.is_empty() {
        return Err(RegistryError::InvalidService(
            "at least one upstream target is required".to_string(),
        ));
    }
    for target in &service.upstream_targets {
        // absolute URLs only; a relative target fails to parse without a base
        Url::parse(target).map_err(|_| {
            RegistryError::InvalidService(format!(
                "upstream target {target} must be an absolute URL with a scheme"
            ))
        })?;
    }

    if service.scheme.is_empty() {
        service.scheme = "http".to_string();
    }
    if service.timeout == 0 {
        service.timeout = DEFAULT_TIMEOUT_SECS;
    }
    if service.load_balancer_policy.policy_type.is_empty() {
        service.load_balancer_policy.policy_type = ROUND_ROBIN.to_string();
    }

    service
        .load_balancer_policy
        .validate(&service.upstream_targets)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{PolicyOptions, WEIGHTED_ROUND_ROBIN};

    fn descriptor() -> BackendService {
        BackendService {
            name: "svc".to_string(),
            path: "/api".to_string(),
            upstream_targets: vec!["http://localhost:9000".to_string()],
            ..BackendService::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let mut service = descriptor();
        validate_service(&mut service).unwrap();

        assert_eq!(service.scheme, "http");
        assert_eq!(service.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(service.load_balancer_policy.policy_type, ROUND_ROBIN);
    }

    #[test]
    fn test_missing_path_rejected() {
        let mut service = descriptor();
        service.path = String::new();
        assert!(validate_service(&mut service).is_err());

        service.path = "api".to_string();
        assert!(validate_service(&mut service).is_err());
    }

    #[test]
    fn test_empty_targets_rejected() {
        let mut service = descriptor();
        service.upstream_targets.clear();
        assert!(validate_service(&mut service).is_err());
    }

    #[test]
    fn test_relative_target_rejected() {
        let mut service = descriptor();
        service.upstream_targets = vec!["/not-absolute".to_string()];
        assert!(validate_service(&mut service).is_err());
    }

    #[test]
    fn test_weighted_policy_checked() {
        let mut service = descriptor();
        service.load_balancer_policy.policy_type = WEIGHTED_ROUND_ROBIN.to_string();
        service.load_balancer_policy.options = PolicyOptions {
            weights: Some(vec![1, 2]),
        };
        assert!(validate_service(&mut service).is_err());

        service.load_balancer_policy.options = PolicyOptions {
            weights: Some(vec![3]),
        };
        assert!(validate_service(&mut service).is_ok());
    }
}
