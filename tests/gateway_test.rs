//! End-to-end scenarios for the request-processing engine.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use gatehouse::config::Config;
use gatehouse::load_balancer::{LoadBalancerPolicy, PolicyOptions, WEIGHTED_ROUND_ROBIN};
use gatehouse::plugins::{GatewayPlugin, PluginError};
use gatehouse::service::{BackendService, MemoryServiceRegistry, ServiceRegistry};

fn descriptor(name: &str, domain: &str, path: &str, targets: Vec<String>) -> BackendService {
    BackendService {
        name: name.to_string(),
        domain: domain.to_string(),
        path: path.to_string(),
        upstream_targets: targets,
        ..BackendService::default()
    }
}

async fn registry_with(services: Vec<BackendService>) -> Arc<dyn ServiceRegistry> {
    let registry = MemoryServiceRegistry::new();
    for service in services {
        registry.add_service(service).await.unwrap();
    }
    Arc::new(registry)
}

#[tokio::test]
async fn test_plain_forward_strips_path_and_keeps_query() {
    let upstream = common::start_mock_upstream("hello from upstream").await;

    let mut service = descriptor("t", "test.com", "/api", vec![upstream.url()]);
    service.strip_path = true;
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let client = reqwest::Client::builder()
        .resolve("test.com", proxy)
        .build()
        .unwrap();

    let response = client
        .get(format!("http://test.com:{}/api/anything?test", proxy.port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "hello from upstream");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path_and_query, "/anything?test");
}

#[tokio::test]
async fn test_unmatched_route_is_404_without_upstream_contact() {
    let upstream = common::start_mock_upstream("unreachable").await;

    let mut service = descriptor("t", "test.com", "/api", vec![upstream.url()]);
    service.strip_path = true;
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let client = reqwest::Client::builder()
        .resolve("test.com", proxy)
        .build()
        .unwrap();

    let response = client
        .get(format!("http://test.com:{}/notfound", proxy.port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn test_unreachable_upstream_is_502() {
    // nothing listens on port 1
    let service = descriptor("down", "", "/api", vec!["http://127.0.0.1:1".to_string()]);
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let response = reqwest::get(format!("http://{proxy}/api/anything"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_regex_rewrite() {
    let upstream = common::start_mock_upstream("rewritten").await;

    let mut service = descriptor("rw", "test.com", "/", vec![upstream.url()]);
    service.rewrite_match = "/api/old/(.*)".to_string();
    service.rewrite_replace = "/api/new/$1".to_string();
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let client = reqwest::Client::builder()
        .resolve("test.com", proxy)
        .build()
        .unwrap();

    let response = client
        .get(format!(
            "http://test.com:{}/api/old/anything?test",
            proxy.port()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path_and_query, "/api/new/anything?test");
}

#[tokio::test]
async fn test_round_robin_rotates_over_three_upstreams() {
    let first = common::start_mock_upstream("one").await;
    let second = common::start_mock_upstream("two").await;
    let third = common::start_mock_upstream("three").await;

    let mut service = descriptor(
        "rr",
        "localhost",
        "/api",
        vec![first.url(), second.url(), third.url()],
    );
    service.strip_path = true;
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let client = reqwest::Client::new();
    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = client
            .get(format!("http://localhost:{}/api/x", proxy.port()))
            .send()
            .await
            .unwrap();
        bodies.push(response.text().await.unwrap());
    }

    assert_eq!(bodies, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_bad_bearer_token_is_401_without_upstream_contact() {
    let upstream = common::start_mock_upstream("protected").await;

    let mut service = descriptor("auth", "", "/api", vec![upstream.url()]);
    service.auth = Some(gatehouse::auth::AuthConfig {
        auth_type: "jwt".to_string(),
        ..gatehouse::auth::AuthConfig::default()
    });
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{proxy}/api/secret"))
        .header("authorization", "Bearer forged.token.value")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn test_missing_auth_header_is_401() {
    let upstream = common::start_mock_upstream("protected").await;

    let mut service = descriptor("auth", "", "/api", vec![upstream.url()]);
    service.auth = Some(gatehouse::auth::AuthConfig {
        auth_type: "jwt".to_string(),
        ..gatehouse::auth::AuthConfig::default()
    });
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let response = reqwest::get(format!("http://{proxy}/api/secret"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn test_valid_token_forwards_claims_header() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    let upstream = common::start_mock_upstream("ok").await;

    // key set served the way a real issuer would
    let secret = b"integration-secret";
    let jwks = serde_json::json!({
        "keys": [{
            "kty": "oct",
            "kid": "k1",
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(secret),
        }]
    });
    let jwks_router = axum::Router::new().route(
        "/jwks",
        axum::routing::get(move || {
            let jwks = jwks.clone();
            async move { axum::Json(jwks) }
        }),
    );
    let jwks_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let jwks_addr = jwks_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(jwks_listener, jwks_router).await.unwrap();
    });

    let mut service = descriptor("auth", "", "/api", vec![upstream.url()]);
    service.strip_path = true;
    service.auth = Some(gatehouse::auth::AuthConfig {
        auth_type: "jwt".to_string(),
        jwt: Some(gatehouse::auth::JwtConfig {
            keys_url: format!("http://{jwks_addr}/jwks"),
            ..gatehouse::auth::JwtConfig::default()
        }),
        ..gatehouse::auth::AuthConfig::default()
    });
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let header = Header {
        kid: Some("k1".to_string()),
        ..Header::new(Algorithm::HS256)
    };
    let token = encode(
        &header,
        &serde_json::json!({"exp": 4102444800u64, "role": "admin"}),
        &EncodingKey::from_secret(secret),
    )
    .unwrap();

    let response = reqwest::Client::new()
        .get(format!("http://{proxy}/api/secret"))
        .header("authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    // private claims ride to the upstream on the default header
    let user_header = requests[0].user_header.as_deref().unwrap();
    assert_eq!(user_header, r#"{"role":"admin"}"#);
}

#[tokio::test]
async fn test_weighted_round_robin_follows_weights() {
    let light = common::start_mock_upstream("light").await;
    let heavy = common::start_mock_upstream("heavy").await;

    let mut service = descriptor("w", "", "/api", vec![light.url(), heavy.url()]);
    service.load_balancer_policy = LoadBalancerPolicy {
        policy_type: WEIGHTED_ROUND_ROBIN.to_string(),
        options: PolicyOptions {
            weights: Some(vec![1, 2]),
        },
    };
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let client = reqwest::Client::new();
    let mut bodies = Vec::new();
    for _ in 0..6 {
        let response = client
            .get(format!("http://{proxy}/api/x"))
            .send()
            .await
            .unwrap();
        bodies.push(response.text().await.unwrap());
    }

    // two full cycles of length Σw = 3
    assert_eq!(
        bodies,
        vec!["light", "heavy", "heavy", "light", "heavy", "heavy"]
    );
}

struct RejectingPlugin;

impl GatewayPlugin for RejectingPlugin {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn pre_request(
        &self,
        _request: &Request<Body>,
        _registry: &dyn ServiceRegistry,
        _config: &Config,
    ) -> Result<(), PluginError> {
        Err(PluginError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "slow down",
        ))
    }

    fn post_response(
        &self,
        _response: &reqwest::Response,
        _registry: &dyn ServiceRegistry,
        _config: &Config,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn close(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_plugin_rejection_aborts_before_routing() {
    let upstream = common::start_mock_upstream("never").await;

    let mut service = descriptor("t", "", "/api", vec![upstream.url()]);
    service.strip_path = true;
    let registry = registry_with(vec![service]).await;
    let proxy =
        common::start_gateway(registry, vec![Arc::new(RejectingPlugin) as _]).await;

    let response = reqwest::get(format!("http://{proxy}/api/x")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.text().await.unwrap(), "slow down");
    assert_eq!(upstream.request_count(), 0);
}

struct PostRejectingPlugin;

impl GatewayPlugin for PostRejectingPlugin {
    fn name(&self) -> &str {
        "post-rejecting"
    }

    fn pre_request(
        &self,
        _request: &Request<Body>,
        _registry: &dyn ServiceRegistry,
        _config: &Config,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn post_response(
        &self,
        response: &reqwest::Response,
        _registry: &dyn ServiceRegistry,
        _config: &Config,
    ) -> Result<(), PluginError> {
        if response.status().is_success() {
            Err(PluginError::new(StatusCode::BAD_GATEWAY, "vetoed"))
        } else {
            Ok(())
        }
    }

    fn close(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_post_response_rejection_replaces_upstream_answer() {
    let upstream = common::start_mock_upstream("body").await;

    let mut service = descriptor("t", "", "/api", vec![upstream.url()]);
    service.strip_path = true;
    let registry = registry_with(vec![service]).await;
    let proxy =
        common::start_gateway(registry, vec![Arc::new(PostRejectingPlugin) as _]).await;

    let response = reqwest::get(format!("http://{proxy}/api/x")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.text().await.unwrap(), "vetoed");
    // the upstream was contacted; only the copy-back was vetoed
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn test_api_prefix_reserved_on_proxy_surface() {
    let upstream = common::start_mock_upstream("never").await;

    // even a backend rooted at / must not capture the management prefix
    let service = descriptor("root", "", "/", vec![upstream.url()]);
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let response = reqwest::get(format!("http://{proxy}/api/services"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn test_post_body_streams_through() {
    let upstream = common::start_mock_upstream("accepted").await;

    let mut service = descriptor("t", "", "/api", vec![upstream.url()]);
    service.strip_path = true;
    let registry = registry_with(vec![service]).await;
    let proxy = common::start_gateway(registry, Vec::new()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{proxy}/api/items"))
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path_and_query, "/items");
}
