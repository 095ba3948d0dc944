//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;

use gatehouse::config::Config;
use gatehouse::gateway::{proxy_router, GatewayState};
use gatehouse::plugins::GatewayPlugin;
use gatehouse::service::ServiceRegistry;

/// One request as observed by a mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path_and_query: String,
    pub user_header: Option<String>,
}

/// A recording upstream bound to an ephemeral port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Start a mock upstream that records every request and answers 200 with a
/// fixed body.
pub async fn start_mock_upstream(body: &'static str) -> MockUpstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let recorded = recorded.clone();
        async move {
            let path_and_query = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            recorded.lock().unwrap().push(RecordedRequest {
                method: request.method().to_string(),
                path_and_query,
                user_header: request
                    .headers()
                    .get("user")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
            });
            body
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, requests }
}

/// Serve a proxy surface over the given registry on an ephemeral port.
#[allow(dead_code)]
pub async fn start_gateway(
    registry: Arc<dyn ServiceRegistry>,
    plugins: Vec<Arc<dyn GatewayPlugin>>,
) -> SocketAddr {
    let state = GatewayState {
        registry,
        plugins: Arc::new(plugins),
        config: Arc::new(Config::default()),
    };
    let router = proxy_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

/// Serve the management API over the given registry on an ephemeral port.
#[allow(dead_code)]
pub async fn start_api(registry: Arc<dyn ServiceRegistry>) -> SocketAddr {
    let router = gatehouse::api::services_router(registry);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}
