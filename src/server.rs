//! Server composition: the management API surface and the proxy surface,
//! each with optional TLS termination.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;

use crate::api;
use crate::config::{Config, SslConfig};
use crate::gateway::{self, GatewayState};
use crate::plugins::GatewayPlugin;
use crate::service::{self, ServiceRegistry};

/// The assembled gateway: registry, plugin chain and both listening surfaces.
pub struct Gatehouse {
    config: Arc<Config>,
    registry: Arc<dyn ServiceRegistry>,
    plugins: Arc<Vec<Arc<dyn GatewayPlugin>>>,
}

impl Gatehouse {
    /// Build the registry declared by the config and assemble the gateway.
    pub async fn new(
        config: Config,
        plugins: Vec<Arc<dyn GatewayPlugin>>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let registry = service::new_service_registry(&config)
            .await
            .context("failed to initialise service registry")?;

        if config.plugins.enabled && plugins.is_empty() {
            tracing::warn!(
                "plugin hooks enabled in config but no plugins registered; \
                 embed gatehouse as a library to register plugins"
            );
        }

        Ok(Self {
            config,
            registry,
            plugins: Arc::new(plugins),
        })
    }

    /// The registry backing this gateway, for embedding callers.
    pub fn registry(&self) -> Arc<dyn ServiceRegistry> {
        self.registry.clone()
    }

    /// Serve both surfaces until shutdown, then close the plugin chain.
    pub async fn run(self) -> anyhow::Result<()> {
        let api_addr: SocketAddr = self
            .config
            .api
            .addr
            .parse()
            .context("invalid api.addr in configuration")?;
        let gateway_addr: SocketAddr = self
            .config
            .gateway
            .addr
            .parse()
            .context("invalid gateway.addr in configuration")?;

        let api_router = api::services_router(self.registry.clone());
        let gateway_router = gateway::proxy_router(GatewayState {
            registry: self.registry.clone(),
            plugins: self.plugins.clone(),
            config: self.config.clone(),
        });

        let api_ssl = self.config.api.ssl.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_surface(api_addr, api_router, &api_ssl).await {
                tracing::error!(error = %err, "management api server failed");
            }
        });
        tracing::info!(
            addr = %api_addr,
            tls_enabled = self.config.api.ssl.enabled,
            "management api listening"
        );

        if self.config.gateway.ssl.enabled {
            tokio::spawn(redirect_server(gateway_addr));
        }

        tracing::info!(
            addr = %gateway_addr,
            tls_enabled = self.config.gateway.ssl.enabled,
            "gateway listening"
        );
        serve_surface(gateway_addr, gateway_router, &self.config.gateway.ssl).await?;

        for plugin in self.plugins.iter() {
            if let Err(err) = plugin.close() {
                tracing::warn!(plugin = %plugin.name(), error = %err, "plugin close failed");
            }
        }

        tracing::info!("shutdown complete");
        Ok(())
    }
}

async fn serve_surface(addr: SocketAddr, router: Router, ssl: &SslConfig) -> anyhow::Result<()> {
    if ssl.enabled {
        let tls = RustlsConfig::from_pem_file(&ssl.cert, &ssl.key)
            .await
            .context("failed to load certificate")?;
        axum_server::bind_rustls(addr, tls)
            .serve(router.into_make_service())
            .await?;
    } else {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }
    Ok(())
}

/// Plain-HTTP listener that bounces clients to the TLS surface.
async fn redirect_server(tls_addr: SocketAddr) {
    let router = Router::new().fallback(move |request: Request<Body>| async move {
        redirect_to_https(request, tls_addr)
    });

    match TcpListener::bind("0.0.0.0:80").await {
        Ok(listener) => {
            tracing::info!("http redirect server listening on 0.0.0.0:80");
            if let Err(err) = axum::serve(listener, router).await {
                tracing::warn!(error = %err, "http redirect server failed");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not bind http redirect server");
        }
    }
}

fn redirect_to_https(request: Request<Body>, tls_addr: SocketAddr) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_string())
        .unwrap_or_default();

    let target = if tls_addr.port() == 443 {
        format!("https://{}{}", host, request.uri().path())
    } else {
        format!("https://{}:{}{}", host, tls_addr.port(), request.uri().path())
    };

    Redirect::permanent(&target).into_response()
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
