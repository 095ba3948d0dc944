//! The hot path: one function per request, from plugin hooks to body copy.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::gateway::GatewayState;
use crate::load_balancer::LoadBalancer;
use crate::service::BackendService;

/// Completion accounting for a chosen target.
///
/// `done` must fire exactly once per successful `choose_target`, on every
/// exit path after the choice — including aborts before the forward. The
/// guard fires on drop unless `complete` already did.
struct DoneGuard<'a> {
    balancer: &'a dyn LoadBalancer,
    target: &'a str,
    fired: bool,
}

impl<'a> DoneGuard<'a> {
    fn new(balancer: &'a dyn LoadBalancer, target: &'a str) -> Self {
        Self {
            balancer,
            target,
            fired: false,
        }
    }

    fn complete(mut self) {
        self.balancer.done(self.target);
        self.fired = true;
    }
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        if !self.fired {
            self.balancer.done(self.target);
        }
    }
}

/// Main proxy handler.
pub async fn proxy_handler(
    State(state): State<GatewayState>,
    request: Request<Body>,
) -> Response {
    // the management prefix is reserved even when surfaces share a port
    if request.uri().path().starts_with("/api/") {
        return error_response(StatusCode::NOT_FOUND, "404 page not found");
    }

    for plugin in state.plugins.iter() {
        if let Err(err) = plugin.pre_request(&request, &*state.registry, &state.config) {
            tracing::error!(plugin = %plugin.name(), error = %err, "plugin rejected request");
            return error_response(err.status_code, err.message);
        }
    }

    let host = request_host(&request);
    let path = request.uri().path().to_string();

    let Some(backend) = state.registry.find_service(&host, &path).await else {
        tracing::debug!(host = %host, path = %path, "no backend service matched");
        return error_response(StatusCode::NOT_FOUND, "404 page not found");
    };

    let upstream = backend
        .load_balancer()
        .choose_target(&backend.upstream_targets);
    let accounting = DoneGuard::new(backend.load_balancer(), &upstream);

    let target_url = match compose_target_url(&backend, &upstream, &path, request.uri().query()) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(backend = %backend.name, error = %err, "failed to assemble target url");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let mut headers = request.headers().clone();
    // the transport derives Host from the target URL and reframes the
    // streamed body itself
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);

    if let Some(auth_config) = backend.auth.as_ref() {
        let validator = match backend.token_validator(auth_config).await {
            Ok(validator) => validator,
            Err(err) => {
                tracing::warn!(backend = %backend.name, error = %err, "token validator unavailable");
                return error_response(StatusCode::UNAUTHORIZED, err.to_string());
            }
        };

        match validator.validate(request.headers()) {
            Ok(Some(claims)) => {
                let serialized = match serde_json::to_string(&claims) {
                    Ok(serialized) => serialized,
                    Err(err) => {
                        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                    }
                };
                let name = match HeaderName::from_bytes(backend.user_data_header().as_bytes()) {
                    Ok(name) => name,
                    Err(err) => {
                        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                    }
                };
                let value = match HeaderValue::from_str(&serialized) {
                    Ok(value) => value,
                    Err(err) => {
                        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                    }
                };
                headers.insert(name, value);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(backend = %backend.name, error = %err, "authentication rejected");
                return error_response(StatusCode::UNAUTHORIZED, err.to_string());
            }
        }
    }

    // strip the inbound hop's forwarding chain to prevent spoofing
    headers.remove("x-forwarded-for");

    let method = request.method().clone();
    tracing::info!(
        backend = %backend.name,
        upstream = %upstream,
        method = %method,
        path = %target_url.path(),
        "forwarding request"
    );

    // only attach a streamed body when the inbound request framed one;
    // otherwise body-less methods would go out chunked
    let has_body = request.headers().contains_key(header::TRANSFER_ENCODING)
        || request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v != "0");

    let mut outbound = backend
        .client()
        .request(method, target_url)
        .headers(headers);
    if has_body {
        let body_stream = request.into_body().into_data_stream();
        outbound = outbound.body(reqwest::Body::wrap_stream(body_stream));
    }
    let result = outbound.send().await;

    accounting.complete();

    let upstream_response = match result {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(backend = %backend.name, upstream = %upstream, error = %err, "upstream request failed");
            return error_response(StatusCode::BAD_GATEWAY, err.to_string());
        }
    };

    for plugin in state.plugins.iter() {
        if let Err(err) = plugin.post_response(&upstream_response, &*state.registry, &state.config)
        {
            tracing::error!(plugin = %plugin.name(), error = %err, "plugin rejected response");
            return error_response(err.status_code, err.message);
        }
    }

    tracing::debug!(
        backend = %backend.name,
        upstream = %upstream,
        status = %upstream_response.status(),
        "response received"
    );

    let mut response = Response::new(Body::empty());
    *response.status_mut() = upstream_response.status();
    for (name, value) in upstream_response.headers() {
        response.headers_mut().append(name.clone(), value.clone());
    }
    *response.body_mut() = Body::from_stream(upstream_response.bytes_stream());

    response
}

/// Host for routing: the URI authority when present (HTTP/2), the Host
/// header otherwise.
fn request_host(request: &Request<Body>) -> String {
    if let Some(authority) = request.uri().authority() {
        return authority.to_string();
    }

    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Assemble the upstream URL: optional strip-path, optional regex rewrite,
/// query re-attached when non-empty. Parsed after assembly so a malformed
/// result fails closed instead of reaching the transport.
fn compose_target_url(
    backend: &BackendService,
    upstream: &str,
    request_path: &str,
    query: Option<&str>,
) -> Result<Url, url::ParseError> {
    let mut path = if backend.strip_path {
        request_path
            .strip_prefix(backend.path.as_str())
            .unwrap_or(request_path)
            .to_string()
    } else {
        request_path.to_string()
    };

    if let Some(rewrite) = backend.rewrite() {
        path = rewrite
            .replace_all(&path, backend.rewrite_replace.as_str())
            .into_owned();
    }

    let mut assembled = format!("{upstream}{path}");
    if let Some(query) = query {
        if !query.is_empty() {
            assembled.push('?');
            assembled.push_str(query);
        }
    }

    Url::parse(&assembled)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}
