//! Backend service descriptor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::auth::{self, AuthConfig, TokenValidator};
use crate::load_balancer::{LoadBalancer, LoadBalancerPolicy};
use crate::service::RegistryError;

/// Transport timeout applied when a descriptor does not declare one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Header used for serialized claims when the auth block names none.
pub const DEFAULT_USER_DATA_HEADER: &str = "user";

/// One routable backend. The serialized field set is the registry's
/// compatibility surface; everything derived lives in [`RuntimeState`] and is
/// rebuilt by [`BackendService::init`] on every registry mutation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendService {
    /// Unique name across the registry.
    pub name: String,

    /// `http` or `https`; defaulted to `http` at validation.
    pub scheme: String,

    /// Absolute endpoint URLs requests are balanced over.
    pub upstream_targets: Vec<String>,

    /// Routing prefix, beginning with `/`.
    pub path: String,

    /// Host to match; empty matches any host.
    pub domain: String,

    /// Absolute URL probed on demand by the health endpoint.
    pub health_check: String,

    /// Reserved; not consumed on the request path.
    pub retry_attempts: u32,

    /// Transport timeout in seconds (connection + TLS handshake).
    pub timeout: u64,

    /// Connection-pool size for the backend's client.
    pub max_idle_conns: usize,

    /// Idle-connection lifetime in seconds; 0 keeps connections around.
    pub max_idle_time: u64,

    /// Trim `path` from the forwarded URL.
    pub strip_path: bool,

    /// Regex applied to the forwarded path; active only together with
    /// `rewrite_replace`.
    pub rewrite_match: String,

    pub rewrite_replace: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    pub load_balancer_policy: LoadBalancerPolicy,

    #[serde(skip)]
    pub runtime: RuntimeState,
}

/// Derived state owned by the descriptor, never serialized.
#[derive(Default)]
struct RuntimeState {
    rewrite: Option<Regex>,
    balancer: Option<Arc<dyn LoadBalancer>>,
    client: Option<reqwest::Client>,
    validator: OnceCell<Arc<dyn TokenValidator>>,
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("rewrite", &self.rewrite.as_ref().map(Regex::as_str))
            .field("initialised", &self.balancer.is_some())
            .finish_non_exhaustive()
    }
}

impl Clone for RuntimeState {
    fn clone(&self) -> Self {
        Self {
            rewrite: self.rewrite.clone(),
            balancer: self.balancer.clone(),
            client: self.client.clone(),
            validator: OnceCell::new_with(self.validator.get().cloned()),
        }
    }
}

impl BackendService {
    /// Build the derived state: compiled rewrite pattern, load-balancer
    /// instance and pooled client. Runs under the registry write lock before
    /// the descriptor becomes visible to lookups.
    pub fn init(&mut self) -> Result<(), RegistryError> {
        if self.upstream_targets.is_empty() {
            return Err(RegistryError::InvalidService(
                "at least one upstream target is required".to_string(),
            ));
        }

        self.runtime.rewrite =
            if !self.rewrite_match.is_empty() && !self.rewrite_replace.is_empty() {
                let pattern = Regex::new(&self.rewrite_match).map_err(|e| {
                    RegistryError::InvalidService(format!(
                        "invalid rewrite pattern '{}': {}",
                        self.rewrite_match, e
                    ))
                })?;
                Some(pattern)
            } else {
                None
            };

        self.runtime.balancer = Some(
            self.load_balancer_policy
                .build(&self.upstream_targets)?,
        );

        self.runtime.client = Some(self.build_client()?);

        Ok(())
    }

    fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let timeout = if self.timeout == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            self.timeout
        };

        let mut builder =
            reqwest::Client::builder().connect_timeout(Duration::from_secs(timeout));

        if self.max_idle_conns > 0 {
            builder = builder.pool_max_idle_per_host(self.max_idle_conns);
        }
        builder = if self.max_idle_time > 0 {
            builder.pool_idle_timeout(Duration::from_secs(self.max_idle_time))
        } else {
            builder.pool_idle_timeout(None)
        };

        builder.build()
    }

    /// The backend's selector. Present on every descriptor the trie can
    /// return; `init` runs before insertion.
    pub fn load_balancer(&self) -> &dyn LoadBalancer {
        self.runtime
            .balancer
            .as_deref()
            .expect("backend not initialised")
    }

    /// The backend's pooled client; same initialisation invariant as
    /// [`Self::load_balancer`].
    pub fn client(&self) -> &reqwest::Client {
        self.runtime
            .client
            .as_ref()
            .expect("backend not initialised")
    }

    pub fn rewrite(&self) -> Option<&Regex> {
        self.runtime.rewrite.as_ref()
    }

    /// The validator for this backend's auth block, created on first use and
    /// cached for the descriptor's lifetime.
    pub async fn token_validator(
        &self,
        config: &AuthConfig,
    ) -> Result<&Arc<dyn TokenValidator>, auth::AuthError> {
        self.runtime
            .validator
            .get_or_try_init(|| auth::token_validator(config))
            .await
    }

    pub fn user_data_header(&self) -> &str {
        match &self.auth {
            Some(auth) if !auth.user_data_header.is_empty() => &auth.user_data_header,
            _ => DEFAULT_USER_DATA_HEADER,
        }
    }

    /// Probe the backend's health-check URL; 2xx counts as healthy.
    pub async fn check_health(&self) -> bool {
        if self.health_check.is_empty() {
            return false;
        }

        match self.client().get(&self.health_check).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                if !healthy {
                    tracing::warn!(
                        backend = %self.name,
                        status = %response.status(),
                        "health check failed"
                    );
                }
                healthy
            }
            Err(err) => {
                tracing::warn!(backend = %self.name, error = %err, "health check unreachable");
                false
            }
        }
    }
}
