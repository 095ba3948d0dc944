//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Backend matched by the routing trie
//!     → backend's LoadBalancer instance (built once at init)
//!     → choose_target(upstream_targets) picks one endpoint
//!     → request forwarded
//!     → done(target) releases the in-flight slot
//! ```
//!
//! # Design Decisions
//! - One selector instance per backend; no contention across backends
//! - Selection is O(1) for the cursor policies, O(log n) for the heap policies
//! - done() accounts for completion regardless of the forward's outcome

pub mod least_conn;
pub mod random;
pub mod round_robin;
pub mod weighted_round_robin;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use least_conn::LeastConnPolicy;
pub use random::RandomPolicy;
pub use round_robin::RoundRobinPolicy;
pub use weighted_round_robin::WeightedRoundRobinPolicy;

/// Policy name constants as they appear in persisted descriptors.
pub const ROUND_ROBIN: &str = "round_robin";
pub const WEIGHTED_ROUND_ROBIN: &str = "weighted_round_robin";
pub const RANDOM: &str = "random";
pub const LEAST_CONN: &str = "least_conn";
pub const WEIGHTED_LEAST_CONN: &str = "weighted_least_conn";

/// Target selection contract shared by every policy.
///
/// `choose_target` must be safe under concurrent callers and must return a
/// target whenever `targets` is non-empty. `done` must be called exactly once
/// per prior `choose_target` after the upstream request finishes; it marks the
/// concurrency slot free, not success.
pub trait LoadBalancer: Send + Sync {
    fn choose_target(&self, targets: &[String]) -> String;

    fn done(&self, _target: &str) {}
}

/// Load-balancer policy as declared on a backend descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerPolicy {
    #[serde(rename = "type")]
    pub policy_type: String,

    pub options: PolicyOptions,
}

impl Default for LoadBalancerPolicy {
    fn default() -> Self {
        Self {
            policy_type: ROUND_ROBIN.to_string(),
            options: PolicyOptions::default(),
        }
    }
}

/// Policy tuning knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Per-target weights for the weighted policies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<u32>>,
}

/// Validation failures for a declared policy.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("unknown load-balancer policy: {0}")]
    UnknownPolicy(String),

    #[error("at least one upstream target is required")]
    NoTargets,

    #[error("mismatched lengths of weights and targets")]
    WeightCount,

    #[error("weights must be greater than zero")]
    NonPositiveWeight,
}

impl LoadBalancerPolicy {
    /// Check the policy against the target list it will select from.
    pub fn validate(&self, targets: &[String]) -> Result<(), PolicyError> {
        if targets.is_empty() {
            return Err(PolicyError::NoTargets);
        }

        match self.policy_type.as_str() {
            ROUND_ROBIN | RANDOM | LEAST_CONN => Ok(()),
            WEIGHTED_ROUND_ROBIN | WEIGHTED_LEAST_CONN => {
                let weights = self
                    .options
                    .weights
                    .as_deref()
                    .ok_or(PolicyError::WeightCount)?;
                if weights.len() != targets.len() {
                    return Err(PolicyError::WeightCount);
                }
                if weights.iter().any(|w| *w == 0) {
                    return Err(PolicyError::NonPositiveWeight);
                }
                Ok(())
            }
            other => Err(PolicyError::UnknownPolicy(other.to_string())),
        }
    }

    /// Build the selector instance for this policy.
    pub fn build(&self, targets: &[String]) -> Result<Arc<dyn LoadBalancer>, PolicyError> {
        self.validate(targets)?;

        let selector: Arc<dyn LoadBalancer> = match self.policy_type.as_str() {
            ROUND_ROBIN => Arc::new(RoundRobinPolicy::new()),
            RANDOM => Arc::new(RandomPolicy::new()),
            WEIGHTED_ROUND_ROBIN => {
                let weights = self.options.weights.clone().unwrap_or_default();
                Arc::new(WeightedRoundRobinPolicy::new(weights))
            }
            LEAST_CONN => Arc::new(LeastConnPolicy::new(targets, None)),
            WEIGHTED_LEAST_CONN => {
                Arc::new(LeastConnPolicy::new(targets, self.options.weights.as_deref()))
            }
            // validate() has already rejected everything else
            other => return Err(PolicyError::UnknownPolicy(other.to_string())),
        };

        Ok(selector)
    }
}
