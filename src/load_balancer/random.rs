//! Random load balancing.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::LoadBalancer;

/// Uniform random selector.
///
/// The RNG is seeded once at construction and reused for every pick.
pub struct RandomPolicy {
    rng: Mutex<StdRng>,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RandomPolicy {
    fn choose_target(&self, targets: &[String]) -> String {
        let mut rng = self.rng.lock().expect("rng mutex poisoned");
        let index = rng.gen_range(0..targets.len());
        targets[index].clone()
    }
}
