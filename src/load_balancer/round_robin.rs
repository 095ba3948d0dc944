//! Round-robin load balancing.
//!
//! # Algorithm
//! Rotate through upstream targets in declared order.
//!
//! # Design Decisions
//! - Uses an atomic cursor, no locks
//! - Wraps around on overflow

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::LoadBalancer;

/// Round-robin selector with a monotone cursor.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    cursor: AtomicUsize,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobinPolicy {
    fn choose_target(&self, targets: &[String]) -> String {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % targets.len();
        targets[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation() {
        let targets = vec![
            "http://localhost:8000".to_string(),
            "http://localhost:8001".to_string(),
            "http://localhost:8002".to_string(),
        ];
        let lb = RoundRobinPolicy::new();

        assert_eq!(lb.choose_target(&targets), targets[0]);
        assert_eq!(lb.choose_target(&targets), targets[1]);
        assert_eq!(lb.choose_target(&targets), targets[2]);
        assert_eq!(lb.choose_target(&targets), targets[0]);
    }

    #[test]
    fn test_even_distribution() {
        let targets = vec![
            "http://localhost:8000".to_string(),
            "http://localhost:8001".to_string(),
        ];
        let lb = RoundRobinPolicy::new();

        let mut counts = [0usize; 2];
        for _ in 0..101 {
            let picked = lb.choose_target(&targets);
            let index = targets.iter().position(|t| *t == picked).unwrap();
            counts[index] += 1;
        }

        // 101 selections over 2 targets: ⌈k/n⌉ and ⌊k/n⌋
        assert_eq!(counts[0], 51);
        assert_eq!(counts[1], 50);
    }
}
