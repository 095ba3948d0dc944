//! Least-connections load balancing.
//!
//! # Algorithm
//! An indexed binary min-heap over per-target in-flight counts. `choose_target`
//! pops the minimum, increments its count and reinserts it; `done` decrements
//! the matching entry and repairs the heap at its tracked slot in O(log n).
//!
//! Ordering: smallest count first. Ties go to the larger weight in the
//! weighted variant, then to the earlier insertion stamp; the plain variant
//! uses the stamp alone. Reinsertion refreshes the stamp, so equally-loaded
//! targets rotate instead of pinning the first one.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::load_balancer::LoadBalancer;

struct Entry {
    target: String,
    count: u64,
    weight: u32,
    stamp: u64,
}

struct HeapState {
    entries: Vec<Entry>,
    /// target → current slot in `entries`; kept in sync on every swap.
    slots: HashMap<String, usize>,
    clock: u64,
    weighted: bool,
}

impl HeapState {
    fn less(&self, i: usize, j: usize) -> bool {
        let (a, b) = (&self.entries[i], &self.entries[j]);
        if a.count != b.count {
            return a.count < b.count;
        }
        if self.weighted && a.weight != b.weight {
            return a.weight > b.weight;
        }
        a.stamp < b.stamp
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.entries.swap(i, j);
        self.slots.insert(self.entries[i].target.clone(), i);
        self.slots.insert(self.entries[j].target.clone(), j);
    }

    fn sift_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
        i
    }

    fn sift_down(&mut self, mut i: usize) -> usize {
        let len = self.entries.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == i {
                return i;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }
}

/// Least-connections selector with exact in-flight accounting.
pub struct LeastConnPolicy {
    state: Mutex<HeapState>,
}

impl LeastConnPolicy {
    /// Build the heap over `targets`; `weights` switches on the weighted
    /// tie-break and must already be validated against the target list.
    pub fn new(targets: &[String], weights: Option<&[u32]>) -> Self {
        let mut entries = Vec::with_capacity(targets.len());
        let mut slots = HashMap::with_capacity(targets.len());

        for (i, target) in targets.iter().enumerate() {
            entries.push(Entry {
                target: target.clone(),
                count: 0,
                weight: weights.map(|w| w[i]).unwrap_or(0),
                stamp: i as u64,
            });
            slots.insert(target.clone(), i);
        }

        let clock = entries.last().map(|e| e.stamp).unwrap_or(0);
        let mut state = HeapState {
            entries,
            slots,
            clock,
            weighted: weights.is_some(),
        };

        let len = state.entries.len();
        for i in (0..len / 2).rev() {
            state.sift_down(i);
        }

        Self {
            state: Mutex::new(state),
        }
    }
}

impl LoadBalancer for LeastConnPolicy {
    fn choose_target(&self, _targets: &[String]) -> String {
        let mut heap = self.state.lock().expect("least-conn heap mutex poisoned");
        if heap.entries.is_empty() {
            return String::new();
        }

        // pop the minimum
        let last = heap.entries.len() - 1;
        heap.swap(0, last);
        let mut min = match heap.entries.pop() {
            Some(entry) => entry,
            None => return String::new(),
        };
        heap.slots.remove(&min.target);
        if !heap.entries.is_empty() {
            heap.sift_down(0);
        }

        min.count += 1;
        heap.clock += 1;
        min.stamp = heap.clock;
        let target = min.target.clone();

        // reinsert with the fresh stamp
        let slot = heap.entries.len();
        heap.slots.insert(min.target.clone(), slot);
        heap.entries.push(min);
        heap.sift_up(slot);

        target
    }

    fn done(&self, target: &str) {
        let mut heap = self.state.lock().expect("least-conn heap mutex poisoned");

        let slot = match heap.slots.get(target) {
            Some(slot) => *slot,
            None => return,
        };

        heap.entries[slot].count = heap.entries[slot].count.saturating_sub(1);
        let slot = heap.sift_up(slot);
        heap.sift_down(slot);
    }
}
