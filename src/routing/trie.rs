//! Domain/path routing trie.

use std::collections::HashMap;
use std::sync::Arc;

use crate::service::BackendService;

#[derive(Default)]
struct RouteNode {
    children: HashMap<String, RouteNode>,
    service: Option<Arc<BackendService>>,
}

/// One immutable generation of the routing index.
///
/// The root's children are keyed by literal domains plus the empty-domain
/// partition (backends without a domain hang directly below the root);
/// deeper nodes are keyed by path segments. The registry rebuilds the whole
/// trie on every successful mutation and swaps it under its write lock.
#[derive(Default)]
pub struct RoutingTrie {
    root: RouteNode,
}

impl RoutingTrie {
    /// Build a fresh generation from the full services list.
    pub fn build(services: &[Arc<BackendService>]) -> Self {
        let mut root = RouteNode::default();
        for service in services {
            insert_node(&mut root, service);
        }
        Self { root }
    }

    /// Map `(host, path)` to a backend.
    ///
    /// A domain child whose node carries a backend matches the whole host
    /// before any path walk. Otherwise the walk descends per path segment and
    /// falls back to the longest matching prefix. The prefix fallback does not
    /// re-check the backend's domain against the request host; a backend
    /// registered without a domain can therefore answer for any host that
    /// reaches its subtree.
    pub fn find(&self, host: &str, path: &str) -> Option<Arc<BackendService>> {
        let domain = host.split(':').next().unwrap_or(host);

        let mut node = &self.root;
        if let Some(domain_node) = self.root.children.get(domain) {
            if domain_node.service.is_some() {
                return domain_node.service.clone();
            }
            node = domain_node;
        }

        let mut deepest = node.service.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    if node.service.is_some() {
                        deepest = node.service.clone();
                    }
                }
                None => return node.service.clone(),
            }
        }

        deepest
    }
}

fn insert_node(root: &mut RouteNode, service: &Arc<BackendService>) {
    let mut node = root;

    if !service.domain.is_empty() {
        node = node.children.entry(service.domain.clone()).or_default();
    }

    for segment in service.path.split('/').filter(|s| !s.is_empty()) {
        node = node.children.entry(segment.to_string()).or_default();
    }

    node.service = Some(service.clone());
}
