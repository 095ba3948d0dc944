//! In-memory registry: nothing to persist, the working copy is the store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::service::registry::{RegistryBase, RegistryInner, ServiceRegistry};
use crate::service::{BackendService, RegistryError};

pub struct MemoryServiceRegistry {
    base: RegistryBase,
}

impl MemoryServiceRegistry {
    pub fn new() -> Self {
        Self {
            base: RegistryBase::new(RegistryInner::empty()),
        }
    }
}

impl Default for MemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for MemoryServiceRegistry {
    async fn add_service(&self, service: BackendService) -> Result<(), RegistryError> {
        self.base.add(service, |_, _| async { Ok(()) }).await
    }

    async fn update_service(&self, service: BackendService) -> Result<(), RegistryError> {
        self.base.update(service, |_, _, _| async { Ok(()) }).await
    }

    async fn remove_service(&self, name: &str) -> Result<(), RegistryError> {
        self.base.remove(name, |_, _| async { Ok(()) }).await
    }

    async fn get_services(&self) -> Vec<Arc<BackendService>> {
        self.base.services().await
    }

    async fn find_service(&self, host: &str, path: &str) -> Option<Arc<BackendService>> {
        self.base.find(host, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, domain: &str, path: &str) -> BackendService {
        BackendService {
            name: name.to_string(),
            domain: domain.to_string(),
            path: path.to_string(),
            upstream_targets: vec!["http://localhost:9000".to_string()],
            ..BackendService::default()
        }
    }

    #[tokio::test]
    async fn test_add_then_lookup() {
        let registry = MemoryServiceRegistry::new();
        registry
            .add_service(descriptor("t", "test.com", "/api"))
            .await
            .unwrap();

        let services = registry.get_services().await;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "t");

        let found = registry.find_service("test.com", "/api/anything").await;
        assert_eq!(found.unwrap().name, "t");
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let registry = MemoryServiceRegistry::new();
        registry
            .add_service(descriptor("t", "", "/api"))
            .await
            .unwrap();

        let err = registry
            .add_service(descriptor("t", "", "/other"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ServiceExists(name) if name == "t"));

        // the losing add left no trace
        assert_eq!(registry.get_services().await.len(), 1);
        assert!(registry.find_service("h", "/other").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_restores_prior_state() {
        let registry = MemoryServiceRegistry::new();
        registry
            .add_service(descriptor("a", "", "/a"))
            .await
            .unwrap();
        let before = registry.get_services().await;

        registry
            .add_service(descriptor("b", "", "/b"))
            .await
            .unwrap();
        registry.remove_service("b").await.unwrap();

        let after = registry.get_services().await;
        assert_eq!(
            before.iter().map(|s| &s.name).collect::<Vec<_>>(),
            after.iter().map(|s| &s.name).collect::<Vec<_>>()
        );
        assert!(registry.find_service("h", "/b/x").await.is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_routing() {
        let registry = MemoryServiceRegistry::new();
        registry
            .add_service(descriptor("t", "", "/old"))
            .await
            .unwrap();

        registry
            .update_service(descriptor("t", "", "/new"))
            .await
            .unwrap();

        assert!(registry.find_service("h", "/old/x").await.is_none());
        assert_eq!(registry.find_service("h", "/new/x").await.unwrap().name, "t");
    }

    #[tokio::test]
    async fn test_update_missing_rejected() {
        let registry = MemoryServiceRegistry::new();
        let err = registry
            .update_service(descriptor("ghost", "", "/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ServiceNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_adds_one_winner() {
        let registry = Arc::new(MemoryServiceRegistry::new());

        let mut handles = Vec::new();
        for _ in 0..2 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.add_service(descriptor("dup", "", "/dup")).await
            }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(outcomes.iter().filter(|r| r.is_err()).count(), 1);
        assert_eq!(registry.get_services().await.len(), 1);
    }
}
