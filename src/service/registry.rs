//! Registry contract and the shared in-memory base.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::routing::RoutingTrie;
use crate::service::{
    BackendService, MemoryServiceRegistry, MongoServiceRegistry, RedisServiceRegistry,
    RegistryError, YamlServiceRegistry,
};

/// The authoritative, ordered set of backend descriptors.
///
/// Mutations are transactional with respect to the backing store: a failed
/// persist rolls the in-memory change back and leaves the routing index
/// untouched. Lookups observe one consistent trie generation for the whole
/// walk.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn add_service(&self, service: BackendService) -> Result<(), RegistryError>;

    async fn update_service(&self, service: BackendService) -> Result<(), RegistryError>;

    async fn remove_service(&self, name: &str) -> Result<(), RegistryError>;

    /// Shallow copy of the current list, in registry order.
    async fn get_services(&self) -> Vec<Arc<BackendService>>;

    /// Read-locked trie lookup for the request engine.
    async fn find_service(&self, host: &str, path: &str) -> Option<Arc<BackendService>>;
}

/// Build the registry declared by `global.service_type`, load its persisted
/// descriptors and construct the first trie generation.
pub async fn new_service_registry(
    config: &Config,
) -> Result<Arc<dyn ServiceRegistry>, RegistryError> {
    let global = &config.global;

    match global.service_type.as_str() {
        "memory" => Ok(Arc::new(MemoryServiceRegistry::new())),
        "yaml" => Ok(Arc::new(
            YamlServiceRegistry::open(&global.services_file).await?,
        )),
        "redis" => Ok(Arc::new(
            RedisServiceRegistry::connect(&global.redis_uri, &global.redis_namespace).await?,
        )),
        "mongo" => Ok(Arc::new(
            MongoServiceRegistry::connect(
                &global.mongo_uri,
                &global.mongo_db_name,
                &global.mongo_collection_name,
            )
            .await?,
        )),
        other => Err(RegistryError::UnsupportedServiceType(other.to_string())),
    }
}

/// Working copy shared by every storage variant: the ordered descriptor list
/// plus the trie generation derived from it.
pub(crate) struct RegistryInner {
    services: Vec<Arc<BackendService>>,
    trie: RoutingTrie,
}

impl RegistryInner {
    pub(crate) fn empty() -> Self {
        Self {
            services: Vec::new(),
            trie: RoutingTrie::default(),
        }
    }

    /// Initialise every loaded descriptor and build the first generation.
    pub(crate) fn from_services(loaded: Vec<BackendService>) -> Result<Self, RegistryError> {
        let mut services = Vec::with_capacity(loaded.len());
        for mut service in loaded {
            service.init()?;
            services.push(Arc::new(service));
        }
        let trie = RoutingTrie::build(&services);
        Ok(Self { services, trie })
    }

    fn rebuild_trie(&mut self) {
        self.trie = RoutingTrie::build(&self.services);
    }
}

/// Lock, list and trie shared by all storage variants; each variant supplies
/// its persistence step as a closure.
pub(crate) struct RegistryBase {
    inner: RwLock<RegistryInner>,
}

impl RegistryBase {
    pub(crate) fn new(inner: RegistryInner) -> Self {
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub(crate) async fn services(&self) -> Vec<Arc<BackendService>> {
        self.inner.read().await.services.clone()
    }

    pub(crate) async fn find(&self, host: &str, path: &str) -> Option<Arc<BackendService>> {
        self.inner.read().await.trie.find(host, path)
    }

    /// Append a new descriptor. `apply` persists the change; its failure
    /// restores the snapshot and the trie stays on the old generation.
    pub(crate) async fn add<F, Fut>(
        &self,
        service: BackendService,
        apply: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(Arc<BackendService>, Vec<Arc<BackendService>>) -> Fut,
        Fut: Future<Output = Result<(), RegistryError>>,
    {
        let mut inner = self.inner.write().await;

        if inner.services.iter().any(|s| s.name == service.name) {
            return Err(RegistryError::ServiceExists(service.name));
        }

        let mut service = service;
        service.init()?;
        let service = Arc::new(service);

        let snapshot = inner.services.clone();
        inner.services.push(service.clone());

        if let Err(err) = apply(service, inner.services.clone()).await {
            inner.services = snapshot;
            return Err(err);
        }

        inner.rebuild_trie();
        Ok(())
    }

    /// Replace the descriptor with the same name.
    pub(crate) async fn update<F, Fut>(
        &self,
        service: BackendService,
        apply: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(Arc<BackendService>, Arc<BackendService>, Vec<Arc<BackendService>>) -> Fut,
        Fut: Future<Output = Result<(), RegistryError>>,
    {
        let mut inner = self.inner.write().await;

        let position = inner
            .services
            .iter()
            .position(|s| s.name == service.name)
            .ok_or_else(|| RegistryError::ServiceNotFound(service.name.clone()))?;

        let mut service = service;
        service.init()?;
        let service = Arc::new(service);

        let snapshot = inner.services.clone();
        let previous = inner.services[position].clone();
        inner.services[position] = service.clone();

        if let Err(err) = apply(previous, service, inner.services.clone()).await {
            inner.services = snapshot;
            return Err(err);
        }

        inner.rebuild_trie();
        Ok(())
    }

    /// Splice out the descriptor with the given name.
    pub(crate) async fn remove<F, Fut>(&self, name: &str, apply: F) -> Result<(), RegistryError>
    where
        F: FnOnce(Arc<BackendService>, Vec<Arc<BackendService>>) -> Fut,
        Fut: Future<Output = Result<(), RegistryError>>,
    {
        let mut inner = self.inner.write().await;

        let position = inner
            .services
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| RegistryError::ServiceNotFound(name.to_string()))?;

        let snapshot = inner.services.clone();
        let removed = inner.services.remove(position);

        if let Err(err) = apply(removed, inner.services.clone()).await {
            inner.services = snapshot;
            return Err(err);
        }

        inner.rebuild_trie();
        Ok(())
    }
}
