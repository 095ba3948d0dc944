//! File-backed registry: the whole list is marshalled and atomically
//! rewritten on every mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::service::registry::{RegistryBase, RegistryInner, ServiceRegistry};
use crate::service::{BackendService, RegistryError};

pub struct YamlServiceRegistry {
    base: RegistryBase,
    path: PathBuf,
}

impl YamlServiceRegistry {
    /// Load the services file, creating an empty one when missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();

        if tokio::fs::try_exists(&path).await? {
            let raw = tokio::fs::read_to_string(&path).await?;
            let loaded: Vec<BackendService> = if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_yaml::from_str(&raw)?
            };
            Ok(Self {
                base: RegistryBase::new(RegistryInner::from_services(loaded)?),
                path,
            })
        } else {
            tokio::fs::write(&path, "").await?;
            Ok(Self {
                base: RegistryBase::new(RegistryInner::empty()),
                path,
            })
        }
    }
}

/// Marshal the list and swap it in via a temp file so readers never observe
/// a half-written store.
async fn write_services(
    path: &Path,
    services: &[Arc<BackendService>],
) -> Result<(), RegistryError> {
    let data = serde_yaml::to_string(services)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ServiceRegistry for YamlServiceRegistry {
    async fn add_service(&self, service: BackendService) -> Result<(), RegistryError> {
        let path = self.path.clone();
        self.base
            .add(service, move |_, all| async move {
                write_services(&path, &all).await
            })
            .await
    }

    async fn update_service(&self, service: BackendService) -> Result<(), RegistryError> {
        let path = self.path.clone();
        self.base
            .update(service, move |_, _, all| async move {
                write_services(&path, &all).await
            })
            .await
    }

    async fn remove_service(&self, name: &str) -> Result<(), RegistryError> {
        let path = self.path.clone();
        self.base
            .remove(name, move |_, all| async move {
                write_services(&path, &all).await
            })
            .await
    }

    async fn get_services(&self) -> Vec<Arc<BackendService>> {
        self.base.services().await
    }

    async fn find_service(&self, host: &str, path: &str) -> Option<Arc<BackendService>> {
        self.base.find(host, path).await
    }
}
