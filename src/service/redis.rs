//! Redis-backed registry: descriptors live as JSON payloads in one list.
//!
//! Add pushes to the tail; update and remove address the element by its
//! exact serialized payload rather than by position, so a concurrent
//! history of mutations cannot clobber an unrelated slot. List order may
//! therefore drift from in-memory order after updates; the working copy is
//! authoritative until the next boot.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::service::registry::{RegistryBase, RegistryInner, ServiceRegistry};
use crate::service::{BackendService, RegistryError};

const SERVICES_KEY: &str = "services";

pub struct RedisServiceRegistry {
    base: RegistryBase,
    conn: ConnectionManager,
    key: String,
}

impl RedisServiceRegistry {
    /// Connect, verify the server answers, and load the persisted list.
    pub async fn connect(uri: &str, namespace: &str) -> Result<Self, RegistryError> {
        let client = redis::Client::open(uri)?;
        let mut conn = client.get_connection_manager().await?;

        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;

        let key = if namespace.is_empty() {
            SERVICES_KEY.to_string()
        } else {
            format!("{namespace}:{SERVICES_KEY}")
        };

        let raw: Vec<String> = conn.lrange(&key, 0, -1).await?;
        let mut loaded = Vec::with_capacity(raw.len());
        for payload in raw {
            loaded.push(serde_json::from_str(&payload)?);
        }

        Ok(Self {
            base: RegistryBase::new(RegistryInner::from_services(loaded)?),
            conn,
            key,
        })
    }
}

#[async_trait]
impl ServiceRegistry for RedisServiceRegistry {
    async fn add_service(&self, service: BackendService) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        self.base
            .add(service, move |added, _| async move {
                let payload = serde_json::to_string(&*added)?;
                conn.rpush::<_, _, ()>(&key, payload).await?;
                Ok(())
            })
            .await
    }

    async fn update_service(&self, service: BackendService) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        self.base
            .update(service, move |previous, current, _| async move {
                let old_payload = serde_json::to_string(&*previous)?;
                let new_payload = serde_json::to_string(&*current)?;
                conn.lrem::<_, _, ()>(&key, 1, old_payload).await?;
                conn.rpush::<_, _, ()>(&key, new_payload).await?;
                Ok(())
            })
            .await
    }

    async fn remove_service(&self, name: &str) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        self.base
            .remove(name, move |removed, _| async move {
                let payload = serde_json::to_string(&*removed)?;
                conn.lrem::<_, _, ()>(&key, 1, payload).await?;
                Ok(())
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
