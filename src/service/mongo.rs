//! Document-store registry: one document per descriptor, keyed by name.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};

use crate::service::registry::{RegistryBase, RegistryInner, ServiceRegistry};
use crate::service::{BackendService, RegistryError};

pub struct MongoServiceRegistry {
    base: RegistryBase,
    collection: Collection<BackendService>,
}

impl MongoServiceRegistry {
    /// Connect, verify the server answers, and stream the full collection.
    pub async fn connect(
        uri: &str,
        database_name: &str,
        collection_name: &str,
    ) -> Result<Self, RegistryError> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        let database = client.database(database_name);
        database.run_command(doc! {"ping": 1}, None).await?;

        let collection = database.collection::<BackendService>(collection_name);

        let mut cursor = collection.find(None, None).await?;
        let mut loaded = Vec::new();
        while let Some(service) = cursor.try_next().await? {
            loaded.push(service);
        }

        Ok(Self {
            base: RegistryBase::new(RegistryInner::from_services(loaded)?),
            collection,
        })
    }
}

#[async_trait]
impl ServiceRegistry for MongoServiceRegistry {
    async fn add_service(&self, service: BackendService) -> Result<(), RegistryError> {
        let collection = self.collection.clone();
        self.base
            .add(service, move |added, _| async move {
                collection.insert_one(&*added, None).await?;
                Ok(())
            })
            .await
    }

    async fn update_service(&self, service: BackendService) -> Result<(), RegistryError> {
        let collection = self.collection.clone();
        self.base
            .update(service, move |_, current, _| async move {
                let update = to_document(&*current)?;
                collection
                    .update_one(
                        doc! {"name": current.name.as_str()},
                        doc! {"$set": update},
                        None,
                    )
                    .await?;
                Ok(())
            })
            .await
    }

    async fn remove_service(&self, name: &str) -> Result<(), RegistryError> {
        let collection = self.collection.clone();
        self.base
            .remove(name, move |removed, _| async move {
                collection
                    .delete_one(doc! {"name": removed.name.as_str()}, None)
                    .await?;
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
