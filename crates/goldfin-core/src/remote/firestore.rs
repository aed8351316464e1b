use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use goldfin_api::{Document, FirestoreClient, Identity, WriteOp};
use serde_json::{Map, Value};

use super::{CollectionSnapshot, DocumentBackend, ListenStream, SettingsSnapshot};
use crate::model::Collection;

/// [`DocumentBackend`] over the Firestore REST API.
///
/// REST has no push channel, so listeners poll at `poll_interval` and
/// deliver only when the document set changes. Writes are acknowledged
/// synchronously, so snapshots never carry pending writes.
#[derive(Clone)]
pub struct FirestoreBackend {
    client: FirestoreClient,
    poll_interval: Duration,
}

impl FirestoreBackend {
    pub fn new(client: FirestoreClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    pub fn client(&self) -> &FirestoreClient {
        &self.client
    }
}

#[async_trait]
impl DocumentBackend for FirestoreBackend {
    async fn list(
        &self,
        identity: &Identity,
        collection: Collection,
    ) -> Result<Vec<Document>, goldfin_api::Error> {
        self.client
            .list_documents(identity, collection.remote_name())
            .await
    }

    async fn create(
        &self,
        identity: &Identity,
        collection: Collection,
        data: &Map<String, Value>,
    ) -> Result<String, goldfin_api::Error> {
        self.client
            .create_document(identity, collection.remote_name(), data)
            .await
    }

    async fn set(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), goldfin_api::Error> {
        self.client
            .set_document(identity, collection.remote_name(), id, data)
            .await
    }

    async fn delete(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &str,
    ) -> Result<(), goldfin_api::Error> {
        self.client
            .delete_document(identity, collection.remote_name(), id)
            .await
    }

    async fn commit(&self, identity: &Identity, writes: &[WriteOp]) -> Result<(), goldfin_api::Error> {
        self.client.commit(identity, writes).await
    }

    async fn load_settings(
        &self,
        identity: &Identity,
    ) -> Result<Option<Map<String, Value>>, goldfin_api::Error> {
        self.client.load_settings(identity).await
    }

    async fn save_settings(
        &self,
        identity: &Identity,
        settings: &Map<String, Value>,
    ) -> Result<(), goldfin_api::Error> {
        self.client.save_settings(identity, settings).await
    }

    fn listen(&self, identity: Identity, collection: Collection) -> ListenStream<CollectionSnapshot> {
        self.client
            .poll_collection(identity, collection.remote_name().to_owned(), self.poll_interval)
            .map(|result| {
                result.map(|documents| CollectionSnapshot {
                    documents,
                    has_pending_writes: false,
                })
            })
            .boxed()
    }

    fn listen_settings(&self, identity: Identity) -> ListenStream<SettingsSnapshot> {
        self.client
            .poll_settings(identity, self.poll_interval)
            .map(|result| {
                result.map(|settings| SettingsSnapshot {
                    settings,
                    has_pending_writes: false,
                })
            })
            .boxed()
    }
}
