// ── Remote store adapter ──
//
// `DocumentBackend` is the raw remote half of the collection store:
// document CRUD, atomic commits and live listeners, addressed by user
// identity. `RemoteStore` layers identity scoping, record encoding,
// batching and sync-flag bookkeeping on top.

mod firestore;
mod memory;
mod store;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use goldfin_api::{Document, Identity, WriteOp};
use serde_json::{Map, Value};

pub use firestore::FirestoreBackend;
pub use memory::MemoryBackend;
pub use store::RemoteStore;

use crate::model::Collection;

/// One delivery from a collection listener.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub documents: Vec<Document>,
    /// The store still holds local writes it has not confirmed.
    pub has_pending_writes: bool,
}

/// One delivery from the settings listener.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    /// `None` when the user document has no settings yet.
    pub settings: Option<Map<String, Value>>,
    pub has_pending_writes: bool,
}

pub type ListenStream<T> = BoxStream<'static, Result<T, goldfin_api::Error>>;

/// Remote document database scoped by user identity.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn list(
        &self,
        identity: &Identity,
        collection: Collection,
    ) -> Result<Vec<Document>, goldfin_api::Error>;

    /// Create with a store-assigned id, returning it.
    async fn create(
        &self,
        identity: &Identity,
        collection: Collection,
        data: &Map<String, Value>,
    ) -> Result<String, goldfin_api::Error>;

    async fn set(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), goldfin_api::Error>;

    async fn delete(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &str,
    ) -> Result<(), goldfin_api::Error>;

    /// Apply up to [`goldfin_api::BATCH_LIMIT`] writes atomically.
    async fn commit(&self, identity: &Identity, writes: &[WriteOp]) -> Result<(), goldfin_api::Error>;

    async fn load_settings(
        &self,
        identity: &Identity,
    ) -> Result<Option<Map<String, Value>>, goldfin_api::Error>;

    async fn save_settings(
        &self,
        identity: &Identity,
        settings: &Map<String, Value>,
    ) -> Result<(), goldfin_api::Error>;

    /// Live view of one collection. The first item is the current state.
    fn listen(&self, identity: Identity, collection: Collection) -> ListenStream<CollectionSnapshot>;

    fn listen_settings(&self, identity: Identity) -> ListenStream<SettingsSnapshot>;
}
