// ── Identity-scoped record operations ──
//
// Every write marks its key pending in the sync tracker, then clears it on
// success. A failed write is logged and leaves the flag set; there is no
// retry queue. Without an identity every call is a no-op.

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use goldfin_api::{BATCH_LIMIT, Identity, WriteOp};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use super::{CollectionSnapshot, DocumentBackend, ListenStream, SettingsSnapshot};
use crate::error::CoreError;
use crate::model::{BusinessDetails, Collection, Record, RecordId, to_document};
use crate::store::StateKey;
use crate::sync::SyncTracker;

pub struct RemoteStore {
    backend: Arc<dyn DocumentBackend>,
    identity: ArcSwapOption<Identity>,
    tracker: Arc<SyncTracker>,
}

impl RemoteStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, tracker: Arc<SyncTracker>) -> Self {
        Self {
            backend,
            identity: ArcSwapOption::empty(),
            tracker,
        }
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        self.identity.store(identity.map(Arc::new));
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.identity.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.load().is_some()
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    // ── Single-record writes ─────────────────────────────────────────

    /// Create a record with a store-assigned id.
    ///
    /// Returns `Ok(None)` when not signed in.
    pub async fn add_record<T: Record>(&self, record: &T) -> Result<Option<RecordId>, CoreError> {
        let Some(identity) = self.identity() else {
            debug!(collection = ?T::COLLECTION, "add skipped: not signed in");
            return Ok(None);
        };
        let (_, data) = to_document(record)?;
        let id = self
            .tracked(T::COLLECTION.into(), "add", async {
                self.backend.create(&identity, T::COLLECTION, &data).await
            })
            .await?;
        Ok(Some(RecordId::from(id)))
    }

    /// Overwrite a record under its current id.
    pub async fn update_record<T: Record>(&self, record: &T) -> Result<(), CoreError> {
        let Some(identity) = self.identity() else {
            return Ok(());
        };
        let (id, data) = to_document(record)?;
        self.tracked(T::COLLECTION.into(), "update", async {
            self.backend
                .set(&identity, T::COLLECTION, id.as_str(), &data)
                .await
        })
        .await
    }

    pub async fn delete_record<T: Record>(&self, id: &RecordId) -> Result<(), CoreError> {
        let Some(identity) = self.identity() else {
            return Ok(());
        };
        self.tracked(T::COLLECTION.into(), "delete", async {
            self.backend
                .delete(&identity, T::COLLECTION, id.as_str())
                .await
        })
        .await
    }

    // ── Batch writes ─────────────────────────────────────────────────

    /// Overwrite every given record in `⌈N / BATCH_LIMIT⌉` atomic commits.
    ///
    /// Documents not in `items` are left alone. Returns the number of
    /// commits issued.
    pub async fn replace_collection<T: Record>(&self, items: &[T]) -> Result<usize, CoreError> {
        let Some(identity) = self.identity() else {
            return Ok(0);
        };
        let collection = T::COLLECTION;
        let writes = items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.ensure_id();
                let (id, data) = to_document(&item)?;
                Ok(WriteOp::Set {
                    collection: collection.remote_name().to_owned(),
                    id: id.to_string(),
                    data,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let commits = self
            .tracked(collection.into(), "replace", self.commit_chunked(&identity, &writes))
            .await?;
        debug!(collection = ?collection, records = items.len(), commits, "collection replaced");
        Ok(commits)
    }

    pub async fn save_settings(&self, details: &BusinessDetails) -> Result<(), CoreError> {
        let Some(identity) = self.identity() else {
            return Ok(());
        };
        let settings = match serde_json::to_value(details)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.tracked(StateKey::BusinessDetails, "save settings", async {
            self.backend.save_settings(&identity, &settings).await
        })
        .await
    }

    /// Delete every document of every collection for the signed-in user.
    pub async fn wipe_all(&self) -> Result<(), CoreError> {
        let Some(identity) = self.identity() else {
            return Ok(());
        };
        for collection in Collection::iter() {
            self.tracked(collection.into(), "wipe", async {
                let docs = self.backend.list(&identity, collection).await?;
                let writes: Vec<WriteOp> = docs
                    .into_iter()
                    .map(|d| WriteOp::Delete {
                        collection: collection.remote_name().to_owned(),
                        id: d.id,
                    })
                    .collect();
                self.commit_chunked(&identity, &writes).await
            })
            .await?;
        }
        info!(uid = %identity.uid, "remote data wiped");
        Ok(())
    }

    // ── Listening ────────────────────────────────────────────────────

    pub fn listen(&self, identity: Identity, collection: Collection) -> ListenStream<CollectionSnapshot> {
        self.backend.listen(identity, collection)
    }

    pub fn listen_settings(&self, identity: Identity) -> ListenStream<SettingsSnapshot> {
        self.backend.listen_settings(identity)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn commit_chunked(
        &self,
        identity: &Identity,
        writes: &[WriteOp],
    ) -> Result<usize, goldfin_api::Error> {
        let mut commits = 0;
        for chunk in writes.chunks(BATCH_LIMIT) {
            self.backend.commit(identity, chunk).await?;
            commits += 1;
        }
        Ok(commits)
    }

    async fn tracked<R, F>(&self, key: StateKey, op: &'static str, fut: F) -> Result<R, CoreError>
    where
        F: Future<Output = Result<R, goldfin_api::Error>>,
    {
        self.tracker.set_pending(key, true);
        match fut.await {
            Ok(value) => {
                self.tracker.set_pending(key, false);
                Ok(value)
            }
            Err(e) => {
                warn!(?key, op, error = %e, "remote write failed; sync flag left pending");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Customer, MenuItem};
    use crate::remote::MemoryBackend;
    use secrecy::SecretString;

    fn setup() -> (MemoryBackend, Arc<SyncTracker>, RemoteStore) {
        let backend = MemoryBackend::new();
        let tracker = Arc::new(SyncTracker::new());
        let store = RemoteStore::new(Arc::new(backend.clone()), Arc::clone(&tracker));
        (backend, tracker, store)
    }

    fn sign_in(store: &RemoteStore) {
        store.set_identity(Some(Identity::new("u1", SecretString::from("tok"))));
    }

    fn items(n: usize) -> Vec<MenuItem> {
        (0..n)
            .map(|i| MenuItem {
                id: format!("menu_{i}").into(),
                name: format!("Item {i}"),
                ..MenuItem::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn calls_before_sign_in_are_noops() {
        let (backend, tracker, store) = setup();
        assert_eq!(store.add_record(&Customer::default()).await.unwrap(), None);
        store.update_record(&Customer::default()).await.unwrap();
        store.delete_record::<Customer>(&"x".into()).await.unwrap();
        assert_eq!(store.replace_collection(&items(3)).await.unwrap(), 0);
        store.wipe_all().await.unwrap();
        assert!(backend.commit_sizes().is_empty());
        assert!(!tracker.has_pending());
    }

    #[tokio::test]
    async fn replace_collection_chunks_by_batch_limit() {
        let (backend, _, store) = setup();
        sign_in(&store);

        let commits = store.replace_collection(&items(1201)).await.unwrap();
        assert_eq!(commits, 3);
        assert_eq!(backend.commit_sizes(), [500, 500, 201]);
        assert_eq!(backend.documents("u1", Collection::MenuItems).len(), 1201);
    }

    #[tokio::test]
    async fn successful_write_clears_pending() {
        let (backend, tracker, store) = setup();
        sign_in(&store);

        let id = store.add_record(&Customer::default()).await.unwrap().unwrap();
        assert!(!id.is_empty());
        assert!(!tracker.is_pending(Collection::Customers));
        assert_eq!(backend.documents("u1", Collection::Customers)[0].id, id.as_str());
    }

    #[tokio::test]
    async fn failed_write_leaves_pending_and_errors() {
        let (backend, tracker, store) = setup();
        sign_in(&store);
        backend.set_fail_writes(true);

        let err = store.update_record(&Customer::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied { .. }));
        assert!(tracker.is_pending(Collection::Customers));
    }

    #[tokio::test]
    async fn wipe_all_deletes_every_collection() {
        let (backend, _, store) = setup();
        sign_in(&store);
        store.replace_collection(&items(3)).await.unwrap();
        store
            .replace_collection(&[Customer {
                id: "c1".into(),
                ..Customer::default()
            }])
            .await
            .unwrap();

        store.wipe_all().await.unwrap();
        assert!(backend.documents("u1", Collection::MenuItems).is_empty());
        assert!(backend.documents("u1", Collection::Customers).is_empty());
    }
}
