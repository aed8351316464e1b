// ── In-process document database ──
//
// Behaves like the remote store for tests and offline demos, with knobs
// for the failure modes the sync layer must tolerate: unconfirmed writes,
// rejected writes and listeners that never deliver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use futures_util::StreamExt;
use goldfin_api::{BATCH_LIMIT, Document, Identity, WriteOp};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::debug;

use super::{CollectionSnapshot, DocumentBackend, ListenStream, SettingsSnapshot};
use crate::model::Collection;

type CollectionKey = (String, String);

#[derive(Default)]
struct Inner {
    /// Documents per `(uid, remote collection name)`, in insertion order.
    collections: DashMap<CollectionKey, Vec<Document>>,
    settings: DashMap<String, Map<String, Value>>,
    pending_writes: AtomicBool,
    fail_writes: AtomicBool,
    silenced: DashSet<Collection>,
    commit_sizes: Mutex<Vec<usize>>,
}

#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
    revision: Arc<watch::Sender<u64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner::default()),
            revision: Arc::new(revision),
        }
    }

    // ── Test knobs ───────────────────────────────────────────────────

    /// Report every listener delivery as carrying unconfirmed writes.
    pub fn set_pending_writes(&self, pending: bool) {
        self.inner.pending_writes.store(pending, Ordering::SeqCst);
        self.bump();
    }

    /// Reject every write with `PermissionDenied`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Listeners for `collection` yield one permission error, then nothing.
    pub fn silence(&self, collection: Collection) {
        self.inner.silenced.insert(collection);
    }

    /// Number of writes in each commit, oldest first.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.inner
            .commit_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace a collection directly, as another device would.
    pub fn put_documents(&self, uid: &str, collection: Collection, documents: Vec<Document>) {
        self.inner.collections.insert(key(uid, collection), documents);
        self.bump();
    }

    pub fn put_settings(&self, uid: &str, settings: Map<String, Value>) {
        self.inner.settings.insert(uid.to_owned(), settings);
        self.bump();
    }

    pub fn documents(&self, uid: &str, collection: Collection) -> Vec<Document> {
        self.inner
            .collections
            .get(&key(uid, collection))
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn settings(&self, uid: &str) -> Option<Map<String, Value>> {
        self.inner.settings.get(uid).map(|s| s.clone())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    fn check_writable(&self) -> Result<(), goldfin_api::Error> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            Err(goldfin_api::Error::PermissionDenied {
                message: "writes rejected".into(),
            })
        } else {
            Ok(())
        }
    }

    fn upsert(&self, uid: &str, collection: &str, id: &str, data: &Map<String, Value>) {
        let mut docs = self
            .inner
            .collections
            .entry((uid.to_owned(), collection.to_owned()))
            .or_default();
        let doc = Document {
            id: id.to_owned(),
            data: data.clone(),
        };
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    fn remove(&self, uid: &str, collection: &str, id: &str) {
        if let Some(mut docs) = self
            .inner
            .collections
            .get_mut(&(uid.to_owned(), collection.to_owned()))
        {
            docs.retain(|d| d.id != id);
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn key(uid: &str, collection: Collection) -> CollectionKey {
    (uid.to_owned(), collection.remote_name().to_owned())
}

fn silenced<T: Send + 'static>() -> ListenStream<T> {
    futures_util::stream::once(async {
        Err(goldfin_api::Error::PermissionDenied {
            message: "listener rejected".into(),
        })
    })
    .chain(futures_util::stream::pending())
    .boxed()
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn list(
        &self,
        identity: &Identity,
        collection: Collection,
    ) -> Result<Vec<Document>, goldfin_api::Error> {
        Ok(self.documents(&identity.uid, collection))
    }

    async fn create(
        &self,
        identity: &Identity,
        collection: Collection,
        data: &Map<String, Value>,
    ) -> Result<String, goldfin_api::Error> {
        self.check_writable()?;
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(20);
        self.upsert(&identity.uid, collection.remote_name(), &id, data);
        self.bump();
        Ok(id)
    }

    async fn set(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), goldfin_api::Error> {
        self.check_writable()?;
        self.upsert(&identity.uid, collection.remote_name(), id, data);
        self.bump();
        Ok(())
    }

    async fn delete(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &str,
    ) -> Result<(), goldfin_api::Error> {
        self.check_writable()?;
        self.remove(&identity.uid, collection.remote_name(), id);
        self.bump();
        Ok(())
    }

    async fn commit(&self, identity: &Identity, writes: &[WriteOp]) -> Result<(), goldfin_api::Error> {
        if writes.len() > BATCH_LIMIT {
            return Err(goldfin_api::Error::BatchTooLarge {
                size: writes.len(),
                limit: BATCH_LIMIT,
            });
        }
        self.check_writable()?;
        if writes.is_empty() {
            return Ok(());
        }

        for write in writes {
            match write {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => self.upsert(&identity.uid, collection, id, data),
                WriteOp::Delete { collection, id } => self.remove(&identity.uid, collection, id),
            }
        }
        self.inner
            .commit_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(writes.len());
        debug!(writes = writes.len(), "memory commit");
        self.bump();
        Ok(())
    }

    async fn load_settings(
        &self,
        identity: &Identity,
    ) -> Result<Option<Map<String, Value>>, goldfin_api::Error> {
        Ok(self.settings(&identity.uid))
    }

    async fn save_settings(
        &self,
        identity: &Identity,
        settings: &Map<String, Value>,
    ) -> Result<(), goldfin_api::Error> {
        self.check_writable()?;
        self.put_settings(&identity.uid, settings.clone());
        Ok(())
    }

    fn listen(&self, identity: Identity, collection: Collection) -> ListenStream<CollectionSnapshot> {
        if self.inner.silenced.contains(&collection) {
            return silenced();
        }

        let backend = self.clone();
        let mut revision = self.revision.subscribe();
        async_stream::stream! {
            let mut last: Option<CollectionSnapshot> = None;
            loop {
                let snapshot = CollectionSnapshot {
                    documents: backend.documents(&identity.uid, collection),
                    has_pending_writes: backend.inner.pending_writes.load(Ordering::SeqCst),
                };
                if last.as_ref() != Some(&snapshot) {
                    last = Some(snapshot.clone());
                    yield Ok(snapshot);
                }
                if revision.changed().await.is_err() {
                    break;
                }
            }
        }
        .boxed()
    }

    fn listen_settings(&self, identity: Identity) -> ListenStream<SettingsSnapshot> {
        let backend = self.clone();
        let mut revision = self.revision.subscribe();
        async_stream::stream! {
            let mut last: Option<SettingsSnapshot> = None;
            loop {
                let snapshot = SettingsSnapshot {
                    settings: backend.settings(&identity.uid),
                    has_pending_writes: backend.inner.pending_writes.load(Ordering::SeqCst),
                };
                if last.as_ref() != Some(&snapshot) {
                    last = Some(snapshot.clone());
                    yield Ok(snapshot);
                }
                if revision.changed().await.is_err() {
                    break;
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;

    fn identity() -> Identity {
        Identity::new("u1", SecretString::from("tok"))
    }

    fn fields(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn listener_delivers_current_then_changes() {
        let backend = MemoryBackend::new();
        let mut stream = backend.listen(identity(), Collection::Events);

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.documents.is_empty());

        backend
            .set(&identity(), Collection::Events, "evt_1", &fields(json!({"clientName": "A"})))
            .await
            .unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.documents.len(), 1);
        assert_eq!(second.documents[0].id, "evt_1");
    }

    #[tokio::test]
    async fn collections_are_scoped_by_uid() {
        let backend = MemoryBackend::new();
        backend
            .set(&identity(), Collection::Customers, "c1", &Map::new())
            .await
            .unwrap();
        assert_eq!(backend.documents("u1", Collection::Customers).len(), 1);
        assert!(backend.documents("u2", Collection::Customers).is_empty());
    }

    #[tokio::test]
    async fn failing_writes_leave_data_untouched() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let err = backend
            .create(&identity(), Collection::Events, &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, goldfin_api::Error::PermissionDenied { .. }));
        assert!(backend.documents("u1", Collection::Events).is_empty());
    }

    #[tokio::test]
    async fn commit_applies_sets_and_deletes_in_order() {
        let backend = MemoryBackend::new();
        let writes = vec![
            WriteOp::Set {
                collection: "events".into(),
                id: "a".into(),
                data: Map::new(),
            },
            WriteOp::Set {
                collection: "events".into(),
                id: "b".into(),
                data: Map::new(),
            },
            WriteOp::Delete {
                collection: "events".into(),
                id: "a".into(),
            },
        ];
        backend.commit(&identity(), &writes).await.unwrap();
        let ids: Vec<String> = backend
            .documents("u1", Collection::Events)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["b"]);
        assert_eq!(backend.commit_sizes(), [3]);
    }

    #[tokio::test]
    async fn silenced_listener_errors_then_stays_quiet() {
        let backend = MemoryBackend::new();
        backend.silence(Collection::Contracts);
        let mut stream = backend.listen(identity(), Collection::Contracts);
        assert!(stream.next().await.unwrap().is_err());

        let next = tokio::time::timeout(std::time::Duration::from_millis(20), stream.next()).await;
        assert!(next.is_err());
    }
}
