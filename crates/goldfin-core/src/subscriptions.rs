// ── Subscription lifecycle ──
//
// One listener task per collection plus one for the settings singleton.
// Each delivery replaces the in-memory collection wholesale, mirrors it
// into local storage and updates the sync flag. A generation counter
// guards against deliveries that land after `discard`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures_util::StreamExt;
use goldfin_api::{Document, Identity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::local::LocalStore;
use crate::model::{
    BusinessDetails, ConstraintTag, Contract, Customer, Event, MenuItem, Service,
    SymbolPaletteItem, Template, from_document,
};
use crate::remote::{CollectionSnapshot, RemoteStore, SettingsSnapshot};
use crate::store::{AppState, StateKey, Stored};
use crate::sync::SyncTracker;

/// Everything a listener writes into.
#[derive(Clone)]
pub(crate) struct ListenerTargets {
    pub(crate) state: Arc<AppState>,
    pub(crate) local: Arc<LocalStore>,
    pub(crate) tracker: Arc<SyncTracker>,
}

struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SubscriptionManager {
    /// Current generation. Listeners hold the read lock while applying a
    /// delivery; `discard` bumps it under the write lock.
    gate: Arc<RwLock<u64>>,
    active: Mutex<Vec<Subscription>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(RwLock::new(0)),
            active: Mutex::new(Vec::new()),
        }
    }

    /// Replace any existing subscriptions with a fresh set for `identity`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(&self, remote: &RemoteStore, identity: &Identity, targets: &ListenerTargets) {
        self.discard();
        let generation = *self.gate.read().unwrap_or_else(PoisonError::into_inner);

        let mut subs = Vec::with_capacity(9);
        subs.push(self.spawn_collection::<Event>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<Contract>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<Template>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<Customer>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<MenuItem>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<Service>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<ConstraintTag>(remote, identity, targets, generation));
        subs.push(self.spawn_collection::<SymbolPaletteItem>(remote, identity, targets, generation));
        subs.push(self.spawn_settings(remote, identity, targets, generation));

        info!(uid = %identity.uid, generation, "subscriptions started");
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = subs;
    }

    /// Tear down every subscription. Idempotent.
    ///
    /// Once this returns no further delivery reaches the state container,
    /// even from a callback that was already in flight.
    pub fn discard(&self) {
        {
            let mut generation = self.gate.write().unwrap_or_else(PoisonError::into_inner);
            *generation += 1;
        }
        let subs = std::mem::take(&mut *self.active.lock().unwrap_or_else(PoisonError::into_inner));
        if subs.is_empty() {
            return;
        }
        for sub in &subs {
            sub.cancel.cancel();
        }
        debug!(count = subs.len(), "subscriptions discarded");
    }

    /// Discard and wait for every listener task to finish.
    pub async fn shutdown(&self) {
        let subs = std::mem::take(&mut *self.active.lock().unwrap_or_else(PoisonError::into_inner));
        {
            let mut generation = self.gate.write().unwrap_or_else(PoisonError::into_inner);
            *generation += 1;
        }
        for sub in subs {
            sub.cancel.cancel();
            let _ = sub.handle.await;
        }
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn spawn_collection<T: Stored>(
        &self,
        remote: &RemoteStore,
        identity: &Identity,
        targets: &ListenerTargets,
        generation: u64,
    ) -> Subscription {
        let mut stream = remote.listen(identity.clone(), T::COLLECTION);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let gate = Arc::clone(&self.gate);
        let targets = targets.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(snapshot)) => apply_collection::<T>(&gate, generation, &targets, snapshot),
                        // Listener errors are swallowed; the collection keeps its last value.
                        Some(Err(e)) => warn!(collection = ?T::COLLECTION, error = %e, "listener error"),
                        None => break,
                    },
                }
            }
            debug!(collection = ?T::COLLECTION, "listener stopped");
        });

        Subscription { cancel, handle }
    }

    fn spawn_settings(
        &self,
        remote: &RemoteStore,
        identity: &Identity,
        targets: &ListenerTargets,
        generation: u64,
    ) -> Subscription {
        let mut stream = remote.listen_settings(identity.clone());
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let gate = Arc::clone(&self.gate);
        let targets = targets.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(snapshot)) => apply_settings(&gate, generation, &targets, snapshot),
                        Some(Err(e)) => warn!(error = %e, "settings listener error"),
                        None => break,
                    },
                }
            }
        });

        Subscription { cancel, handle }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.discard();
    }
}

// ── Delivery handling ────────────────────────────────────────────────

/// Decode documents into records, dropping any that do not parse.
pub(crate) fn decode_documents<T: Stored>(documents: Vec<Document>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|doc| match from_document::<T>(&doc.id, doc.data) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = ?T::COLLECTION, id = %doc.id, error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

fn apply_collection<T: Stored>(
    gate: &RwLock<u64>,
    generation: u64,
    targets: &ListenerTargets,
    snapshot: CollectionSnapshot,
) {
    let current = gate.read().unwrap_or_else(PoisonError::into_inner);
    if *current != generation {
        debug!(collection = ?T::COLLECTION, "late delivery ignored");
        return;
    }

    let records = decode_documents::<T>(snapshot.documents);
    if let Err(e) = targets.local.save(&records) {
        warn!(collection = ?T::COLLECTION, error = %e, "failed to mirror delivery locally");
    }
    targets
        .tracker
        .set_pending(T::COLLECTION, snapshot.has_pending_writes);
    debug!(collection = ?T::COLLECTION, count = records.len(), "delivery applied");
    targets.state.set(records);
}

fn apply_settings(
    gate: &RwLock<u64>,
    generation: u64,
    targets: &ListenerTargets,
    snapshot: SettingsSnapshot,
) {
    let current = gate.read().unwrap_or_else(PoisonError::into_inner);
    if *current != generation {
        return;
    }

    let details = match snapshot.settings {
        Some(map) => match serde_json::from_value::<BusinessDetails>(serde_json::Value::Object(map)) {
            Ok(details) => {
                if let Err(e) = targets.local.save_business_details(&details) {
                    warn!(error = %e, "failed to mirror settings locally");
                }
                details
            }
            Err(e) => {
                warn!(error = %e, "malformed remote settings ignored");
                return;
            }
        },
        // Nothing stored remotely yet; keep showing the local copy.
        None => targets.local.load_business_details(),
    };
    targets
        .tracker
        .set_pending(StateKey::BusinessDetails, snapshot.has_pending_writes);
    targets.state.set_business_details(details);
}
