// ── Session ──
//
// Owns the state container, both store adapters, the sync tracker and the
// subscription manager for one run of the application. The mode is fixed
// at `open` and never changes for the life of the session.

mod bulk;
mod commands;

use std::sync::Arc;

use goldfin_api::Identity;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::command::{Command, CommandResult};
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::local::{KeyValueStorage, LocalStore};
use crate::mode::{BackendConnector, CredentialStore, FirestoreConnector, Mode, determine_mode};
use crate::model::{
    ConstraintTag, Contract, Customer, Event, MenuItem, RecordId, Service, SymbolPaletteItem,
    Template,
};
use crate::remote::RemoteStore;
use crate::store::{AppState, StateReset, Stored};
use crate::subscriptions::{ListenerTargets, SubscriptionManager};
use crate::sync::{SyncIndicator, SyncTracker};

/// Handle to a running session. Cheaply cloneable.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    mode: Mode,
    notice: Option<String>,
    state: Arc<AppState>,
    local: Arc<LocalStore>,
    tracker: Arc<SyncTracker>,
    /// Present only in Cloud Mode.
    remote: Option<RemoteStore>,
    subscriptions: SubscriptionManager,
    /// Serializes commands so pre-checks and writes see a stable state.
    command_lock: Mutex<()>,
}

/// One pending change to a collection, mirrored to the remote store.
pub(crate) enum Write<T> {
    Insert(T),
    Update(T),
    Delete(RecordId),
}

impl Session {
    /// Open a session against the Firestore REST backend.
    pub async fn open(config: &SessionConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let connector = FirestoreConnector::new(config.transport.clone(), config.poll_interval);
        Self::open_with(config.storage(), credentials.as_ref(), &connector).await
    }

    /// Open a session with explicit storage and backend wiring.
    ///
    /// Never fails: a cloud initialization error falls back to Local Mode
    /// and is reported through [`notice`](Self::notice).
    pub async fn open_with(
        storage: Arc<dyn KeyValueStorage>,
        credentials: &dyn CredentialStore,
        connector: &dyn BackendConnector,
    ) -> Self {
        let selection = determine_mode(credentials, connector).await;
        let local = Arc::new(LocalStore::new(storage));
        let tracker = Arc::new(SyncTracker::new());
        let state = Arc::new(AppState::new());
        let remote = selection
            .backend
            .map(|backend| RemoteStore::new(backend, Arc::clone(&tracker)));

        match selection.mode {
            Mode::Local => state.reset(load_local(&local)),
            // Collections arrive from the listeners once signed in.
            Mode::Cloud => state.reset(StateReset::empty(local.load_business_details())),
        }
        info!(mode = %selection.mode, "session opened");

        Self {
            inner: Arc::new(SessionInner {
                mode: selection.mode,
                notice: selection.notice,
                state,
                local,
                tracker,
                remote,
                subscriptions: SubscriptionManager::new(),
                command_lock: Mutex::new(()),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn is_cloud(&self) -> bool {
        self.inner.mode == Mode::Cloud
    }

    /// Message to show the user when cloud initialization failed.
    pub fn notice(&self) -> Option<&str> {
        self.inner.notice.as_deref()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.inner.state
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.inner.local
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.inner.tracker
    }

    pub fn sync_indicator(&self) -> SyncIndicator {
        self.inner.tracker.indicator()
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner
            .remote
            .as_ref()
            .is_some_and(RemoteStore::is_authenticated)
    }

    // ── Identity lifecycle ───────────────────────────────────────────

    /// Attach a signed-in identity and start live subscriptions.
    pub async fn login(&self, identity: Identity) -> Result<(), CoreError> {
        let Some(remote) = &self.inner.remote else {
            return Err(CoreError::Config {
                message: "session is in local mode".into(),
            });
        };
        let _guard = self.inner.command_lock.lock().await;

        remote.set_identity(Some(identity.clone()));
        let targets = ListenerTargets {
            state: Arc::clone(&self.inner.state),
            local: Arc::clone(&self.inner.local),
            tracker: Arc::clone(&self.inner.tracker),
        };
        self.inner.subscriptions.start(remote, &identity, &targets);
        info!(uid = %identity.uid, "signed in");
        Ok(())
    }

    /// Tear down subscriptions and clear every collection.
    ///
    /// Settings fall back to the locally stored copy. Observers see a
    /// single [`StateChange::Reset`](crate::StateChange::Reset).
    pub async fn logout(&self) {
        let Some(remote) = &self.inner.remote else {
            return;
        };
        let _guard = self.inner.command_lock.lock().await;
        self.inner.subscriptions.discard();
        remote.set_identity(None);
        self.inner.tracker.clear();
        self.inner
            .state
            .reset(StateReset::empty(self.inner.local.load_business_details()));
        info!("signed out");
    }

    /// Report a connectivity change from the platform.
    pub fn set_online(&self, online: bool) {
        self.inner.tracker.set_online(online);
    }

    /// Stop every background task.
    pub async fn shutdown(&self) {
        self.inner.subscriptions.shutdown().await;
        debug!("session shut down");
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run one command: pre-check, compute, write through, then update
    /// the state container.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        let _guard = self.inner.command_lock.lock().await;
        self.require_writable()?;
        debug!(?command, "executing command");
        self.route_command(command).await
    }

    /// Cloud Mode refuses changes until an identity is attached, since
    /// there is nowhere to persist them.
    pub(crate) fn require_writable(&self) -> Result<(), CoreError> {
        match &self.inner.remote {
            Some(remote) if !remote.is_authenticated() => Err(CoreError::NotSignedIn),
            _ => Ok(()),
        }
    }

    // ── Write-through ────────────────────────────────────────────────

    /// Apply the next value of a collection through the active store.
    ///
    /// Local Mode persists first and only updates state on success. Cloud
    /// Mode updates state optimistically, then dispatches the remote
    /// writes; their failures are left to the sync indicator. Returns the
    /// final id of an inserted record, if any.
    pub(crate) async fn apply<T: Stored>(
        &self,
        next: Vec<T>,
        writes: Vec<Write<T>>,
    ) -> Result<Option<RecordId>, CoreError> {
        let Some(remote) = &self.inner.remote else {
            self.inner.local.save(&next)?;
            let created = writes.iter().find_map(|w| match w {
                Write::Insert(record) => Some(record.id().clone()),
                _ => None,
            });
            self.inner.state.set(next);
            return Ok(created);
        };

        self.inner.state.set(next);
        let mut created = None;
        for write in writes {
            match write {
                Write::Insert(record) => {
                    let provisional = record.id().clone();
                    let id = match remote.add_record(&record).await {
                        Ok(Some(id)) => {
                            self.swap_id::<T>(&provisional, &id);
                            id
                        }
                        Ok(None) => provisional,
                        Err(e) => {
                            debug!(error = %e, "remote create not confirmed");
                            provisional
                        }
                    };
                    created = Some(id);
                }
                Write::Update(record) => {
                    if let Err(e) = remote.update_record(&record).await {
                        debug!(error = %e, "remote update not confirmed");
                    }
                }
                Write::Delete(id) => {
                    if let Err(e) = remote.delete_record::<T>(&id).await {
                        debug!(error = %e, "remote delete not confirmed");
                    }
                }
            }
        }
        Ok(created)
    }

    /// Replace a provisional client id with the store-assigned one.
    fn swap_id<T: Stored>(&self, from: &RecordId, to: &RecordId) {
        let mut records = self.inner.state.records_owned::<T>();
        let mut changed = false;
        for record in &mut records {
            if record.id() == from {
                record.set_id(to.clone());
                changed = true;
            }
        }
        // A listener delivery may already have replaced the collection.
        if changed {
            self.inner.state.set(records);
        }
    }
}

/// Every collection plus settings, as currently stored locally.
fn load_local(local: &LocalStore) -> StateReset {
    StateReset {
        events: local.load::<Event>(),
        contracts: local.load::<Contract>(),
        templates: local.load::<Template>(),
        customers: local.load::<Customer>(),
        menu_items: local.load::<MenuItem>(),
        services: local.load::<Service>(),
        constraint_tags: local.load::<ConstraintTag>(),
        symbol_palette_items: local.load::<SymbolPaletteItem>(),
        business_details: local.load_business_details(),
    }
}
