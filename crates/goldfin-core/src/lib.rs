//! Reactive synchronization core for the GoldFin catering manager.
//!
//! This crate owns the domain model, the single in-memory state container
//! and the two interchangeable persistence layers behind it:
//!
//! - **[`Session`]**: lifecycle facade. [`Session::open`] decides once
//!   between Local Mode and Cloud Mode, [`Session::execute`] runs every
//!   user-initiated [`Command`], and bulk operations cover backup import,
//!   export and wiping.
//!
//! - **[`AppState`]**: the authoritative in-memory copy of every collection.
//!   Each write notifies observers exactly once; derived views
//!   (filtered lists, dashboard aggregates) are computed from it.
//!
//! - **[`LocalStore`]**: synchronous persistence to on-device key-value
//!   storage, with first-run sample data for the library collections.
//!
//! - **[`RemoteStore`]**: identity-scoped document store with batched
//!   commits and live listeners, driven by the [`SubscriptionManager`].
//!
//! - **[`SyncTracker`]**: per-collection pending-write flags folded into a
//!   single [`SyncIndicator`].

pub mod backup;
pub mod command;
pub mod config;
pub mod error;
pub mod filter;
pub mod local;
pub mod mode;
pub mod model;
pub mod remote;
pub mod store;
pub mod stream;
pub mod subscriptions;
pub mod sync;

mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backup::{BACKUP_VERSION, Backup};
pub use command::{Command, CommandResult};
pub use config::SessionConfig;
pub use error::CoreError;
pub use filter::{ContractFilters, DateRange, EventFilters, RecordSort, TemplateFilters, TemplateSort};
pub use local::{FileStorage, KeyValueStorage, LocalStore, MemoryStorage};
pub use mode::{
    BackendConnector, CredentialStore, FirestoreConnector, Mode, ModeSelection, NoCredentials,
    determine_mode,
};
pub use remote::{DocumentBackend, FirestoreBackend, MemoryBackend, RemoteStore};
pub use session::Session;
pub use store::{AppState, ObserverId, StateChange, StateKey, StateReset, Stored};
pub use stream::{CollectionStream, Snapshot};
pub use subscriptions::SubscriptionManager;
pub use sync::{SyncIndicator, SyncTracker};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BusinessDetails, Collection, ConstraintTag, Contract, ContractStatus, Customer, Event,
    MenuItem, MenuLine, PricingType, Proposal, ProposalStatus, Record, RecordId, Service,
    StatusChange, SymbolPaletteItem, Template,
};
