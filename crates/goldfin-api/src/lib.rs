//! Async client for the GoldFin remote document store.
//!
//! Speaks the Firestore REST v1 surface: every user's data lives under
//! `users/{uid}/{collection}/{doc}` with the settings singleton stored as a
//! field on the `users/{uid}` document itself. The client deals in plain
//! JSON objects; the typed-value encoding Firestore uses on the wire is
//! handled by [`value`].

pub mod auth;
pub mod error;
pub mod firestore;
pub mod transport;
pub mod value;

pub use auth::{Identity, RemoteCredentials};
pub use error::Error;
pub use firestore::{BATCH_LIMIT, Document, FirestoreClient, WriteOp};
pub use transport::TransportConfig;
