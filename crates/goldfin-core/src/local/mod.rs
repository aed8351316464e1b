// ── Local store adapter ──
//
// Synchronous, total load/save of collections against on-device storage.
// First load of a never-saved library collection installs sample data
// unless the session's no-seed flag is set.

mod seed;
mod storage;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

use crate::error::CoreError;
use crate::model::{BUSINESS_DETAILS_KEY, BusinessDetails, Collection, Record};

pub struct LocalStore {
    storage: Arc<dyn KeyValueStorage>,
    /// Session-scoped; never persisted.
    no_seed: AtomicBool,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            no_seed: AtomicBool::new(false),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn no_seed(&self) -> bool {
        self.no_seed.load(Ordering::SeqCst)
    }

    pub fn set_no_seed(&self, value: bool) {
        self.no_seed.store(value, Ordering::SeqCst);
    }

    // ── Collections ──────────────────────────────────────────────────

    /// Load a collection. Never fails: absent or corrupt content reads as
    /// empty (after seeding, where that applies).
    pub fn load<T: Record>(&self) -> Vec<T> {
        let collection = T::COLLECTION;
        let Some(raw) = self.storage.get(collection.storage_key()) else {
            return self.seed_if_allowed::<T>();
        };

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(collection = ?collection, error = %e, "discarding corrupt local data");
                Vec::new()
            }
        }
    }

    pub fn save<T: Record>(&self, items: &[T]) -> Result<(), CoreError> {
        self.write(T::COLLECTION.storage_key(), items)
    }

    fn seed_if_allowed<T: Record>(&self) -> Vec<T> {
        let collection = T::COLLECTION;
        if !collection.seeds_samples() || self.no_seed() {
            return Vec::new();
        }

        let items: Vec<T> = seed::samples(collection)
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if let Err(e) = self.save(&items) {
            warn!(collection = ?collection, error = %e, "failed to persist sample data");
        }
        debug!(collection = ?collection, count = items.len(), "seeded sample data");
        items
    }

    // ── Business details ─────────────────────────────────────────────

    /// The stored settings, or the built-in defaults.
    pub fn load_business_details(&self) -> BusinessDetails {
        self.storage
            .get(BUSINESS_DETAILS_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(details) => Some(details),
                Err(e) => {
                    warn!(error = %e, "discarding corrupt business details");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save_business_details(&self, details: &BusinessDetails) -> Result<(), CoreError> {
        self.write(BUSINESS_DETAILS_KEY, details)
    }

    // ── Bulk operations ──────────────────────────────────────────────

    /// Remove every collection key and suppress seeding for this session.
    /// Business details are kept.
    pub fn clear_all(&self) -> Result<(), CoreError> {
        self.set_no_seed(true);
        for collection in Collection::iter() {
            self.storage.remove(collection.storage_key())?;
        }
        info!("local collections cleared");
        Ok(())
    }

    /// Overwrite every library collection with the built-in samples and
    /// re-enable seeding.
    pub fn reseed_samples(&self) -> Result<(), CoreError> {
        self.set_no_seed(false);
        for collection in Collection::iter().filter(|c| c.seeds_samples()) {
            let raw = serde_json::to_string(&seed::samples(collection))?;
            self.storage.set(collection.storage_key(), &raw)?;
        }
        info!("sample data regenerated");
        Ok(())
    }

    fn write<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<(), CoreError> {
        let raw = serde_json::to_string(value)?;
        self.storage.set(key, &raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Event, MenuItem, Service};
    use pretty_assertions::assert_eq;

    fn store() -> (Arc<MemoryStorage>, LocalStore) {
        let storage = Arc::new(MemoryStorage::new());
        let local = LocalStore::new(storage.clone());
        (storage, local)
    }

    #[test]
    fn first_load_seeds_and_persists() {
        let (storage, local) = store();
        let items: Vec<MenuItem> = local.load();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].name, "Bruschetta");
        assert!(storage.get("goldfin_menu_items").is_some());
    }

    #[test]
    fn wipe_suppresses_seeding() {
        let (_, local) = store();
        let _: Vec<MenuItem> = local.load();
        local.clear_all().unwrap();
        let items: Vec<MenuItem> = local.load();
        assert!(items.is_empty());
    }

    #[test]
    fn events_never_seed() {
        let (storage, local) = store();
        let events: Vec<Event> = local.load();
        assert!(events.is_empty());
        assert!(storage.get("goldfin_events").is_none());
    }

    #[test]
    fn corrupt_content_reads_as_empty_without_seeding() {
        let (storage, local) = store();
        storage.set("goldfin_services", "{not json").unwrap();
        let services: Vec<Service> = local.load();
        assert!(services.is_empty());
    }

    #[test]
    fn saved_empty_list_does_not_reseed() {
        let (_, local) = store();
        local.save::<MenuItem>(&[]).unwrap();
        let items: Vec<MenuItem> = local.load();
        assert!(items.is_empty());
    }

    #[test]
    fn reseed_clears_flag_and_overwrites() {
        let (_, local) = store();
        local.clear_all().unwrap();
        local.reseed_samples().unwrap();
        assert!(!local.no_seed());
        let items: Vec<MenuItem> = local.load();
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn business_details_default_when_absent_or_corrupt() {
        let (storage, local) = store();
        assert_eq!(local.load_business_details(), BusinessDetails::default());

        storage.set(BUSINESS_DETAILS_KEY, "[1,2").unwrap();
        assert_eq!(local.load_business_details(), BusinessDetails::default());

        let details = BusinessDetails {
            business_name: "GoldFin".into(),
            ..BusinessDetails::default()
        };
        local.save_business_details(&details).unwrap();
        assert_eq!(local.load_business_details(), details);
    }

    #[test]
    fn clear_all_keeps_business_details() {
        let (storage, local) = store();
        local.save_business_details(&BusinessDetails::default()).unwrap();
        local.clear_all().unwrap();
        assert!(storage.get(BUSINESS_DETAILS_KEY).is_some());
    }
}
