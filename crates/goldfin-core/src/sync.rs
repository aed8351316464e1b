// ── Sync status tracking ──
//
// Per-key "unconfirmed remote write" flags folded into one indicator.
// Both the write path and the listener path call `set_pending`; every
// operation is idempotent so the two may race in any order.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashSet;
use tokio::sync::watch;
use tracing::debug;

use crate::store::StateKey;

/// The single UI-visible sync indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum SyncIndicator {
    /// Online with nothing pending.
    #[default]
    Hidden,
    /// Online with at least one write awaiting confirmation.
    Syncing,
    /// Offline with writes awaiting confirmation.
    Unsynced,
    /// Offline with nothing pending.
    Offline,
}

pub struct SyncTracker {
    pending: DashSet<StateKey>,
    online: AtomicBool,
    indicator: watch::Sender<SyncIndicator>,
}

impl SyncTracker {
    pub fn new() -> Self {
        let (indicator, _) = watch::channel(SyncIndicator::Hidden);
        Self {
            pending: DashSet::new(),
            online: AtomicBool::new(true),
            indicator,
        }
    }

    pub fn set_pending(&self, key: impl Into<StateKey>, pending: bool) {
        let key = key.into();
        let changed = if pending {
            self.pending.insert(key)
        } else {
            self.pending.remove(&key).is_some()
        };
        if changed {
            debug!(?key, pending, "sync flag changed");
        }
        self.refresh();
    }

    pub fn is_pending(&self, key: impl Into<StateKey>) -> bool {
        self.pending.contains(&key.into())
    }

    /// True iff at least one key has an unconfirmed write.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) != online {
            debug!(online, "connectivity changed");
        }
        self.refresh();
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn indicator(&self) -> SyncIndicator {
        *self.indicator.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncIndicator> {
        self.indicator.subscribe()
    }

    /// Drop every flag, e.g. on logout.
    pub fn clear(&self) {
        self.pending.clear();
        self.refresh();
    }

    fn refresh(&self) {
        let next = match (self.is_online(), self.has_pending()) {
            (true, false) => SyncIndicator::Hidden,
            (true, true) => SyncIndicator::Syncing,
            (false, true) => SyncIndicator::Unsynced,
            (false, false) => SyncIndicator::Offline,
        };
        self.indicator.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Collection;

    #[test]
    fn aggregate_is_true_iff_any_key_pending() {
        let t = SyncTracker::new();
        assert!(!t.has_pending());

        t.set_pending(Collection::Events, true);
        t.set_pending(StateKey::BusinessDetails, true);
        assert!(t.has_pending());
        assert_eq!(t.indicator(), SyncIndicator::Syncing);

        t.set_pending(Collection::Events, false);
        assert!(t.has_pending());
        t.set_pending(StateKey::BusinessDetails, false);
        assert!(!t.has_pending());
        assert_eq!(t.indicator(), SyncIndicator::Hidden);
    }

    #[test]
    fn clear_is_idempotent_in_any_order() {
        let t = SyncTracker::new();
        t.set_pending(Collection::Contracts, true);
        // Listener confirmation and write completion both clear.
        t.set_pending(Collection::Contracts, false);
        t.set_pending(Collection::Contracts, false);
        assert!(!t.is_pending(Collection::Contracts));

        // Clear before set never leaves a stale flag behind either.
        t.set_pending(Collection::Customers, false);
        t.set_pending(Collection::Customers, true);
        t.set_pending(Collection::Customers, true);
        assert!(t.is_pending(Collection::Customers));
        t.set_pending(Collection::Customers, false);
        assert!(!t.has_pending());
    }

    #[test]
    fn offline_is_visible_without_pending_writes() {
        let t = SyncTracker::new();
        t.set_online(false);
        assert_eq!(t.indicator(), SyncIndicator::Offline);

        t.set_pending(Collection::Events, true);
        assert_eq!(t.indicator(), SyncIndicator::Unsynced);

        t.set_online(true);
        assert_eq!(t.indicator(), SyncIndicator::Syncing);
    }

    #[tokio::test]
    async fn subscribers_only_wake_on_indicator_change() {
        let t = SyncTracker::new();
        let mut rx = t.subscribe();

        t.set_pending(Collection::Events, true);
        rx.changed().await.ok();
        assert_eq!(*rx.borrow_and_update(), SyncIndicator::Syncing);

        // A second pending key keeps the indicator the same.
        t.set_pending(Collection::Services, true);
        assert!(!rx.has_changed().unwrap_or(true));
    }
}
