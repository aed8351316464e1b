// ── Single-key reactive cell ──
//
// Holds the current snapshot of one collection behind a `watch` channel.
// Writers always replace the whole collection; readers get a cheap `Arc`.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{Record, RecordId};
use crate::stream::{CollectionStream, Snapshot};

#[doc(hidden)]
pub struct RecordSlot<T: Record> {
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Record> RecordSlot<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { snapshot }
    }

    /// Replace the collection wholesale. The new value is readable before
    /// this returns.
    pub(crate) fn replace(&self, items: Vec<T>) {
        let values: Vec<Arc<T>> = items.into_iter().map(Arc::new).collect();
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(Arc::new(values));
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Owned copy of every record, for building the next value.
    pub(crate) fn to_vec(&self) -> Vec<T> {
        self.snapshot.borrow().iter().map(|r| T::clone(r)).collect()
    }

    pub(crate) fn get(&self, id: &RecordId) -> Option<Arc<T>> {
        self.snapshot
            .borrow()
            .iter()
            .find(|r| r.id() == id)
            .map(Arc::clone)
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub(crate) fn subscribe(&self) -> CollectionStream<T> {
        CollectionStream::new(self.snapshot.subscribe())
    }
}
