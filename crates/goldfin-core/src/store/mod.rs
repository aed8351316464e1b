// ── Reactive state ──
//
// `AppState` owns the in-memory copy of every collection. `RecordSlot` is
// the per-collection cell it is built from.

mod slot;
mod state;

pub use state::{AppState, ObserverId, StateChange, StateKey, StateReset, Stored};
