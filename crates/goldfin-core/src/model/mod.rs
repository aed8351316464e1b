// ── Domain model ──
//
// Typed records for every persisted collection. Each struct keeps fields
// it does not model in a flattened `extra` map, so a load/save cycle never
// drops data written by the UI layer.

mod collection;
mod contract;
mod event;
mod library;
mod record_id;
mod settings;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use collection::{BUSINESS_DETAILS_KEY, Collection};
pub use contract::{Contract, ContractStatus, StatusChange};
pub use event::{Event, MenuLine, Proposal, ProposalStatus};
pub use library::{
    ConstraintTag, Customer, MenuItem, PricingType, Service, SymbolPaletteItem, Template,
};
pub use record_id::RecordId;
pub use settings::{BusinessDetails, DEFAULT_TERMS};

/// A member of one of the persisted collections.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &RecordId;

    fn set_id(&mut self, id: RecordId);

    /// Assign a fresh local id if none is set. Returns the id in effect.
    fn ensure_id(&mut self) -> RecordId {
        if self.id().is_empty() {
            self.set_id(RecordId::generate(Self::COLLECTION.id_prefix()));
        }
        self.id().clone()
    }
}

/// Split a record into its document id and stored fields.
///
/// The id is the document name on the remote side, so it is not stored
/// inside the document body.
pub fn to_document<T: Record>(record: &T) -> Result<(RecordId, Map<String, Value>), serde_json::Error> {
    let mut fields = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    fields.remove("id");
    Ok((record.id().clone(), fields))
}

/// Rebuild a record from a document id and its stored fields.
pub fn from_document<T: Record>(id: &str, mut fields: Map<String, Value>) -> Result<T, serde_json::Error> {
    fields.insert("id".into(), Value::String(id.to_owned()));
    serde_json::from_value(Value::Object(fields))
}
