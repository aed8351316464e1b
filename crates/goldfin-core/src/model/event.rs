// ── Events and their embedded proposals ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Collection, Record, RecordId};

/// Proposal lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    #[default]
    Draft,
    Sent,
    Approved,
}

impl ProposalStatus {
    /// Whether `self -> to` is an edge of the proposal state machine.
    ///
    /// `Approved -> Sent` is structurally allowed here; the caller must
    /// additionally check that no contract references the proposal.
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Sent)
                | (Self::Sent, Self::Approved)
                | (Self::Sent, Self::Draft)
                | (Self::Approved, Self::Sent)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Sent => "Sent",
            Self::Approved => "Approved",
        }
    }
}

/// One menu line inside a proposal, contract, or template.
///
/// Pricing and presentation fields ride along in `extra`; the core only
/// reads identity for reporting. Group headers carry an `itemType`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A priced option embedded in an [`Event`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ProposalStatus,
    #[serde(default)]
    pub menu_items: Vec<MenuLine>,
    #[serde(default)]
    pub services: Vec<Value>,
    #[serde(default)]
    pub notes: String,
    /// Persisted display order; independent of array position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A client booking with its candidate proposals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<RecordId>,
    /// Calendar date, normally `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Location, times, guest count, terms and other form fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn proposal(&self, id: &RecordId) -> Option<&Proposal> {
        self.proposals.iter().find(|p| &p.id == id)
    }

    pub fn proposal_mut(&mut self, id: &RecordId) -> Option<&mut Proposal> {
        self.proposals.iter_mut().find(|p| &p.id == id)
    }

    /// Renumber `sortOrder` to match the current list position.
    pub fn renumber_proposals(&mut self) {
        for (idx, proposal) in self.proposals.iter_mut().enumerate() {
            proposal.sort_order = Some(idx);
        }
    }

    /// Status derived from the embedded proposals: any Approved wins, then
    /// any Sent, otherwise Draft.
    pub fn derived_status(&self) -> ProposalStatus {
        if self
            .proposals
            .iter()
            .any(|p| p.status == ProposalStatus::Approved)
        {
            ProposalStatus::Approved
        } else if self.proposals.iter().any(|p| p.status == ProposalStatus::Sent) {
            ProposalStatus::Sent
        } else {
            ProposalStatus::Draft
        }
    }

    /// Read a free-form field (e.g. `guestCount`) kept in `extra`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

impl Record for Event {
    const COLLECTION: Collection = Collection::Events;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }
}
