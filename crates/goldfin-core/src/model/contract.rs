// ── Contracts ──
//
// A contract is a point-in-time copy of an event plus one of its proposals.
// It keeps `eventId`/`proposalId` for traceability but is never updated
// from them afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Collection, MenuLine, Record, RecordId};

/// Contract lifecycle, in forward order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractStatus {
    #[default]
    Sent,
    Accepted,
    #[serde(rename = "Deposit Paid")]
    DepositPaid,
    Completed,
    /// Older data spells this `"Paid"`; it is normalized on load.
    #[serde(rename = "Paid In Full", alias = "Paid")]
    PaidInFull,
}

impl ContractStatus {
    pub const ALL: [Self; 5] = [
        Self::Sent,
        Self::Accepted,
        Self::DepositPaid,
        Self::Completed,
        Self::PaidInFull,
    ];

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Sent => Some(Self::Accepted),
            Self::Accepted => Some(Self::DepositPaid),
            Self::DepositPaid => Some(Self::Completed),
            Self::Completed => Some(Self::PaidInFull),
            Self::PaidInFull => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            Self::Sent => None,
            Self::Accepted => Some(Self::Sent),
            Self::DepositPaid => Some(Self::Accepted),
            Self::Completed => Some(Self::DepositPaid),
            Self::PaidInFull => Some(Self::Completed),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "Sent",
            Self::Accepted => "Accepted",
            Self::DepositPaid => "Deposit Paid",
            Self::Completed => "Completed",
            Self::PaidInFull => "Paid In Full",
        }
    }
}

/// One entry of a contract's append-only status log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ContractStatus,
    pub to: ContractStatus,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub id: RecordId,
    /// Legacy duplicate of `id` written by local mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<RecordId>,
    #[serde(default)]
    pub event_id: RecordId,
    #[serde(default)]
    pub proposal_id: RecordId,
    #[serde(default)]
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    /// Name of the proposal this contract was generated from.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub menu_items: Vec<MenuLine>,
    #[serde(default)]
    pub services: Vec<Value>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contract {
    /// Move to `to`, appending the transition to the status log.
    pub fn transition(&mut self, to: ContractStatus, at: DateTime<Utc>) {
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            date: at,
        });
        self.status = to;
    }

    /// Whether this contract was generated from the given event/proposal pair.
    pub fn references(&self, event_id: &RecordId, proposal_id: &RecordId) -> bool {
        &self.event_id == event_id && &self.proposal_id == proposal_id
    }
}

impl Record for Contract {
    const COLLECTION: Collection = Collection::Contracts;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn legacy_paid_is_normalized() {
        let c: Contract =
            serde_json::from_value(json!({ "id": "cont_1", "status": "Paid" })).unwrap();
        assert_eq!(c.status, ContractStatus::PaidInFull);
        assert_eq!(serde_json::to_value(c.status).unwrap(), json!("Paid In Full"));
    }

    #[test]
    fn missing_status_is_sent() {
        let c: Contract = serde_json::from_value(json!({ "id": "cont_1" })).unwrap();
        assert_eq!(c.status, ContractStatus::Sent);
        assert!(c.status_history.is_empty());
    }

    #[test]
    fn chain_is_linear() {
        let mut status = ContractStatus::Sent;
        let mut walked = vec![status];
        while let Some(next) = status.next() {
            walked.push(next);
            status = next;
        }
        assert_eq!(walked, ContractStatus::ALL);
        for pair in ContractStatus::ALL.windows(2) {
            assert_eq!(pair[1].previous(), Some(pair[0]));
        }
    }

    #[test]
    fn transition_appends_history() {
        let mut c = Contract::default();
        let now = Utc::now();
        c.transition(ContractStatus::Accepted, now);
        c.transition(ContractStatus::Sent, now);
        assert_eq!(c.status, ContractStatus::Sent);
        assert_eq!(c.status_history.len(), 2);
        assert_eq!(c.status_history[0].from, ContractStatus::Sent);
        assert_eq!(c.status_history[0].to, ContractStatus::Accepted);
        assert_eq!(c.status_history[1].to, ContractStatus::Sent);
    }
}
