// ── Command API ──
//
// Every user-initiated write is a `Command` executed by
// `Session::execute`. Filters are plain state keys and are not commands.

use crate::model::{
    BusinessDetails, Collection, ConstraintTag, Contract, Customer, Event, MenuItem, Proposal,
    ProposalStatus, RecordId, Service, SymbolPaletteItem, Template,
};

#[derive(Debug, Clone)]
pub enum Command {
    // ── Events ───────────────────────────────────────────────────────
    CreateEvent {
        event: Event,
    },
    UpdateEvent {
        event: Event,
    },
    /// Rejected while any contract references the event.
    DeleteEvent {
        id: RecordId,
    },
    /// Also (un)archives the contract generated from the event.
    SetEventArchived {
        id: RecordId,
        archived: bool,
    },

    // ── Proposals ────────────────────────────────────────────────────
    AddProposal {
        event_id: RecordId,
        proposal: Proposal,
    },
    UpdateProposal {
        event_id: RecordId,
        proposal: Proposal,
    },
    DuplicateProposal {
        event_id: RecordId,
        proposal_id: RecordId,
    },
    DeleteProposal {
        event_id: RecordId,
        proposal_id: RecordId,
    },
    /// Move the proposal at display position `from` to `to`.
    MoveProposal {
        event_id: RecordId,
        from: usize,
        to: usize,
    },
    SetProposalStatus {
        event_id: RecordId,
        proposal_id: RecordId,
        status: ProposalStatus,
    },

    // ── Contracts ────────────────────────────────────────────────────
    GenerateContract {
        event_id: RecordId,
        proposal_id: RecordId,
    },
    AdvanceContract {
        id: RecordId,
    },
    RevertContract {
        id: RecordId,
    },
    UpdateContract {
        contract: Contract,
    },
    DeleteContract {
        id: RecordId,
    },

    // ── Templates ────────────────────────────────────────────────────
    CreateTemplate {
        template: Template,
    },
    CreateTemplateFromProposal {
        event_id: RecordId,
        proposal_id: RecordId,
        name: String,
    },
    UpdateTemplate {
        template: Template,
    },
    DuplicateTemplate {
        id: RecordId,
    },
    DeleteTemplate {
        id: RecordId,
    },

    // ── Customers ────────────────────────────────────────────────────
    UpsertCustomer {
        customer: Customer,
    },
    /// Rejected while any event or contract references the customer.
    DeleteCustomer {
        id: RecordId,
    },

    // ── Libraries ────────────────────────────────────────────────────
    UpsertMenuItem {
        item: MenuItem,
    },
    DeleteMenuItem {
        id: RecordId,
    },
    UpsertService {
        service: Service,
    },
    DeleteService {
        id: RecordId,
    },
    UpsertConstraintTag {
        tag: ConstraintTag,
    },
    DeleteConstraintTag {
        id: RecordId,
    },
    UpsertSymbol {
        symbol: SymbolPaletteItem,
    },
    DeleteSymbol {
        id: RecordId,
    },

    // ── Settings ─────────────────────────────────────────────────────
    SaveBusinessDetails {
        details: BusinessDetails,
    },
}

/// Result of executing a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// A record was created. In Cloud Mode `id` is the store-assigned id
    /// once the remote create succeeded.
    Created { collection: Collection, id: RecordId },
    /// A proposal was added to an event.
    ProposalCreated {
        event_id: RecordId,
        proposal_id: RecordId,
    },
}

impl CommandResult {
    /// The id of whatever was created, if anything.
    pub fn created_id(&self) -> Option<&RecordId> {
        match self {
            Self::Ok => None,
            Self::Created { id, .. } => Some(id),
            Self::ProposalCreated { proposal_id, .. } => Some(proposal_id),
        }
    }
}
