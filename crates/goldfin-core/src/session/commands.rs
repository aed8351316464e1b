// ── Command routing ──
//
// Each handler runs its soft-invariant pre-checks against the current
// in-memory state, computes the next collection value and hands it to
// `Session::apply`. A rejected command leaves state untouched.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use super::{Session, Write};
use crate::command::{Command, CommandResult};
use crate::error::CoreError;
use crate::model::{
    BusinessDetails, ConstraintTag, Contract, ContractStatus, Customer, Event, MenuItem, Proposal,
    ProposalStatus, Record, RecordId, Service, SymbolPaletteItem, Template,
};
use crate::store::Stored;

/// Event form fields carried onto a generated contract.
const CONTRACT_EVENT_FIELDS: &[&str] = &[
    "eventLocation",
    "eventDescription",
    "eventStartTime",
    "eventDuration",
    "preEventDuration",
    "postEventDuration",
    "guestCount",
    "constraints",
    "termsAndConditions",
];

const PROPOSAL_ID_PREFIX: &str = "prop";

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn created<T: Record>(id: Option<RecordId>) -> CommandResult {
    match id {
        Some(id) => CommandResult::Created {
            collection: T::COLLECTION,
            id,
        },
        None => CommandResult::Ok,
    }
}

fn proposal_not_found(id: &RecordId) -> CoreError {
    CoreError::not_found("proposal", id)
}

/// Proposals in display order, renumbered from zero.
fn normalize_order(event: &mut Event) {
    // Stable: unnumbered proposals keep their array position after numbered ones.
    event
        .proposals
        .sort_by_key(|p| p.sort_order.unwrap_or(usize::MAX));
    event.renumber_proposals();
}

impl Session {
    #[allow(clippy::too_many_lines)]
    pub(super) async fn route_command(&self, command: Command) -> Result<CommandResult, CoreError> {
        match command {
            // ── Events ──
            Command::CreateEvent { event } => self.create_event(event).await,
            Command::UpdateEvent { mut event } => {
                event.updated_at = Some(now_iso());
                self.replace(event).await
            }
            Command::DeleteEvent { id } => self.delete_event(&id).await,
            Command::SetEventArchived { id, archived } => self.set_event_archived(&id, archived).await,

            // ── Proposals ──
            Command::AddProposal { event_id, proposal } => self.add_proposal(&event_id, proposal).await,
            Command::UpdateProposal { event_id, proposal } => {
                self.modify_event(&event_id, |event| {
                    let slot = event
                        .proposal_mut(&proposal.id)
                        .ok_or_else(|| proposal_not_found(&proposal.id))?;
                    let sort_order = proposal.sort_order.or(slot.sort_order);
                    *slot = Proposal {
                        sort_order,
                        ..proposal
                    };
                    Ok(CommandResult::Ok)
                })
                .await
            }
            Command::DuplicateProposal {
                event_id,
                proposal_id,
            } => self.duplicate_proposal(&event_id, &proposal_id).await,
            Command::DeleteProposal {
                event_id,
                proposal_id,
            } => {
                self.modify_event(&event_id, |event| {
                    let before = event.proposals.len();
                    event.proposals.retain(|p| p.id != proposal_id);
                    if event.proposals.len() == before {
                        return Err(proposal_not_found(&proposal_id));
                    }
                    normalize_order(event);
                    Ok(CommandResult::Ok)
                })
                .await
            }
            Command::MoveProposal { event_id, from, to } => {
                self.modify_event(&event_id, |event| {
                    let len = event.proposals.len();
                    if from >= len || to >= len {
                        return Err(CoreError::rejected(format!(
                            "Cannot move proposal from position {from} to {to}: the event has {len} proposal(s)."
                        )));
                    }
                    normalize_order(event);
                    let moved = event.proposals.remove(from);
                    event.proposals.insert(to, moved);
                    event.renumber_proposals();
                    Ok(CommandResult::Ok)
                })
                .await
            }
            Command::SetProposalStatus {
                event_id,
                proposal_id,
                status,
            } => self.set_proposal_status(&event_id, &proposal_id, status).await,

            // ── Contracts ──
            Command::GenerateContract {
                event_id,
                proposal_id,
            } => self.generate_contract(&event_id, &proposal_id).await,
            Command::AdvanceContract { id } => self.step_contract(&id, true).await,
            Command::RevertContract { id } => self.step_contract(&id, false).await,
            Command::UpdateContract { contract } => self.replace(contract).await,
            Command::DeleteContract { id } => self.remove::<Contract>(&id).await,

            // ── Templates ──
            Command::CreateTemplate { mut template } => {
                template.created_at.get_or_insert_with(now_iso);
                self.insert(template).await
            }
            Command::CreateTemplateFromProposal {
                event_id,
                proposal_id,
                name,
            } => self.template_from_proposal(&event_id, &proposal_id, &name).await,
            Command::UpdateTemplate { template } => self.replace(template).await,
            Command::DuplicateTemplate { id } => {
                let source = self
                    .inner
                    .state
                    .record::<Template>(&id)
                    .ok_or_else(|| CoreError::not_found("template", &id))?;
                let copy = Template {
                    id: RecordId::default(),
                    name: format!("{} (Copy)", source.name),
                    created_at: Some(now_iso()),
                    ..Template::clone(&source)
                };
                self.insert(copy).await
            }
            Command::DeleteTemplate { id } => self.remove::<Template>(&id).await,

            // ── Customers ──
            Command::UpsertCustomer { customer } => self.upsert(customer).await,
            Command::DeleteCustomer { id } => self.delete_customer(&id).await,

            // ── Libraries ──
            Command::UpsertMenuItem { item } => self.upsert(item).await,
            Command::DeleteMenuItem { id } => self.remove::<MenuItem>(&id).await,
            Command::UpsertService { service } => self.upsert(service).await,
            Command::DeleteService { id } => self.remove::<Service>(&id).await,
            Command::UpsertConstraintTag { tag } => self.upsert(tag).await,
            Command::DeleteConstraintTag { id } => self.remove::<ConstraintTag>(&id).await,
            Command::UpsertSymbol { symbol } => self.upsert(symbol).await,
            Command::DeleteSymbol { id } => self.remove::<SymbolPaletteItem>(&id).await,

            // ── Settings ──
            Command::SaveBusinessDetails { details } => self.save_business_details(details).await,
        }
    }

    // ── Generic record operations ────────────────────────────────────

    async fn insert<T: Stored>(&self, mut record: T) -> Result<CommandResult, CoreError> {
        record.ensure_id();
        let mut next = self.inner.state.records_owned::<T>();
        next.push(record.clone());
        let id = self.apply(next, vec![Write::Insert(record)]).await?;
        Ok(created::<T>(id))
    }

    async fn replace<T: Stored>(&self, record: T) -> Result<CommandResult, CoreError> {
        let mut next = self.inner.state.records_owned::<T>();
        let slot = next
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| CoreError::not_found(T::COLLECTION.remote_name(), record.id()))?;
        *slot = record.clone();
        self.apply(next, vec![Write::Update(record)]).await?;
        Ok(CommandResult::Ok)
    }

    async fn upsert<T: Stored>(&self, record: T) -> Result<CommandResult, CoreError> {
        let exists = !record.id().is_empty() && self.inner.state.record::<T>(record.id()).is_some();
        if exists {
            self.replace(record).await
        } else {
            self.insert(record).await
        }
    }

    async fn remove<T: Stored>(&self, id: &RecordId) -> Result<CommandResult, CoreError> {
        let mut next = self.inner.state.records_owned::<T>();
        let before = next.len();
        next.retain(|r| r.id() != id);
        if next.len() == before {
            return Err(CoreError::not_found(T::COLLECTION.remote_name(), id));
        }
        self.apply(next, vec![Write::Delete(id.clone())]).await?;
        Ok(CommandResult::Ok)
    }

    /// Edit one event in place and write it back.
    async fn modify_event<F>(&self, event_id: &RecordId, edit: F) -> Result<CommandResult, CoreError>
    where
        F: FnOnce(&mut Event) -> Result<CommandResult, CoreError>,
    {
        let mut next = self.inner.state.records_owned::<Event>();
        let event = next
            .iter_mut()
            .find(|e| &e.id == event_id)
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        let result = edit(event)?;
        event.updated_at = Some(now_iso());
        let updated = event.clone();
        self.apply(next, vec![Write::Update(updated)]).await?;
        Ok(result)
    }

    fn has_contract_for_event(&self, event_id: &RecordId) -> bool {
        self.inner
            .state
            .contracts()
            .iter()
            .any(|c| &c.event_id == event_id)
    }

    // ── Events ───────────────────────────────────────────────────────

    async fn create_event(&self, mut event: Event) -> Result<CommandResult, CoreError> {
        for proposal in &mut event.proposals {
            if proposal.id.is_empty() {
                proposal.id = RecordId::generate(PROPOSAL_ID_PREFIX);
            }
        }
        normalize_order(&mut event);
        let now = now_iso();
        event.created_at.get_or_insert_with(|| now.clone());
        event.updated_at = Some(now);
        self.insert(event).await
    }

    async fn delete_event(&self, id: &RecordId) -> Result<CommandResult, CoreError> {
        if self.has_contract_for_event(id) {
            return Err(CoreError::rejected(
                "Cannot delete this event because it has an associated contract. Please delete the contract first.",
            ));
        }
        self.remove::<Event>(id).await
    }

    async fn set_event_archived(&self, id: &RecordId, archived: bool) -> Result<CommandResult, CoreError> {
        self.modify_event(id, |event| {
            event.is_archived = archived;
            Ok(CommandResult::Ok)
        })
        .await?;

        let mut contracts = self.inner.state.records_owned::<Contract>();
        let mut writes = Vec::new();
        for contract in contracts.iter_mut().filter(|c| &c.event_id == id) {
            contract.is_archived = archived;
            writes.push(Write::Update(contract.clone()));
        }
        if !writes.is_empty() {
            self.apply(contracts, writes).await?;
        }
        debug!(event = %id, archived, "archive flag updated");
        Ok(CommandResult::Ok)
    }

    // ── Proposals ────────────────────────────────────────────────────

    async fn add_proposal(&self, event_id: &RecordId, mut proposal: Proposal) -> Result<CommandResult, CoreError> {
        self.modify_event(event_id, |event| {
            if proposal.id.is_empty() || event.proposal(&proposal.id).is_some() {
                proposal.id = RecordId::generate(PROPOSAL_ID_PREFIX);
            }
            normalize_order(event);
            proposal.sort_order = Some(event.proposals.len());
            let proposal_id = proposal.id.clone();
            event.proposals.push(proposal);
            Ok(CommandResult::ProposalCreated {
                event_id: event.id.clone(),
                proposal_id,
            })
        })
        .await
    }

    async fn duplicate_proposal(&self, event_id: &RecordId, proposal_id: &RecordId) -> Result<CommandResult, CoreError> {
        self.modify_event(event_id, |event| {
            let source = event
                .proposal(proposal_id)
                .ok_or_else(|| proposal_not_found(proposal_id))?;
            let copy = Proposal {
                id: RecordId::generate(PROPOSAL_ID_PREFIX),
                name: format!("{} (Copy)", source.name),
                status: ProposalStatus::Draft,
                sort_order: None,
                ..source.clone()
            };
            let new_id = copy.id.clone();
            normalize_order(event);
            event.proposals.push(copy);
            event.renumber_proposals();
            Ok(CommandResult::ProposalCreated {
                event_id: event.id.clone(),
                proposal_id: new_id,
            })
        })
        .await
    }

    async fn set_proposal_status(
        &self,
        event_id: &RecordId,
        proposal_id: &RecordId,
        status: ProposalStatus,
    ) -> Result<CommandResult, CoreError> {
        let event = self
            .inner
            .state
            .record::<Event>(event_id)
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        let current = event
            .proposal(proposal_id)
            .ok_or_else(|| proposal_not_found(proposal_id))?
            .status;

        if current == status {
            return Ok(CommandResult::Ok);
        }
        if !current.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                entity_type: "proposal",
                from: current.as_str().into(),
                to: status.as_str().into(),
            });
        }
        let has_contract = self
            .inner
            .state
            .contracts()
            .iter()
            .any(|c| c.references(event_id, proposal_id));
        if current == ProposalStatus::Approved && has_contract {
            return Err(CoreError::rejected(
                "Cannot revert this proposal because a contract has already been generated from it.",
            ));
        }

        self.modify_event(event_id, |event| {
            let proposal = event
                .proposal_mut(proposal_id)
                .ok_or_else(|| proposal_not_found(proposal_id))?;
            proposal.status = status;
            Ok(CommandResult::Ok)
        })
        .await
    }

    // ── Contracts ────────────────────────────────────────────────────

    async fn generate_contract(&self, event_id: &RecordId, proposal_id: &RecordId) -> Result<CommandResult, CoreError> {
        let duplicate = self
            .inner
            .state
            .contracts()
            .iter()
            .any(|c| c.references(event_id, proposal_id));
        if duplicate {
            return Err(CoreError::rejected("A contract already exists for this proposal."));
        }

        let event = self
            .inner
            .state
            .record::<Event>(event_id)
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        let proposal = event
            .proposal(proposal_id)
            .ok_or_else(|| proposal_not_found(proposal_id))?;

        let id = RecordId::generate(Contract::COLLECTION.id_prefix());
        let extra = CONTRACT_EVENT_FIELDS
            .iter()
            .filter_map(|key| event.field(key).map(|v| ((*key).to_owned(), v.clone())))
            .collect();
        let contract = Contract {
            // Cloud ids are store-assigned; only local contracts carry the legacy copy.
            contract_id: (!self.is_cloud()).then(|| id.clone()),
            id,
            event_id: event.id.clone(),
            proposal_id: proposal.id.clone(),
            client_name: event.client_name.clone(),
            customer_id: event.customer_id.clone(),
            event_date: event.event_date.clone(),
            name: proposal.name.clone(),
            menu_items: proposal.menu_items.clone(),
            services: proposal.services.clone(),
            notes: proposal.notes.clone(),
            contract_date: Some(Utc::now()),
            status: ContractStatus::Sent,
            status_history: Vec::new(),
            is_archived: false,
            extra,
        };
        self.insert(contract).await
    }

    async fn step_contract(&self, id: &RecordId, forward: bool) -> Result<CommandResult, CoreError> {
        let mut next = self.inner.state.records_owned::<Contract>();
        let contract = next
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| CoreError::not_found("contract", id))?;

        let target = if forward {
            contract.status.next()
        } else {
            contract.status.previous()
        };
        let Some(target) = target else {
            return Err(CoreError::InvalidTransition {
                entity_type: "contract",
                from: contract.status.as_str().into(),
                to: if forward { "a later status" } else { "an earlier status" }.into(),
            });
        };

        contract.transition(target, Utc::now());
        let updated = contract.clone();
        self.apply(next, vec![Write::Update(updated)]).await?;
        Ok(CommandResult::Ok)
    }

    // ── Templates ────────────────────────────────────────────────────

    async fn template_from_proposal(
        &self,
        event_id: &RecordId,
        proposal_id: &RecordId,
        name: &str,
    ) -> Result<CommandResult, CoreError> {
        let name = name.trim().to_owned();
        if name.is_empty() {
            return Err(CoreError::rejected("Template name is required."));
        }
        let event = self
            .inner
            .state
            .record::<Event>(event_id)
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        let proposal = event
            .proposal(proposal_id)
            .ok_or_else(|| proposal_not_found(proposal_id))?;

        let terms = proposal
            .extra
            .get("termsAndConditions")
            .and_then(Value::as_str)
            .map_or_else(
                || self.inner.state.business_details().terms_and_conditions.clone(),
                str::to_owned,
            );
        let mut extra = serde_json::Map::new();
        extra.insert(
            "eventDescription".into(),
            event
                .field("eventDescription")
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
        );
        extra.insert(
            "guestCount".into(),
            event.field("guestCount").cloned().unwrap_or_else(|| Value::from(0)),
        );

        let template = Template {
            id: RecordId::default(),
            name,
            menu_items: proposal.menu_items.clone(),
            services: proposal.services.clone(),
            notes: proposal.notes.clone(),
            terms_and_conditions: Some(terms),
            created_at: Some(now_iso()),
            extra,
        };
        self.insert(template).await
    }

    // ── Customers ────────────────────────────────────────────────────

    async fn delete_customer(&self, id: &RecordId) -> Result<CommandResult, CoreError> {
        let linked = Some(id);
        let events = self
            .inner
            .state
            .events()
            .iter()
            .filter(|e| e.customer_id.as_ref() == linked)
            .count();
        let contracts = self
            .inner
            .state
            .contracts()
            .iter()
            .filter(|c| c.customer_id.as_ref() == linked)
            .count();
        if events > 0 || contracts > 0 {
            return Err(CoreError::rejected(format!(
                "Cannot delete customer. They are associated with {events} event(s) and {contracts} contract(s). Please remove them from these items first."
            )));
        }
        self.remove::<Customer>(id).await
    }

    // ── Settings ─────────────────────────────────────────────────────

    async fn save_business_details(&self, details: BusinessDetails) -> Result<CommandResult, CoreError> {
        match &self.inner.remote {
            None => {
                self.inner.local.save_business_details(&details)?;
                self.inner.state.set_business_details(details);
            }
            Some(remote) => {
                self.inner.state.set_business_details(details.clone());
                if let Err(e) = remote.save_settings(&details).await {
                    debug!(error = %e, "remote settings save not confirmed");
                }
            }
        }
        Ok(CommandResult::Ok)
    }
}
