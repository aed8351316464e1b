#![allow(clippy::unwrap_used)]
// End-to-end command tests for a Local Mode session.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

use goldfin_api::TransportConfig;
use goldfin_core::{
    Collection, Command, CommandResult, ContractStatus, CoreError, Customer, Event,
    FirestoreConnector, KeyValueStorage, MemoryStorage, Mode, NoCredentials, Proposal,
    ProposalStatus, RecordId, Session, StateChange, StateKey,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("goldfin_core=debug")
        .with_test_writer()
        .try_init();
}

async fn open(storage: Arc<MemoryStorage>) -> Session {
    init_tracing();
    let connector = FirestoreConnector::new(TransportConfig::default(), Duration::from_secs(5));
    let storage: Arc<dyn KeyValueStorage> = storage;
    Session::open_with(storage, &NoCredentials, &connector).await
}

async fn fresh() -> Session {
    open(Arc::new(MemoryStorage::new())).await
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn proposal(name: &str, status: ProposalStatus) -> Proposal {
    Proposal {
        name: name.into(),
        status,
        notes: format!("{name} notes"),
        ..Proposal::default()
    }
}

async fn create_event(session: &Session, customer_id: Option<RecordId>, proposals: Vec<Proposal>) -> RecordId {
    let event = Event {
        client_name: "Harbor Gala".into(),
        customer_id,
        event_date: Some("2025-06-14".into()),
        proposals,
        extra: fields(json!({
            "eventLocation": "Pier 9",
            "guestCount": 120,
            "eventDescription": "Summer fundraiser",
        })),
        ..Event::default()
    };
    let result = session
        .execute(Command::CreateEvent { event })
        .await
        .unwrap();
    result.created_id().unwrap().clone()
}

/// An event with one approved proposal, plus the proposal id.
async fn approved_event(session: &Session) -> (RecordId, RecordId) {
    let event_id = create_event(session, None, vec![proposal("Option A", ProposalStatus::Approved)]).await;
    let proposal_id = session.state().record::<Event>(&event_id).unwrap().proposals[0]
        .id
        .clone();
    (event_id, proposal_id)
}

async fn generate(session: &Session, event_id: &RecordId, proposal_id: &RecordId) -> Result<RecordId, CoreError> {
    session
        .execute(Command::GenerateContract {
            event_id: event_id.clone(),
            proposal_id: proposal_id.clone(),
        })
        .await
        .map(|r| r.created_id().unwrap().clone())
}

// ── Mode and seeding ────────────────────────────────────────────────

#[tokio::test]
async fn opens_in_local_mode_with_sample_libraries() {
    let session = fresh().await;
    assert_eq!(session.mode(), Mode::Local);
    assert!(session.notice().is_none());
    assert!(!session.state().customers().is_empty());
    assert!(!session.state().menu_items().is_empty());
    assert!(session.state().events().is_empty());
    assert!(session.state().contracts().is_empty());
}

#[tokio::test]
async fn wipe_suppresses_seeding_until_samples_are_regenerated() {
    let storage = Arc::new(MemoryStorage::new());
    let session = open(Arc::clone(&storage)).await;
    create_event(&session, None, Vec::new()).await;

    session.wipe_all_data().await.unwrap();
    assert!(session.state().customers().is_empty());
    assert!(session.state().events().is_empty());
    assert!(session.local().load::<Customer>().is_empty());

    session.regenerate_samples().await.unwrap();
    assert!(!session.state().customers().is_empty());
    assert!(session.state().events().is_empty());
}

#[tokio::test]
async fn writes_survive_reopening() {
    let storage = Arc::new(MemoryStorage::new());
    let first = open(Arc::clone(&storage)).await;
    let id = create_event(&first, None, Vec::new()).await;
    assert!(id.as_str().starts_with("evt_"));

    let second = open(storage).await;
    let event = second.state().record::<Event>(&id).unwrap();
    assert_eq!(event.client_name, "Harbor Gala");
}

// ── Notification ────────────────────────────────────────────────────

#[tokio::test]
async fn each_command_notifies_once() {
    let session = fresh().await;
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    session.state().on_state_change(move |change| {
        assert_eq!(change, StateChange::Key(StateKey::Collection(Collection::Events)));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let id = create_event(&session, None, Vec::new()).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    session
        .execute(Command::SetEventArchived { id, archived: true })
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

// ── Contracts ───────────────────────────────────────────────────────

#[tokio::test]
async fn contract_copies_event_and_proposal() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;
    let id = generate(&session, &event_id, &proposal_id).await.unwrap();

    let contract = session.state().contracts()[0].clone();
    assert_eq!(contract.id, id);
    assert_eq!(contract.contract_id.as_ref(), Some(&id));
    assert_eq!(contract.status, ContractStatus::Sent);
    assert_eq!(contract.name, "Option A");
    assert_eq!(contract.notes, "Option A notes");
    assert_eq!(contract.client_name, "Harbor Gala");
    assert_eq!(contract.extra.get("eventLocation"), Some(&json!("Pier 9")));
    assert_eq!(contract.extra.get("guestCount"), Some(&json!(120)));
    assert!(contract.status_history.is_empty());
}

#[tokio::test]
async fn contract_walks_the_chain_and_back() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;
    let id = generate(&session, &event_id, &proposal_id).await.unwrap();

    for _ in 0..4 {
        session
            .execute(Command::AdvanceContract { id: id.clone() })
            .await
            .unwrap();
    }
    let at_end = session.execute(Command::AdvanceContract { id: id.clone() }).await;
    assert!(matches!(at_end, Err(CoreError::InvalidTransition { .. })));

    for _ in 0..4 {
        session
            .execute(Command::RevertContract { id: id.clone() })
            .await
            .unwrap();
    }
    let at_start = session.execute(Command::RevertContract { id: id.clone() }).await;
    assert!(matches!(at_start, Err(CoreError::InvalidTransition { .. })));

    let contract = session.state().contracts()[0].clone();
    assert_eq!(contract.status, ContractStatus::Sent);
    assert_eq!(contract.status_history.len(), 8);
    assert_eq!(contract.status_history[3].to, ContractStatus::PaidInFull);
    assert_eq!(contract.status_history[4].from, ContractStatus::PaidInFull);
}

#[tokio::test]
async fn second_contract_for_same_proposal_is_rejected() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;
    generate(&session, &event_id, &proposal_id).await.unwrap();

    let err = generate(&session, &event_id, &proposal_id).await.unwrap_err();
    assert_eq!(err.to_string(), "A contract already exists for this proposal.");
    assert_eq!(session.state().contracts().len(), 1);
}

#[tokio::test]
async fn event_with_contract_cannot_be_deleted() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;
    let contract_id = generate(&session, &event_id, &proposal_id).await.unwrap();

    let err = session
        .execute(Command::DeleteEvent { id: event_id.clone() })
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot delete this event because it has an associated contract. Please delete the contract first."
    );
    assert_eq!(session.state().events().len(), 1);

    session
        .execute(Command::DeleteContract { id: contract_id })
        .await
        .unwrap();
    session
        .execute(Command::DeleteEvent { id: event_id })
        .await
        .unwrap();
    assert!(session.state().events().is_empty());
}

#[tokio::test]
async fn archiving_an_event_archives_its_contract() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;
    generate(&session, &event_id, &proposal_id).await.unwrap();

    session
        .execute(Command::SetEventArchived {
            id: event_id.clone(),
            archived: true,
        })
        .await
        .unwrap();
    assert!(session.state().record::<Event>(&event_id).unwrap().is_archived);
    assert!(session.state().contracts()[0].is_archived);
}

// ── Proposals ───────────────────────────────────────────────────────

#[tokio::test]
async fn approved_proposal_with_contract_cannot_be_reverted() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;
    generate(&session, &event_id, &proposal_id).await.unwrap();

    let err = session
        .execute(Command::SetProposalStatus {
            event_id: event_id.clone(),
            proposal_id: proposal_id.clone(),
            status: ProposalStatus::Sent,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }));
    let event = session.state().record::<Event>(&event_id).unwrap();
    assert_eq!(event.proposals[0].status, ProposalStatus::Approved);
}

#[tokio::test]
async fn proposal_status_follows_the_state_machine() {
    let session = fresh().await;
    let event_id = create_event(&session, None, vec![proposal("Only", ProposalStatus::Draft)]).await;
    let proposal_id = session.state().record::<Event>(&event_id).unwrap().proposals[0]
        .id
        .clone();
    let set = |status| Command::SetProposalStatus {
        event_id: event_id.clone(),
        proposal_id: proposal_id.clone(),
        status,
    };

    let skip = session.execute(set(ProposalStatus::Approved)).await;
    assert!(matches!(skip, Err(CoreError::InvalidTransition { .. })));

    session.execute(set(ProposalStatus::Sent)).await.unwrap();
    session.execute(set(ProposalStatus::Approved)).await.unwrap();
    // No contract yet, so reverting is allowed.
    session.execute(set(ProposalStatus::Sent)).await.unwrap();
    let event = session.state().record::<Event>(&event_id).unwrap();
    assert_eq!(event.proposals[0].status, ProposalStatus::Sent);
    assert_eq!(event.derived_status(), ProposalStatus::Sent);
}

#[tokio::test]
async fn proposals_duplicate_and_reorder() {
    let session = fresh().await;
    let event_id = create_event(
        &session,
        None,
        vec![
            proposal("First", ProposalStatus::Sent),
            proposal("Second", ProposalStatus::Draft),
        ],
    )
    .await;
    let first_id = session.state().record::<Event>(&event_id).unwrap().proposals[0]
        .id
        .clone();

    let result = session
        .execute(Command::DuplicateProposal {
            event_id: event_id.clone(),
            proposal_id: first_id,
        })
        .await
        .unwrap();
    let CommandResult::ProposalCreated { proposal_id: copy_id, .. } = result else {
        panic!("expected a new proposal, got {result:?}");
    };

    session
        .execute(Command::MoveProposal {
            event_id: event_id.clone(),
            from: 2,
            to: 0,
        })
        .await
        .unwrap();

    let event = session.state().record::<Event>(&event_id).unwrap();
    let names: Vec<&str> = event.proposals.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["First (Copy)", "First", "Second"]);
    assert_eq!(event.proposals[0].id, copy_id);
    assert_eq!(event.proposals[0].status, ProposalStatus::Draft);
    let orders: Vec<Option<usize>> = event.proposals.iter().map(|p| p.sort_order).collect();
    assert_eq!(orders, [Some(0), Some(1), Some(2)]);

    let out_of_range = session
        .execute(Command::MoveProposal {
            event_id,
            from: 5,
            to: 0,
        })
        .await;
    assert!(matches!(out_of_range, Err(CoreError::Rejected { .. })));
}

#[tokio::test]
async fn template_from_proposal_falls_back_to_business_terms() {
    let session = fresh().await;
    let (event_id, proposal_id) = approved_event(&session).await;

    session
        .execute(Command::CreateTemplateFromProposal {
            event_id,
            proposal_id,
            name: "  Gala package ".into(),
        })
        .await
        .unwrap();

    let template = session.state().templates()[0].clone();
    assert_eq!(template.name, "Gala package");
    assert_eq!(template.notes, "Option A notes");
    assert_eq!(
        template.terms_and_conditions.as_deref(),
        Some(session.state().business_details().terms_and_conditions.as_str())
    );
    assert_eq!(template.extra.get("guestCount"), Some(&json!(120)));
}

// ── Customers ───────────────────────────────────────────────────────

#[tokio::test]
async fn linked_customer_cannot_be_deleted() {
    let session = fresh().await;
    let customer_id = session
        .execute(Command::UpsertCustomer {
            customer: Customer {
                name: "Ada".into(),
                ..Customer::default()
            },
        })
        .await
        .unwrap()
        .created_id()
        .unwrap()
        .clone();
    create_event(&session, Some(customer_id.clone()), Vec::new()).await;

    let err = session
        .execute(Command::DeleteCustomer { id: customer_id.clone() })
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot delete customer. They are associated with 1 event(s) and 0 contract(s). Please remove them from these items first."
    );
    assert!(session.state().record::<Customer>(&customer_id).is_some());
}

// ── Backup ──────────────────────────────────────────────────────────

#[tokio::test]
async fn export_then_import_into_another_session() {
    let source = fresh().await;
    let (event_id, proposal_id) = approved_event(&source).await;
    generate(&source, &event_id, &proposal_id).await.unwrap();
    let backup = source.export().unwrap();
    assert_eq!(backup["version"], json!(1));

    let target = fresh().await;
    target.wipe_all_data().await.unwrap();
    target.import(&backup).await.unwrap();

    assert_eq!(target.state().events().len(), 1);
    assert_eq!(target.state().contracts().len(), 1);
    assert_eq!(
        target.state().customers().len(),
        source.state().customers().len()
    );
    assert_eq!(
        target.local().load::<Event>()[0].id,
        event_id,
        "import must persist locally"
    );
}

#[tokio::test]
async fn newer_backup_is_rejected_without_changes() {
    let session = fresh().await;
    create_event(&session, None, Vec::new()).await;

    let err = session
        .import(&json!({ "version": 7, "goldfin_events": [] }))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnsupportedBackupVersion { found: 7, .. }));
    assert_eq!(session.state().events().len(), 1);
}
