#![allow(clippy::unwrap_used)]
// Integration tests for `FirestoreClient` using wiremock.

use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use url::Url;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use goldfin_api::{BATCH_LIMIT, Error, FirestoreClient, Identity, RemoteCredentials, WriteOp};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FirestoreClient) {
    let server = MockServer::start().await;
    let mut creds = RemoteCredentials::new("demo-proj", SecretString::from("k3y")).unwrap();
    creds.base_url = Url::parse(&server.uri()).unwrap();
    let client = FirestoreClient::with_client(reqwest::Client::new(), creds);
    (server, client)
}

fn identity() -> Identity {
    Identity::new("u1", SecretString::from("tok"))
}

fn docs_path(suffix: &str) -> String {
    format!("/v1/projects/demo-proj/databases/(default)/documents/{suffix}")
}

fn wire_doc(collection: &str, id: &str, client_name: &str) -> Value {
    json!({
        "name": format!("projects/demo-proj/databases/(default)/documents/users/u1/{collection}/{id}"),
        "fields": {
            "clientName": { "stringValue": client_name },
            "guestCount": { "integerValue": "40" }
        }
    })
}

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

// ── Collection tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_documents_follows_pagination() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("users/u1/events")))
        .and(query_param("key", "k3y"))
        .and(query_param_is_missing("pageToken"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [wire_doc("events", "evt_1", "Ada")],
            "nextPageToken": "p2"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(docs_path("users/u1/events")))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [wire_doc("events", "evt_2", "Grace")]
        })))
        .mount(&server)
        .await;

    let docs = client.list_documents(&identity(), "events").await.unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "evt_1");
    assert_eq!(docs[1].data.get("clientName"), Some(&json!("Grace")));
    assert_eq!(docs[1].data.get("guestCount"), Some(&json!(40)));
}

#[tokio::test]
async fn test_list_empty_collection() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("users/u1/services")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let docs = client.list_documents(&identity(), "services").await.unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_create_document_returns_assigned_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(docs_path("users/u1/customers")))
        .and(body_partial_json(json!({
            "fields": { "name": { "stringValue": "The Family" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo-proj/databases/(default)/documents/users/u1/customers/AbC123",
            "fields": { "name": { "stringValue": "The Family" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client
        .create_document(&identity(), "customers", &obj(json!({ "name": "The Family" })))
        .await
        .unwrap();
    assert_eq!(id, "AbC123");
}

#[tokio::test]
async fn test_permission_denied_maps_to_error() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(docs_path("users/u1/events/evt_1")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "Missing or insufficient permissions.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    let result = client
        .set_document(&identity(), "events", "evt_1", &obj(json!({ "clientName": "Ada" })))
        .await;

    assert!(
        matches!(result, Err(Error::PermissionDenied { .. })),
        "expected PermissionDenied, got: {result:?}"
    );
}

#[tokio::test]
async fn test_delete_document_accepts_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path(docs_path("users/u1/menuItems/menu_1")))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete_document(&identity(), "menuItems", "menu_1")
        .await
        .unwrap();
}

// ── Commit tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_commit_sends_updates_and_deletes() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/demo-proj/databases/(default)/documents:commit",
        ))
        .and(body_partial_json(json!({
            "writes": [
                { "update": {
                    "name": "projects/demo-proj/databases/(default)/documents/users/u1/events/evt_1"
                } },
                { "delete": "projects/demo-proj/databases/(default)/documents/users/u1/events/evt_2" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}, {}] })))
        .expect(1)
        .mount(&server)
        .await;

    let writes = vec![
        WriteOp::Set {
            collection: "events".into(),
            id: "evt_1".into(),
            data: obj(json!({ "clientName": "Ada" })),
        },
        WriteOp::Delete {
            collection: "events".into(),
            id: "evt_2".into(),
        },
    ];
    client.commit(&identity(), &writes).await.unwrap();
}

#[tokio::test]
async fn test_commit_rejects_oversized_batch() {
    let (_server, client) = setup().await;

    let writes: Vec<WriteOp> = (0..=BATCH_LIMIT)
        .map(|i| WriteOp::Delete {
            collection: "events".into(),
            id: format!("evt_{i}"),
        })
        .collect();

    let result = client.commit(&identity(), &writes).await;
    assert!(matches!(
        result,
        Err(Error::BatchTooLarge { size, limit }) if size == BATCH_LIMIT + 1 && limit == BATCH_LIMIT
    ));
}

// ── Settings tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_load_settings_missing_user_doc() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("users/u1")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    assert_eq!(client.load_settings(&identity()).await.unwrap(), None);
}

#[tokio::test]
async fn test_load_settings_reads_business_details_field() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("users/u1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo-proj/databases/(default)/documents/users/u1",
            "fields": {
                "businessDetails": { "mapValue": { "fields": {
                    "businessName": { "stringValue": "GoldFin" },
                    "showDailyTotals": { "booleanValue": false }
                } } }
            }
        })))
        .mount(&server)
        .await;

    let settings = client.load_settings(&identity()).await.unwrap().unwrap();
    assert_eq!(settings.get("businessName"), Some(&json!("GoldFin")));
    assert_eq!(settings.get("showDailyTotals"), Some(&json!(false)));
}

#[tokio::test]
async fn test_save_settings_merges_single_field() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(docs_path("users/u1")))
        .and(query_param("updateMask.fieldPaths", "businessDetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo-proj/databases/(default)/documents/users/u1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .save_settings(&identity(), &obj(json!({ "businessName": "GoldFin" })))
        .await
        .unwrap();
}

// ── Probe tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_verify_treats_rules_denial_as_reachable() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("goldfin_probe/ping")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "denied", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    client.verify().await.unwrap();
}

#[tokio::test]
async fn test_verify_rejects_bad_api_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("goldfin_probe/ping")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    assert!(matches!(client.verify().await, Err(Error::InvalidApiKey)));
}

// ── Polling tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_collection_yields_initial_snapshot() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(docs_path("users/u1/contracts")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [wire_doc("contracts", "cont_1", "Ada")]
        })))
        .mount(&server)
        .await;

    let stream = client.poll_collection(identity(), "contracts".into(), Duration::from_millis(10));
    futures_util::pin_mut!(stream);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, "cont_1");

    // Unchanged data is not re-emitted.
    let again = tokio::time::timeout(Duration::from_millis(80), stream.next()).await;
    assert!(again.is_err(), "unchanged snapshot should not be yielded twice");
}
