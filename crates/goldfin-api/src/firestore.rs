// Firestore REST client
//
// Wraps `reqwest::Client` with per-user path construction, typed-value
// conversion, and the `{"error": {...}}` envelope. Everything above this
// module sees plain JSON objects keyed by document id.

use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{Identity, RemoteCredentials};
use crate::error::Error;
use crate::transport::TransportConfig;
use crate::value;

/// Maximum number of writes a single commit may carry.
pub const BATCH_LIMIT: usize = 500;

const PAGE_SIZE: u32 = 300;
const SETTINGS_FIELD: &str = "businessDetails";

/// A single stored document: its id plus plain-JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// One entry in an atomic commit.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Full overwrite of `users/{uid}/{collection}/{id}`.
    Set {
        collection: String,
        id: String,
        data: Map<String, Value>,
    },
    /// Removal of `users/{uid}/{collection}/{id}`.
    Delete { collection: String, id: String },
}

// ── Wire shapes ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl WireDocument {
    fn into_document(self) -> Result<Document, Error> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        let data = value::decode_fields(&self.fields)?;
        Ok(Document { id, data })
    }
}

/// HTTP client for one remote project.
///
/// Cheap to clone; the underlying connection pool and credentials are shared.
#[derive(Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    credentials: Arc<RemoteCredentials>,
}

impl FirestoreClient {
    pub fn new(credentials: RemoteCredentials, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, credentials: RemoteCredentials) -> Self {
        Self {
            http,
            credentials: Arc::new(credentials),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.credentials.project_id
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `projects/{p}/databases/(default)/documents`
    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.credentials.project_id
        )
    }

    /// Fully-qualified resource name, as used inside commit bodies.
    fn resource_name(&self, path: &str) -> String {
        format!("{}/{path}", self.database_path())
    }

    /// REST URL for a document or collection path, with the API key attached.
    fn document_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.credentials.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/v1/{}/{path}", self.database_path()))?;
        url.query_pairs_mut()
            .append_pair("key", self.credentials.api_key.expose_secret());
        Ok(url)
    }

    fn commit_url(&self) -> Result<Url, Error> {
        let base = self.credentials.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/v1/{}:commit", self.database_path()))?;
        url.query_pairs_mut()
            .append_pair("key", self.credentials.api_key.expose_secret());
        Ok(url)
    }

    fn user_path(uid: &str) -> String {
        format!("users/{uid}")
    }

    fn collection_path(uid: &str, collection: &str) -> String {
        format!("users/{uid}/{collection}")
    }

    fn doc_path(uid: &str, collection: &str, id: &str) -> String {
        format!("users/{uid}/{collection}/{id}")
    }

    fn authorize(
        builder: reqwest::RequestBuilder,
        identity: &Identity,
    ) -> reqwest::RequestBuilder {
        builder.bearer_auth(identity.id_token.expose_secret())
    }

    // ── Collections ──────────────────────────────────────────────────

    /// List every document in `users/{uid}/{collection}`, following pagination.
    pub async fn list_documents(
        &self,
        identity: &Identity,
        collection: &str,
    ) -> Result<Vec<Document>, Error> {
        let path = Self::collection_path(&identity.uid, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.document_url(&path)?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("pageSize", &PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }
            debug!(collection, "GET {path}");

            let resp = Self::authorize(self.http.get(url), identity)
                .send()
                .await?;
            let page: ListResponse = Self::parse(resp, &path).await?;

            for doc in page.documents {
                documents.push(doc.into_document()?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        trace!(collection, count = documents.len(), "listed documents");
        Ok(documents)
    }

    /// Create a document with a server-assigned id, returning that id.
    pub async fn create_document(
        &self,
        identity: &Identity,
        collection: &str,
        data: &Map<String, Value>,
    ) -> Result<String, Error> {
        let path = Self::collection_path(&identity.uid, collection);
        let url = self.document_url(&path)?;
        debug!(collection, "POST {path}");

        let body = json!({ "fields": value::encode_fields(data) });
        let resp = Self::authorize(self.http.post(url).json(&body), identity)
            .send()
            .await?;
        let doc: WireDocument = Self::parse(resp, &path).await?;
        Ok(doc.into_document()?.id)
    }

    /// Overwrite `users/{uid}/{collection}/{id}` with `data`.
    pub async fn set_document(
        &self,
        identity: &Identity,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), Error> {
        let path = Self::doc_path(&identity.uid, collection, id);
        let url = self.document_url(&path)?;
        debug!(collection, id, "PATCH {path}");

        let body = json!({ "fields": value::encode_fields(data) });
        let resp = Self::authorize(self.http.patch(url).json(&body), identity)
            .send()
            .await?;
        let _: Value = Self::parse(resp, &path).await?;
        Ok(())
    }

    pub async fn delete_document(
        &self,
        identity: &Identity,
        collection: &str,
        id: &str,
    ) -> Result<(), Error> {
        let path = Self::doc_path(&identity.uid, collection, id);
        let url = self.document_url(&path)?;
        debug!(collection, id, "DELETE {path}");

        let resp = Self::authorize(self.http.delete(url), identity)
            .send()
            .await?;
        let _: Value = Self::parse(resp, &path).await?;
        Ok(())
    }

    /// Apply up to [`BATCH_LIMIT`] writes atomically.
    pub async fn commit(&self, identity: &Identity, writes: &[WriteOp]) -> Result<(), Error> {
        if writes.len() > BATCH_LIMIT {
            return Err(Error::BatchTooLarge {
                size: writes.len(),
                limit: BATCH_LIMIT,
            });
        }
        if writes.is_empty() {
            return Ok(());
        }

        let entries: Vec<Value> = writes
            .iter()
            .map(|op| match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => json!({
                    "update": {
                        "name": self.resource_name(&Self::doc_path(&identity.uid, collection, id)),
                        "fields": value::encode_fields(data),
                    }
                }),
                WriteOp::Delete { collection, id } => json!({
                    "delete": self.resource_name(&Self::doc_path(&identity.uid, collection, id)),
                }),
            })
            .collect();

        let url = self.commit_url()?;
        debug!(writes = entries.len(), "POST documents:commit");

        let body = json!({ "writes": entries });
        let resp = Self::authorize(self.http.post(url).json(&body), identity)
            .send()
            .await?;
        let _: Value = Self::parse(resp, "documents:commit").await?;
        Ok(())
    }

    // ── Settings singleton ───────────────────────────────────────────

    /// Read the `businessDetails` field of `users/{uid}`.
    ///
    /// Returns `Ok(None)` when the user document or the field is absent.
    pub async fn load_settings(
        &self,
        identity: &Identity,
    ) -> Result<Option<Map<String, Value>>, Error> {
        let path = Self::user_path(&identity.uid);
        let url = self.document_url(&path)?;
        debug!("GET {path}");

        let resp = Self::authorize(self.http.get(url), identity)
            .send()
            .await?;
        let doc: WireDocument = match Self::parse(resp, &path).await {
            Ok(doc) => doc,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        match doc.fields.get(SETTINGS_FIELD) {
            Some(raw) => match value::decode(raw)? {
                Value::Object(map) => Ok(Some(map)),
                Value::Null => Ok(None),
                other => Err(Error::InvalidValue(format!(
                    "{SETTINGS_FIELD} is not a map: {other}"
                ))),
            },
            None => Ok(None),
        }
    }

    /// Write the `businessDetails` field, leaving other fields of `users/{uid}` intact.
    pub async fn save_settings(
        &self,
        identity: &Identity,
        settings: &Map<String, Value>,
    ) -> Result<(), Error> {
        let path = Self::user_path(&identity.uid);
        let mut url = self.document_url(&path)?;
        url.query_pairs_mut()
            .append_pair("updateMask.fieldPaths", SETTINGS_FIELD);
        debug!("PATCH {path} ({SETTINGS_FIELD})");

        let mut fields = Map::new();
        fields.insert(
            SETTINGS_FIELD.to_owned(),
            value::encode(&Value::Object(settings.clone())),
        );
        let body = json!({ "fields": fields });
        let resp = Self::authorize(self.http.patch(url).json(&body), identity)
            .send()
            .await?;
        let _: Value = Self::parse(resp, &path).await?;
        Ok(())
    }

    // ── Probe ────────────────────────────────────────────────────────

    /// Check that the project exists and the API key is accepted.
    ///
    /// Runs unauthenticated: a 401/403 from security rules still proves the
    /// project and key are good, so those count as success.
    pub async fn verify(&self) -> Result<(), Error> {
        let path = "goldfin_probe/ping";
        let url = self.document_url(path)?;
        debug!(project = %self.credentials.project_id, "verifying remote project");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status.is_success() || matches!(status.as_u16(), 401 | 403) {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        match Self::error_from_body(status.as_u16(), &body, path) {
            // The probe document never exists; only a missing database is fatal.
            Error::NotFound { .. } if !body.contains("database") => Ok(()),
            err => Err(err),
        }
    }

    // ── Listening ────────────────────────────────────────────────────

    /// Poll a collection, yielding the full document set whenever it changes.
    ///
    /// The first successful fetch is always yielded. Errors are yielded and
    /// polling continues; the caller decides whether to drop the stream.
    pub fn poll_collection(
        &self,
        identity: Identity,
        collection: String,
        interval: Duration,
    ) -> impl Stream<Item = Result<Vec<Document>, Error>> + Send + 'static {
        let client = self.clone();
        async_stream::stream! {
            let mut last: Option<Vec<Document>> = None;
            loop {
                match client.list_documents(&identity, &collection).await {
                    Ok(docs) => {
                        if last.as_ref() != Some(&docs) {
                            last = Some(docs.clone());
                            yield Ok(docs);
                        }
                    }
                    Err(e) => {
                        warn!(collection = %collection, error = %e, "poll failed");
                        yield Err(e);
                    }
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    /// Poll the settings singleton, yielding whenever it changes.
    pub fn poll_settings(
        &self,
        identity: Identity,
        interval: Duration,
    ) -> impl Stream<Item = Result<Option<Map<String, Value>>, Error>> + Send + 'static {
        let client = self.clone();
        async_stream::stream! {
            let mut last: Option<Option<Map<String, Value>>> = None;
            loop {
                match client.load_settings(&identity).await {
                    Ok(settings) => {
                        if last.as_ref() != Some(&settings) {
                            last = Some(settings.clone());
                            yield Ok(settings);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "settings poll failed");
                        yield Err(e);
                    }
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn parse<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
        path: &str,
    ) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Self::error_from_body(status.as_u16(), &body, path));
        }

        // DELETE and commit may answer with an empty body.
        let body_ref = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body_ref).map_err(|e| {
            let preview = &body[..body.len().min(200)];
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    fn error_from_body(status: u16, body: &str, path: &str) -> Error {
        let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(env) => (env.error.message, env.error.status),
            Err(_) => (body.chars().take(200).collect(), None),
        };

        match status {
            400 if message.contains("API key") => Error::InvalidApiKey,
            401 => Error::Authentication { message },
            403 => Error::PermissionDenied { message },
            404 => Error::NotFound {
                path: path.to_owned(),
            },
            _ => Error::Api {
                message,
                code,
                status,
            },
        }
    }
}
