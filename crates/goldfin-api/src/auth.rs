use secrecy::SecretString;
use url::Url;

/// Project-level credentials for the remote store.
///
/// Presence of these (in the keyring or config) is what puts a session
/// into Cloud Mode.
#[derive(Debug, Clone)]
pub struct RemoteCredentials {
    /// Firestore project identifier.
    pub project_id: String,
    /// Web API key for the project.
    pub api_key: SecretString,
    /// REST endpoint root. Overridable for emulators and tests.
    pub base_url: Url,
}

impl RemoteCredentials {
    pub const DEFAULT_BASE_URL: &'static str = "https://firestore.googleapis.com/";

    pub fn new(project_id: impl Into<String>, api_key: SecretString) -> Result<Self, url::ParseError> {
        Ok(Self {
            project_id: project_id.into(),
            api_key,
            base_url: Url::parse(Self::DEFAULT_BASE_URL)?,
        })
    }
}

/// An authenticated user identity.
///
/// Sign-in itself happens outside this crate; the caller hands in the
/// resulting uid and ID token. Every document path is scoped by `uid`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: String,
    pub id_token: SecretString,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, id_token: SecretString) -> Self {
        Self {
            uid: uid.into(),
            id_token,
            display_name: None,
        }
    }
}
