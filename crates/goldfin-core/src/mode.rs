// ── Mode selection ──
//
// Decided once per session: stored remote credentials that pass
// verification put the session in Cloud Mode; anything else, including
// any initialization error, falls back to Local Mode and clears the bad
// credential so the next start does not retry it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use goldfin_api::{FirestoreClient, RemoteCredentials, TransportConfig};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::remote::{DocumentBackend, FirestoreBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum Mode {
    #[default]
    Local,
    Cloud,
}

/// Where remote credentials are persisted between sessions.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is saved. `Err` when a saved connection
    /// exists but cannot be turned into credentials.
    fn load(&self) -> Result<Option<RemoteCredentials>, CoreError>;

    fn clear(&self) -> Result<(), CoreError>;
}

/// A store that never holds credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn load(&self) -> Result<Option<RemoteCredentials>, CoreError> {
        Ok(None)
    }

    fn clear(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Builds and probes a backend from credentials.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, credentials: &RemoteCredentials) -> Result<Arc<dyn DocumentBackend>, CoreError>;
}

/// Connects to Firestore over REST and verifies the project.
pub struct FirestoreConnector {
    transport: TransportConfig,
    poll_interval: Duration,
}

impl FirestoreConnector {
    pub fn new(transport: TransportConfig, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }
}

#[async_trait]
impl BackendConnector for FirestoreConnector {
    async fn connect(&self, credentials: &RemoteCredentials) -> Result<Arc<dyn DocumentBackend>, CoreError> {
        let client = FirestoreClient::new(credentials.clone(), &self.transport)?;
        client.verify().await?;
        Ok(Arc::new(FirestoreBackend::new(client, self.poll_interval)))
    }
}

/// Outcome of [`determine_mode`].
pub struct ModeSelection {
    pub mode: Mode,
    pub backend: Option<Arc<dyn DocumentBackend>>,
    /// User-visible notice when cloud initialization failed.
    pub notice: Option<String>,
}

impl std::fmt::Debug for ModeSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeSelection")
            .field("mode", &self.mode)
            .field("notice", &self.notice)
            .finish_non_exhaustive()
    }
}

/// Pick the session mode. Never fails.
pub async fn determine_mode(
    credentials: &dyn CredentialStore,
    connector: &dyn BackendConnector,
) -> ModeSelection {
    let creds = match credentials.load() {
        Ok(Some(creds)) => creds,
        Ok(None) => {
            info!("no remote credentials; running in local mode");
            return ModeSelection {
                mode: Mode::Local,
                backend: None,
                notice: None,
            };
        }
        Err(e) => {
            warn!(error = %e, "saved connection unusable; using local mode");
            return fall_back(credentials, &e);
        }
    };

    match connector.connect(&creds).await {
        Ok(backend) => {
            info!(project = %creds.project_id, "running in cloud mode");
            ModeSelection {
                mode: Mode::Cloud,
                backend: Some(backend),
                notice: None,
            }
        }
        Err(e) => {
            warn!(project = %creds.project_id, error = %e, "cloud initialization failed; using local mode");
            fall_back(credentials, &e)
        }
    }
}

/// Clear the bad credential and build the one notice for the user.
fn fall_back(credentials: &dyn CredentialStore, error: &CoreError) -> ModeSelection {
    if let Err(clear_err) = credentials.clear() {
        warn!(error = %clear_err, "failed to clear stored credentials");
    }
    ModeSelection {
        mode: Mode::Local,
        backend: None,
        notice: Some(format!(
            "Could not connect to cloud storage ({error}). Your saved connection was removed; running in local mode."
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::MemoryBackend;
    use secrecy::SecretString;
    use std::sync::Mutex;

    struct Saved(Mutex<Option<RemoteCredentials>>);

    impl CredentialStore for Saved {
        fn load(&self) -> Result<Option<RemoteCredentials>, CoreError> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn clear(&self) -> Result<(), CoreError> {
            *self.0.lock().unwrap() = None;
            Ok(())
        }
    }

    struct Fixed(bool);

    #[async_trait]
    impl BackendConnector for Fixed {
        async fn connect(&self, _: &RemoteCredentials) -> Result<Arc<dyn DocumentBackend>, CoreError> {
            if self.0 {
                Ok(Arc::new(MemoryBackend::new()))
            } else {
                Err(CoreError::AuthenticationFailed {
                    message: "Invalid API key".into(),
                })
            }
        }
    }

    fn creds() -> RemoteCredentials {
        RemoteCredentials::new("proj", SecretString::from("key")).unwrap()
    }

    #[tokio::test]
    async fn no_credentials_means_local() {
        let sel = determine_mode(&NoCredentials, &Fixed(true)).await;
        assert_eq!(sel.mode, Mode::Local);
        assert!(sel.notice.is_none());
    }

    #[tokio::test]
    async fn working_credentials_mean_cloud() {
        let store = Saved(Mutex::new(Some(creds())));
        let sel = determine_mode(&store, &Fixed(true)).await;
        assert_eq!(sel.mode, Mode::Cloud);
        assert!(sel.backend.is_some());
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn failure_falls_back_and_clears_credentials() {
        let store = Saved(Mutex::new(Some(creds())));
        let sel = determine_mode(&store, &Fixed(false)).await;
        assert_eq!(sel.mode, Mode::Local);
        assert!(sel.backend.is_none());
        assert!(sel.notice.unwrap().contains("Invalid API key"));
        assert!(store.load().unwrap().is_none());
    }

    /// A saved profile whose key cannot be resolved.
    struct Unusable(Mutex<bool>);

    impl CredentialStore for Unusable {
        fn load(&self) -> Result<Option<RemoteCredentials>, CoreError> {
            if *self.0.lock().unwrap() {
                Err(CoreError::Config {
                    message: "no API key for project 'p'".into(),
                })
            } else {
                Ok(None)
            }
        }

        fn clear(&self) -> Result<(), CoreError> {
            *self.0.lock().unwrap() = false;
            Ok(())
        }
    }

    #[tokio::test]
    async fn unusable_saved_connection_is_cleared_with_notice() {
        let store = Unusable(Mutex::new(true));
        let sel = determine_mode(&store, &Fixed(true)).await;
        assert_eq!(sel.mode, Mode::Local);
        assert!(sel.backend.is_none());
        assert!(sel.notice.unwrap().contains("no API key"));
        assert!(store.load().unwrap().is_none());
    }
}
