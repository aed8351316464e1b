//! Configuration for GoldFin front ends.
//!
//! TOML settings layered with `GOLDFIN_*` environment variables, remote
//! API key resolution (env, then keyring, then plaintext), and
//! translation to [`goldfin_core::SessionConfig`]. [`KeyringCredentials`]
//! plugs the saved remote connection into the core's mode selection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use goldfin_api::transport::TlsMode;
use goldfin_api::{RemoteCredentials, TransportConfig};
use goldfin_core::{CoreError, CredentialStore, SessionConfig};

const KEYRING_SERVICE: &str = "goldfin";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for project '{project}'")]
    NoCredentials { project: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Where local collections are stored. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,

    /// Seconds between remote polls for each listened collection.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Saved cloud connection. Absent means Local Mode.
    pub remote: Option<RemoteProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
            remote: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}
fn default_timeout() -> u64 {
    30
}

/// Connection details for the remote document store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteProfile {
    pub project_id: String,

    /// API key (plaintext; prefer the keyring or an env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// REST endpoint override for emulators.
    pub base_url: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl RemoteProfile {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            ca_cert: None,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "goldfin", "goldfin")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for local collection files.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("data"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("goldfin");
    p
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path`, then `GOLDFIN_*` variables.
///
/// Nested keys use a double underscore: `GOLDFIN_REMOTE__PROJECT_ID`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GOLDFIN_").split("__"))
        .extract()?;
    debug!(path = %path.display(), cloud = config.remote.is_some(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %e, "using default config");
        Config::default()
    })
}

/// Serialize config to TOML at the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(project_id: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{project_id}/api-key"))
}

/// Resolve the remote API key: profile env var, then keyring, then plaintext.
pub fn resolve_api_key(profile: &RemoteProfile) -> Result<SecretString, ConfigError> {
    if let Some(env_name) = &profile.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(entry) = keyring_entry(&profile.project_id) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    if let Some(key) = &profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        project: profile.project_id.clone(),
    })
}

/// Store an API key in the system keyring.
pub fn store_api_key(project_id: &str, key: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(project_id)?.set_password(key.expose_secret())?;
    Ok(())
}

/// Remove a stored API key. A missing entry is not an error.
pub fn forget_api_key(project_id: &str) -> Result<(), ConfigError> {
    match keyring_entry(project_id)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Build remote credentials from a profile.
pub fn remote_credentials(profile: &RemoteProfile) -> Result<RemoteCredentials, ConfigError> {
    if profile.project_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "remote.project_id".into(),
            reason: "must not be empty".into(),
        });
    }
    let api_key = resolve_api_key(profile)?;
    let invalid_url = |raw: &str| ConfigError::Validation {
        field: "remote.base_url".into(),
        reason: format!("invalid URL: {raw}"),
    };

    let mut creds = RemoteCredentials::new(profile.project_id.clone(), api_key)
        .map_err(|_| invalid_url(RemoteCredentials::DEFAULT_BASE_URL))?;
    if let Some(raw) = &profile.base_url {
        creds.base_url = Url::parse(raw).map_err(|_| invalid_url(raw))?;
    }
    Ok(creds)
}

// ── Session translation ─────────────────────────────────────────────

/// Build the core session config.
pub fn to_session_config(cfg: &Config) -> Result<SessionConfig, ConfigError> {
    if cfg.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    let tls = cfg
        .remote
        .as_ref()
        .and_then(|r| r.ca_cert.clone())
        .map_or(TlsMode::System, TlsMode::CustomCa);

    Ok(SessionConfig {
        data_dir: Some(cfg.data_dir.clone().unwrap_or_else(default_data_dir)),
        poll_interval: Duration::from_secs(cfg.poll_interval_secs),
        transport: TransportConfig {
            tls,
            timeout: Duration::from_secs(cfg.timeout_secs),
        },
    })
}

// ── Saved connection ────────────────────────────────────────────────

/// The remote connection saved in a config file and the keyring.
///
/// Clearing it removes the keyring entry and the `[remote]` table so the
/// next start runs in Local Mode.
#[derive(Debug, Clone)]
pub struct KeyringCredentials {
    path: PathBuf,
}

impl KeyringCredentials {
    /// Use the canonical config file.
    pub fn new() -> Self {
        Self::at(config_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn profile(&self) -> Option<RemoteProfile> {
        match load_config_from(&self.path) {
            Ok(cfg) => cfg.remote,
            Err(e) => {
                warn!(error = %e, "unreadable config; no saved connection");
                None
            }
        }
    }
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentials {
    fn load(&self) -> Result<Option<RemoteCredentials>, CoreError> {
        let Some(profile) = self.profile() else {
            return Ok(None);
        };
        match remote_credentials(&profile) {
            Ok(creds) => Ok(Some(creds)),
            Err(e) => {
                warn!(project = %profile.project_id, error = %e, "saved connection unusable");
                Err(e.into())
            }
        }
    }

    fn clear(&self) -> Result<(), CoreError> {
        let Some(profile) = self.profile() else {
            return Ok(());
        };
        if let Err(e) = forget_api_key(&profile.project_id) {
            warn!(error = %e, "failed to remove keyring entry");
        }
        let mut cfg = load_config_from(&self.path)?;
        cfg.remote = None;
        save_config_to(&cfg, &self.path)?;
        debug!(project = %profile.project_id, "saved connection cleared");
        Ok(())
    }
}
