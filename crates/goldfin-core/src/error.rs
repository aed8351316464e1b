// ── Core error types ──
//
// User-facing errors from goldfin-core. Consumers never see HTTP status
// codes or wire-format failures directly; `From<goldfin_api::Error>`
// translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote store ─────────────────────────────────────────────────
    #[error("Cannot reach remote store: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Cloud Mode has no identity attached yet; nothing was changed.
    #[error("Not signed in to cloud storage")]
    NotSignedIn,

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Remote store error: {message}")]
    Remote {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A soft invariant pre-check rejected the command; state is unchanged.
    #[error("{reason}")]
    Rejected { reason: String },

    #[error("Cannot move {entity_type} from {from} to {to}")]
    InvalidTransition {
        entity_type: &'static str,
        from: String,
        to: String,
    },

    // ── Backup errors ────────────────────────────────────────────────
    #[error("Unsupported backup version {found} (this build reads up to {supported})")]
    UnsupportedBackupVersion { found: u64, supported: u64 },

    #[error("Not a valid GoldFin backup file: {message}")]
    InvalidBackup { message: String },

    // ── Local storage ────────────────────────────────────────────────
    #[error("Local storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity_type: &'static str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<goldfin_api::Error> for CoreError {
    fn from(err: goldfin_api::Error) -> Self {
        match err {
            goldfin_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            goldfin_api::Error::PermissionDenied { message } => {
                CoreError::PermissionDenied { message }
            }
            goldfin_api::Error::InvalidApiKey => CoreError::AuthenticationFailed {
                message: "Invalid API key".into(),
            },
            goldfin_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Remote {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            goldfin_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            goldfin_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            goldfin_api::Error::NotFound { path } => CoreError::NotFound {
                entity_type: "document",
                identifier: path,
            },
            goldfin_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Remote {
                message,
                code,
                status: Some(status),
            },
            goldfin_api::Error::BatchTooLarge { size, limit } => CoreError::Remote {
                message: format!("batch of {size} exceeds limit {limit}"),
                code: None,
                status: None,
            },
            goldfin_api::Error::Deserialization { message, body: _ } => CoreError::Remote {
                message: format!("Deserialization error: {message}"),
                code: None,
                status: None,
            },
            goldfin_api::Error::InvalidValue(message) => CoreError::Remote {
                message,
                code: None,
                status: None,
            },
        }
    }
}
