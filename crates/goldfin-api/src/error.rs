use thiserror::Error;

/// Top-level error type for the `goldfin-api` crate.
///
/// Covers every failure mode of the remote document store: transport,
/// authentication, structured API errors, and wire decoding.
/// `goldfin-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The ID token was rejected (expired or revoked).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Authenticated, but security rules denied the operation.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The project API key was rejected.
    #[error("Invalid API key")]
    InvalidApiKey,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Requested document or project does not exist.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Structured error from the REST surface (`{"error": {...}}`).
    #[error("Remote store error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    /// A commit carried more writes than one batch may hold.
    #[error("Batch of {size} writes exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A typed wire value could not be decoded.
    #[error("Invalid wire value: {0}")]
    InvalidValue(String),
}

impl Error {
    /// Returns `true` if the ID token needs refreshing.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => matches!(status, 429 | 500..=599),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::NotFound { .. } | Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Extract the API status code string (e.g. `"PERMISSION_DENIED"`), if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
