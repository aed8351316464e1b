// ── Record identity ──
//
// Locally generated ids look like `evt_1718000000000_a1b2c3`; ids assigned
// by the remote store are opaque strings. Both live behind `RecordId`.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unique identifier of a stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a client-side id: `{prefix}_{unix_millis}_{6 hex chars}`.
    pub fn generate(prefix: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let millis = Utc::now().timestamp_millis();
        Self(format!("{prefix}_{millis}_{}", &suffix[..6]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Millisecond timestamp embedded in a locally generated id.
    ///
    /// Reads the segment after the first `_`; anything unparseable is `None`.
    pub fn embedded_millis(&self) -> Option<i64> {
        self.0.split('_').nth(1)?.parse().ok()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
