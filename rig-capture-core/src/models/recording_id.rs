use std::fmt;

use serde::{Deserialize, Serialize};

/// Base name shared by every artifact of one recording.
///
/// Format: `yyyyMMddTHHmmss±zzzz_<UUID>`. The timestamp prefix orders
/// recordings chronologically and the random suffix keeps recordings started
/// within the same second distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(String);

impl RecordingId {
    pub fn generate() -> Self {
        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%z");
        let suffix = uuid::Uuid::new_v4().to_string().to_uppercase();
        Self(format!("{}_{}", stamp, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
