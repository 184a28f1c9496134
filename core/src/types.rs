//! Domain entities returned by the doorbells API.
//!
//! User records are owned by the server and embedded as-is; the client never
//! looks inside them.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque reference to a user, kept exactly as the server sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub serde_json::Value);

impl UserRef {
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

/// A message delivered to the authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub sender: UserRef,
    #[serde(default)]
    pub contents: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Message {
    /// `timestamp` converted to milliseconds.
    pub fn date_received_millis(&self) -> i64 {
        self.timestamp.saturating_mul(1000)
    }

    /// `None` when `timestamp` lies outside the platform's `SystemTime` range.
    pub fn date_received(&self) -> Option<SystemTime> {
        let offset = Duration::from_secs(self.timestamp.unsigned_abs());
        if self.timestamp >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        }
    }
}

/// A location marker owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "user", default)]
    pub owner: UserRef,
}
