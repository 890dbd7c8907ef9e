//! Version records and version id generation.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

const ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// Audit entry for one apply attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VersionRecord {
    pub fn succeeded(id: &str) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: &str, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Issues timestamp-derived version ids that strictly increase for the
/// lifetime of the clock, even if the wall clock stalls or steps back.
#[derive(Debug, Default)]
pub struct VersionClock {
    last_millis: AtomicI64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never issue an id at or before `id`.
    pub fn observe(&self, id: &str) {
        if let Some(millis) = parse_id(id) {
            self.last_millis.fetch_max(millis, Ordering::SeqCst);
        }
    }

    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_millis.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self.last_millis.compare_exchange(
                last,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return format_id(next),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Whether `id` has exactly the shape [`VersionClock`] issues.
pub fn is_version_id(id: &str) -> bool {
    parse_id(id).map(format_id).as_deref() == Some(id)
}

fn format_id(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format(ID_FORMAT)
        .to_string()
}

fn parse_id(id: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(id, ID_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
