//! Append-only audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of monitor lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    MonitorCreated,
    MonitorUp,
    MonitorPaused,
    MonitorRemoved,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::MonitorCreated => "MONITOR_CREATED",
            ActivityKind::MonitorUp => "MONITOR_UP",
            ActivityKind::MonitorPaused => "MONITOR_PAUSED",
            ActivityKind::MonitorRemoved => "MONITOR_REMOVED",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ActivityKind::MonitorCreated => "created",
            ActivityKind::MonitorUp => "up",
            ActivityKind::MonitorPaused => "paused",
            ActivityKind::MonitorRemoved => "removed",
        }
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MONITOR_CREATED" => Ok(ActivityKind::MonitorCreated),
            "MONITOR_UP" => Ok(ActivityKind::MonitorUp),
            "MONITOR_PAUSED" => Ok(ActivityKind::MonitorPaused),
            "MONITOR_REMOVED" => Ok(ActivityKind::MonitorRemoved),
            other => Err(format!("unknown activity kind: {other}")),
        }
    }
}

/// Payload stored with every activity entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityData {
    pub monitor_name: String,
    pub msg: String,
}

/// Activity log entry; never mutated once written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: String,
    pub account_id: String,
    pub monitor_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub data: ActivityData,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        account_id: impl Into<String>,
        monitor_id: impl Into<String>,
        monitor_name: impl Into<String>,
        kind: ActivityKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            monitor_id: monitor_id.into(),
            kind,
            data: ActivityData { monitor_name: monitor_name.into(), msg: kind.message().to_string() },
            created_at: Utc::now(),
        }
    }
}
