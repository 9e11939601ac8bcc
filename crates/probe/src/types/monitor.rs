//! Monitor definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assertions::Assertion;

/// Ordered name/value pair used for headers, query params and variables.
pub type Tuple = (String, String);

/// Scheduling status of a monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    #[default]
    Active,
    Paused,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Active => "active",
            MonitorStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MonitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MonitorStatus::Active),
            "paused" => Ok(MonitorStatus::Paused),
            other => Err(format!("unknown monitor status: {other}")),
        }
    }
}

/// How an execution was triggered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Scheduled,
    OnDemand,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Scheduled => "scheduled",
            ExecutionMode::OnDemand => "ondemand",
        }
    }

    /// Generate a fresh result id for this mode.
    ///
    /// On-demand ids carry an `ondemand-` prefix so they stand out in listings.
    pub fn generate_result_id(&self) -> String {
        match self {
            ExecutionMode::Scheduled => Uuid::new_v4().to_string(),
            ExecutionMode::OnDemand => format!("ondemand-{}", Uuid::new_v4()),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ExecutionMode::Scheduled),
            "ondemand" => Ok(ExecutionMode::OnDemand),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_frequency() -> u64 {
    60
}

/// A monitor - an HTTP request plus the checks to run against its response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub account_id: String,

    pub name: String,

    #[serde(default = "default_method")]
    pub method: String,

    pub url: String,

    #[serde(default)]
    pub headers: Vec<Tuple>,

    #[serde(default)]
    pub query_params: Vec<Tuple>,

    #[serde(default)]
    pub body: Option<String>,

    /// Monitor level variables for `{{name}}` substitution
    #[serde(default)]
    pub variables: Vec<Tuple>,

    /// Environment overrides; these win over `variables`
    #[serde(default)]
    pub env: Vec<Tuple>,

    #[serde(default)]
    pub assertions: Vec<Assertion>,

    /// Seconds between scheduled runs
    #[serde(default = "default_frequency")]
    pub frequency: u64,

    /// Per-monitor request timeout, falls back to the executor default
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub status: MonitorStatus,

    #[serde(default)]
    pub locations: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    /// Create a new active GET monitor with a generated id
    pub fn new(account_id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            name: name.into(),
            method: default_method(),
            url: url.into(),
            headers: Vec::new(),
            query_params: Vec::new(),
            body: None,
            variables: Vec::new(),
            env: Vec::new(),
            assertions: Vec::new(),
            frequency: default_frequency(),
            timeout_ms: None,
            status: MonitorStatus::Active,
            locations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == MonitorStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_json_uses_tuple_arrays() {
        let monitor = Monitor::new("acct", "home", "https://example.com")
            .with_header("accept", "text/html")
            .with_variable("id", "42");

        let json = serde_json::to_value(&monitor).unwrap();
        assert_eq!(json["headers"], serde_json::json!([["accept", "text/html"]]));
        assert_eq!(json["variables"], serde_json::json!([["id", "42"]]));
        assert_eq!(json["accountId"], "acct");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_minimal_monitor_deserializes_with_defaults() {
        let monitor: Monitor =
            serde_json::from_str(r#"{"name": "home", "url": "https://example.com"}"#).unwrap();

        assert_eq!(monitor.method, "GET");
        assert_eq!(monitor.frequency, 60);
        assert!(monitor.headers.is_empty());
        assert!(monitor.is_active());
    }

    #[test]
    fn test_ondemand_result_ids_are_prefixed() {
        assert!(ExecutionMode::OnDemand.generate_result_id().starts_with("ondemand-"));
        assert!(!ExecutionMode::Scheduled.generate_result_id().starts_with("ondemand-"));
    }
}
