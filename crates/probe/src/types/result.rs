//! Execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::monitor::{ExecutionMode, Tuple};
use crate::assertions::AssertionResult;

/// Per-phase request durations in milliseconds.
///
/// A phase the request never went through (TLS on plain http, everything
/// after a DNS failure) is `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimings {
    pub wait: f64,
    pub dns: f64,
    pub tcp: f64,
    pub tls: f64,
    pub upload: f64,
    pub ttfb: f64,
    pub download: f64,
    pub total: f64,
}

impl PhaseTimings {
    /// Sum of the individual phases, excluding `total`
    pub fn phase_sum(&self) -> f64 {
        self.wait + self.dns + self.tcp + self.tls + self.upload + self.ttfb + self.download
    }

    /// Look up a phase by name, as used by response time assertions
    pub fn get(&self, phase: &str) -> Option<f64> {
        match phase {
            "wait" => Some(self.wait),
            "dns" => Some(self.dns),
            "tcp" => Some(self.tcp),
            "tls" => Some(self.tls),
            "upload" => Some(self.upload),
            "ttfb" => Some(self.ttfb),
            "download" => Some(self.download),
            "total" => Some(self.total),
            _ => None,
        }
    }
}

/// Where the response body and header blob of a result live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobState {
    /// Not yet written to object storage
    #[default]
    Pending,
    Stored,
    /// Blob write failed; body and headers cannot be recovered
    Unavailable,
}

impl BlobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobState::Pending => "pending",
            BlobState::Stored => "stored",
            BlobState::Unavailable => "unavailable",
        }
    }
}

impl std::str::FromStr for BlobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BlobState::Pending),
            "stored" => Ok(BlobState::Stored),
            "unavailable" => Ok(BlobState::Unavailable),
            other => Err(format!("unknown blob state: {other}")),
        }
    }
}

/// Result of one monitor execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorResult {
    pub id: String,
    pub monitor_id: String,
    pub account_id: String,
    pub mode: ExecutionMode,

    /// Completion time of the execution
    pub created_at: DateTime<Utc>,

    /// Resolved request
    pub url: String,
    pub method: String,
    pub protocol: String,
    pub ip: String,
    pub location: String,

    /// Absent when no response was received
    pub code: Option<u16>,

    /// Empty string means success
    pub err: String,

    #[serde(flatten)]
    pub timings: PhaseTimings,

    pub assert_results: Vec<AssertionResult>,

    #[serde(with = "body_text")]
    pub body: Vec<u8>,
    pub headers: Vec<Tuple>,

    #[serde(default)]
    pub blobs: BlobState,
}

impl MonitorResult {
    pub fn is_up(&self) -> bool {
        self.err.is_empty()
    }

    /// Split into the structured record and the offloaded payload
    pub fn split(self) -> (ResultRecord, Vec<u8>, Vec<Tuple>) {
        let record = ResultRecord {
            id: self.id,
            monitor_id: self.monitor_id,
            account_id: self.account_id,
            mode: self.mode,
            created_at: self.created_at,
            url: self.url,
            method: self.method,
            protocol: self.protocol,
            ip: self.ip,
            location: self.location,
            code: self.code,
            err: self.err,
            timings: self.timings,
            assert_results: self.assert_results,
            blobs: self.blobs,
        };
        (record, self.body, self.headers)
    }

    /// Reassemble from the structured record and its payload
    pub fn from_parts(record: ResultRecord, body: Vec<u8>, headers: Vec<Tuple>) -> Self {
        Self {
            id: record.id,
            monitor_id: record.monitor_id,
            account_id: record.account_id,
            mode: record.mode,
            created_at: record.created_at,
            url: record.url,
            method: record.method,
            protocol: record.protocol,
            ip: record.ip,
            location: record.location,
            code: record.code,
            err: record.err,
            timings: record.timings,
            assert_results: record.assert_results,
            body,
            headers,
            blobs: record.blobs,
        }
    }
}

/// The fixed-width half of a result, as kept by the structured store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    pub monitor_id: String,
    pub account_id: String,
    pub mode: ExecutionMode,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub method: String,
    pub protocol: String,
    pub ip: String,
    pub location: String,
    pub code: Option<u16>,
    pub err: String,
    #[serde(flatten)]
    pub timings: PhaseTimings,
    pub assert_results: Vec<AssertionResult>,
    pub blobs: BlobState,
}

/// Bodies are shown as text on the wire; invalid UTF-8 is replaced lossily.
mod body_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MonitorResult {
        MonitorResult {
            id: "r1".into(),
            monitor_id: "m1".into(),
            account_id: "a1".into(),
            mode: ExecutionMode::Scheduled,
            created_at: Utc::now(),
            url: "https://example.com/".into(),
            method: "GET".into(),
            protocol: "HTTP/1.1".into(),
            ip: "93.184.216.34".into(),
            location: "local".into(),
            code: Some(200),
            err: String::new(),
            timings: PhaseTimings { dns: 1.5, tcp: 2.0, total: 10.0, ..Default::default() },
            assert_results: Vec::new(),
            body: b"hello".to_vec(),
            headers: vec![("content-type".into(), "text/plain".into())],
            blobs: BlobState::Pending,
        }
    }

    #[test]
    fn test_split_and_reassemble() {
        let result = sample();
        let (record, body, headers) = result.clone().split();
        assert_eq!(record.id, "r1");
        assert_eq!(MonitorResult::from_parts(record, body, headers), result);
    }

    #[test]
    fn test_timings_are_flattened_in_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["dns"], 1.5);
        assert_eq!(json["total"], 10.0);
        assert_eq!(json["body"], "hello");
        assert_eq!(json["err"], "");
    }

    #[test]
    fn test_phase_lookup() {
        let timings = PhaseTimings { ttfb: 4.0, ..Default::default() };
        assert_eq!(timings.get("ttfb"), Some(4.0));
        assert_eq!(timings.get("tls"), Some(0.0));
        assert_eq!(timings.get("bogus"), None);
    }
}
