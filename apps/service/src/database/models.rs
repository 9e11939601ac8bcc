//! Row mapping between libsql and the probe types.

use chrono::{DateTime, Utc};
use libsql::Row;
use probe::types::activity::ActivityData;
use probe::{
    ActivityLogEntry, BlobState, ExecutionMode, Monitor, MonitorStatus, PhaseTimings,
    ResultRecord, StorageError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const MONITOR_COLUMNS: &str = "id, account_id, name, method, url, headers, query_params, body, \
    variables, env, assertions, frequency, timeout_ms, status, locations, created_at, updated_at";

pub const RESULT_COLUMNS: &str = "id, monitor_id, account_id, mode, created_at, url, method, \
    protocol, ip, location, code, err, wait_time, dns_time, tcp_time, tls_time, upload_time, \
    ttfb, download_time, total_time, assert_results, blobs";

pub const ACTIVITY_COLUMNS: &str = "id, account_id, monitor_id, kind, data, created_at";

pub fn db_error(error: libsql::Error) -> StorageError {
    let message = error.to_string();
    if message.contains("UNIQUE constraint failed") {
        StorageError::Conflict(message)
    } else {
        StorageError::structured(message)
    }
}

pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_column<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, StorageError> {
    raw.parse().map_err(StorageError::structured)
}

fn text(row: &Row, index: i32) -> Result<String, StorageError> {
    row.get::<String>(index).map_err(db_error)
}

fn opt_text(row: &Row, index: i32) -> Result<Option<String>, StorageError> {
    row.get::<Option<String>>(index).map_err(db_error)
}

fn int(row: &Row, index: i32) -> Result<i64, StorageError> {
    row.get::<i64>(index).map_err(db_error)
}

fn opt_int(row: &Row, index: i32) -> Result<Option<i64>, StorageError> {
    row.get::<Option<i64>>(index).map_err(db_error)
}

fn real(row: &Row, index: i32) -> Result<f64, StorageError> {
    row.get::<f64>(index).map_err(db_error)
}

pub fn monitor_from_row(row: &Row) -> Result<Monitor, StorageError> {
    Ok(Monitor {
        id: text(row, 0)?,
        account_id: text(row, 1)?,
        name: text(row, 2)?,
        method: text(row, 3)?,
        url: text(row, 4)?,
        headers: from_json(&text(row, 5)?)?,
        query_params: from_json(&text(row, 6)?)?,
        body: opt_text(row, 7)?,
        variables: from_json(&text(row, 8)?)?,
        env: from_json(&text(row, 9)?)?,
        assertions: from_json(&text(row, 10)?)?,
        frequency: int(row, 11)? as u64,
        timeout_ms: opt_int(row, 12)?.map(|ms| ms as u64),
        status: parse_column::<MonitorStatus>(&text(row, 13)?)?,
        locations: from_json(&text(row, 14)?)?,
        created_at: from_millis(int(row, 15)?),
        updated_at: from_millis(int(row, 16)?),
    })
}

pub fn record_from_row(row: &Row) -> Result<ResultRecord, StorageError> {
    Ok(ResultRecord {
        id: text(row, 0)?,
        monitor_id: text(row, 1)?,
        account_id: text(row, 2)?,
        mode: parse_column::<ExecutionMode>(&text(row, 3)?)?,
        created_at: from_millis(int(row, 4)?),
        url: text(row, 5)?,
        method: text(row, 6)?,
        protocol: text(row, 7)?,
        ip: text(row, 8)?,
        location: text(row, 9)?,
        code: opt_int(row, 10)?.map(|code| code as u16),
        err: text(row, 11)?,
        timings: PhaseTimings {
            wait: real(row, 12)?,
            dns: real(row, 13)?,
            tcp: real(row, 14)?,
            tls: real(row, 15)?,
            upload: real(row, 16)?,
            ttfb: real(row, 17)?,
            download: real(row, 18)?,
            total: real(row, 19)?,
        },
        assert_results: from_json(&text(row, 20)?)?,
        blobs: parse_column::<BlobState>(&text(row, 21)?)?,
    })
}

pub fn activity_from_row(row: &Row) -> Result<ActivityLogEntry, StorageError> {
    Ok(ActivityLogEntry {
        id: text(row, 0)?,
        account_id: text(row, 1)?,
        monitor_id: text(row, 2)?,
        kind: parse_column(&text(row, 3)?)?,
        data: from_json::<ActivityData>(&text(row, 4)?)?,
        created_at: from_millis(int(row, 5)?),
    })
}

/// Latency and error counts over a window of results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub avg: Option<f64>,
    pub num_items: u64,
    pub num_errors: u64,
}

/// Monitor health as shown on dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Paused,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastResult {
    pub id: String,
    pub err: String,
    pub total_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSummary {
    pub monitor_id: String,
    pub status: HealthStatus,
    pub week: PeriodStats,
    pub day: PeriodStats,
    pub last_results: Vec<LastResult>,
}

/// Monitors of an account, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorList {
    pub total: u64,
    pub items: Vec<Monitor>,
}
