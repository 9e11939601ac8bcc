//! Error types for the probe engine.
//!
//! Only [`ConfigError`] escapes an execution. Transport failures are recorded
//! inside the result and storage failures are reported by the sink.

use std::io;

use thiserror::Error;

/// The monitor definition cannot produce a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unsupported http method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} (max: {max})")]
    TooManyHeaders { count: usize, max: usize },

    #[error("body too large: {size} bytes (max: {max} bytes)")]
    BodyTooLarge { size: usize, max: usize },

    #[error("timeout out of range: {value} ms (allowed: {min}..={max} ms)")]
    TimeoutOutOfRange { value: u64, min: u64, max: u64 },

    #[error("monitor name must not be empty")]
    EmptyName,

    #[error("frequency out of range: {value} seconds (allowed: {min}..={max})")]
    FrequencyOutOfRange { value: u64, min: u64, max: u64 },

    #[error("unknown result view `{0}` (expected one of: summary, detail)")]
    UnknownView(String),
}

/// Network level failure of a single request.
///
/// The `Display` output is what lands in `MonitorResult::err`, so every
/// variant starts with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("dns error: {0}")]
    Dns(String),

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls handshake failed: {0}")]
    Tls(String),

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(String),
}

impl TransportError {
    /// Short machine friendly classification of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Dns(_) => "dns",
            TransportError::ConnectionRefused => "refused",
            TransportError::Connect(_) => "connect",
            TransportError::Tls(_) => "tls",
            TransportError::Timeout => "timeout",
            TransportError::Cancelled => "cancelled",
            TransportError::Protocol(_) => "protocol",
            TransportError::Io(_) => "io",
        }
    }

    pub(crate) fn from_connect(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused,
            io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Connect(error.to_string()),
        }
    }
}

impl From<hyper::Error> for TransportError {
    fn from(error: hyper::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_parse() || error.is_user() {
            TransportError::Protocol(error.to_string())
        } else {
            TransportError::Io(error.to_string())
        }
    }
}

/// Which half of a stored result failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Structured,
    Blob,
}

impl std::fmt::Display for StorageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageTier::Structured => write!(f, "structured"),
            StorageTier::Blob => write!(f, "blob"),
        }
    }
}

/// Persistence or object storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{tier} store failed: {message}")]
    Backend { tier: StorageTier, message: String },

    #[error("{tier} store timed out after {millis} ms")]
    Timeout { tier: StorageTier, millis: u64 },

    #[error("encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("unique constraint violation: {0}")]
    Conflict(String),
}

impl StorageError {
    pub fn structured(message: impl ToString) -> Self {
        StorageError::Backend { tier: StorageTier::Structured, message: message.to_string() }
    }

    pub fn blob(message: impl ToString) -> Self {
        StorageError::Backend { tier: StorageTier::Blob, message: message.to_string() }
    }

    /// Tier the failure belongs to, when it maps to one.
    pub fn tier(&self) -> Option<StorageTier> {
        match self {
            StorageError::Backend { tier, .. } | StorageError::Timeout { tier, .. } => Some(*tier),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_messages_start_with_classification() {
        assert!(TransportError::Dns("no such host".into()).to_string().starts_with("dns error"));
        assert_eq!(TransportError::ConnectionRefused.to_string(), "connection refused");
        assert!(TransportError::Tls("bad cert".into()).to_string().starts_with("tls handshake failed"));
        assert_eq!(TransportError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_connect_error_classification() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(TransportError::from_connect(refused), TransportError::ConnectionRefused);

        let other = io::Error::other("network unreachable");
        assert_eq!(TransportError::from_connect(other).kind(), "connect");
    }

    #[test]
    fn test_storage_error_tier() {
        assert_eq!(StorageError::blob("disk full").tier(), Some(StorageTier::Blob));
        assert_eq!(StorageError::NotFound("r1".into()).tier(), None);
    }
}
