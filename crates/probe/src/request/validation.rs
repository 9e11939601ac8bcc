//! Monitor and request validation.
//!
//! Everything here runs before any network I/O; a failure means no
//! meaningful result can be produced.

use http::{HeaderName, HeaderValue};
use url::Url;

use crate::error::ConfigError;
use crate::types::{Monitor, Tuple};
use crate::variables::{ResolvedRequest, resolve_monitor};

pub const SUPPORTED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];

const MAX_HEADERS: usize = 50;
const MAX_HEADER_SIZE: usize = 8192;
const MAX_BODY_SIZE: usize = 1024 * 1024; // 1MB

pub const MIN_TIMEOUT_MS: u64 = 100;
pub const MAX_TIMEOUT_MS: u64 = 300_000; // 5 minutes

const MIN_FREQUENCY: u64 = 10;
const MAX_FREQUENCY: u64 = 86_400;

/// Validate the stored definition of a monitor (create/update path)
pub fn validate_monitor(monitor: &Monitor) -> Result<(), ConfigError> {
    if monitor.name.trim().is_empty() {
        return Err(ConfigError::EmptyName);
    }

    validate_method(&monitor.method)?;
    validate_frequency(monitor.frequency)?;

    if let Some(timeout) = monitor.timeout_ms {
        validate_timeout(timeout)?;
    }

    // Env can be supplied after creation; a URL still holding a placeholder
    // is checked once it is resolved for execution
    let url = resolve_monitor(monitor).url;
    if !url.contains("{{") {
        validate_url(&url)?;
    }

    validate_header_count(&monitor.headers)?;
    if let Some(body) = &monitor.body {
        validate_body_size(body)?;
    }

    Ok(())
}

/// Validate a request after variable substitution, returning the parsed URL
pub fn validate_resolved(resolved: &ResolvedRequest) -> Result<Url, ConfigError> {
    let url = validate_url(&resolved.url)?;
    validate_method(&resolved.method)?;
    validate_headers(&resolved.headers)?;

    if let Some(body) = &resolved.body {
        validate_body_size(body)?;
    }

    Ok(url)
}

/// Validate URL format and scheme
fn validate_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl { url: raw.to_string(), reason: e.to_string() })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }

    match url.host_str() {
        None | Some("") => {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".into(),
            });
        }
        Some(host) if host.contains('{') || host.contains('}') => {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: "unresolved placeholder in host".into(),
            });
        }
        Some(_) => {}
    }

    Ok(url)
}

fn validate_method(method: &str) -> Result<(), ConfigError> {
    let upper = method.trim().to_uppercase();
    if SUPPORTED_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedMethod(method.to_string()))
    }
}

/// Validate timeout value in milliseconds
pub fn validate_timeout(timeout: u64) -> Result<(), ConfigError> {
    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout) {
        return Err(ConfigError::TimeoutOutOfRange {
            value: timeout,
            min: MIN_TIMEOUT_MS,
            max: MAX_TIMEOUT_MS,
        });
    }
    Ok(())
}

fn validate_frequency(frequency: u64) -> Result<(), ConfigError> {
    if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency) {
        return Err(ConfigError::FrequencyOutOfRange {
            value: frequency,
            min: MIN_FREQUENCY,
            max: MAX_FREQUENCY,
        });
    }
    Ok(())
}

fn validate_header_count(headers: &[Tuple]) -> Result<(), ConfigError> {
    if headers.len() > MAX_HEADERS {
        return Err(ConfigError::TooManyHeaders { count: headers.len(), max: MAX_HEADERS });
    }
    Ok(())
}

fn validate_headers(headers: &[Tuple]) -> Result<(), ConfigError> {
    validate_header_count(headers)?;

    for (name, value) in headers {
        let invalid = |reason: String| ConfigError::InvalidHeader { name: name.clone(), reason };

        if name.len() + value.len() > MAX_HEADER_SIZE {
            return Err(invalid(format!(
                "{} bytes (max: {} bytes)",
                name.len() + value.len(),
                MAX_HEADER_SIZE
            )));
        }

        HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
        HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    }

    Ok(())
}

fn validate_body_size(body: &str) -> Result<(), ConfigError> {
    if body.len() > MAX_BODY_SIZE {
        return Err(ConfigError::BodyTooLarge { size: body.len(), max: MAX_BODY_SIZE });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(url: &str) -> ResolvedRequest {
        ResolvedRequest {
            method: "GET".into(),
            url: url.into(),
            headers: Vec::new(),
            query_params: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_resolved(&resolved("https://example.com")).is_ok());
        assert!(validate_resolved(&resolved("http://example.com:8080/path?x=1")).is_ok());

        assert!(matches!(
            validate_resolved(&resolved("ftp://example.com")),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_resolved(&resolved("not a url")),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_resolved(&resolved("https://{{host}}/x")),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_method() {
        assert!(validate_method("get").is_ok());
        assert!(validate_method("PATCH").is_ok());
        assert!(validate_method("BREW").is_err());
    }

    #[test]
    fn test_validate_headers() {
        let mut resolved = resolved("https://example.com");
        resolved.headers = vec![("x-ok".into(), "fine".into())];
        assert!(validate_resolved(&resolved).is_ok());

        resolved.headers = vec![("bad header".into(), "value".into())];
        assert!(matches!(validate_resolved(&resolved), Err(ConfigError::InvalidHeader { .. })));

        resolved.headers = vec![("x-newline".into(), "a\nb".into())];
        assert!(matches!(validate_resolved(&resolved), Err(ConfigError::InvalidHeader { .. })));

        resolved.headers = (0..=MAX_HEADERS).map(|i| (format!("x-{i}"), "v".into())).collect();
        assert!(matches!(validate_resolved(&resolved), Err(ConfigError::TooManyHeaders { .. })));
    }

    #[test]
    fn test_validate_timeout() {
        assert!(validate_timeout(100).is_ok());
        assert!(validate_timeout(30_000).is_ok());
        assert!(validate_timeout(50).is_err());
        assert!(validate_timeout(600_000).is_err());
    }

    #[test]
    fn test_validate_monitor() {
        let monitor = Monitor::new("acct", "home", "https://example.com");
        assert!(validate_monitor(&monitor).is_ok());

        let mut unnamed = monitor.clone();
        unnamed.name = "  ".into();
        assert_eq!(validate_monitor(&unnamed), Err(ConfigError::EmptyName));

        let mut too_often = monitor;
        too_often.frequency = 1;
        assert!(matches!(
            validate_monitor(&too_often),
            Err(ConfigError::FrequencyOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_monitor_url() {
        let broken = Monitor::new("acct", "broken", "not a url");
        assert!(matches!(validate_monitor(&broken), Err(ConfigError::InvalidUrl { .. })));

        let gopher = Monitor::new("acct", "gopher", "gopher://example.com");
        assert!(matches!(validate_monitor(&gopher), Err(ConfigError::UnsupportedScheme(_))));

        // Resolvable from the monitor's own variables
        let templated =
            Monitor::new("acct", "templated", "https://{{host}}/x").with_variable("host", "example.com");
        assert!(validate_monitor(&templated).is_ok());

        // Left for execution time, when env may provide it
        let pending = Monitor::new("acct", "pending", "https://{{host}}/x");
        assert!(validate_monitor(&pending).is_ok());
    }
}
