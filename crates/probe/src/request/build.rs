//! Request construction from a resolved monitor.

use bytes::Bytes;
use http::header::{CONNECTION, HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;
use url::form_urlencoded;

use crate::error::ConfigError;
use crate::variables::ResolvedRequest;

/// Default user agent sent when the monitor does not set one
pub const DEFAULT_USER_AGENT: &str = concat!("httpmon/", env!("CARGO_PKG_VERSION"));

/// A request ready to go through the instrumented transport
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Parsed target, including query params
    pub url: Url,
    /// URL as the user wrote it after substitution, with query params appended
    pub display_url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PreparedRequest {
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Origin-form request target (`/path?query`)
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Assemble method, url, headers, query params and body.
///
/// `url` is the already validated form of `resolved.url`.
pub fn build_request(
    resolved: &ResolvedRequest,
    mut url: Url,
    user_agent: &str,
) -> Result<PreparedRequest, ConfigError> {
    let method = Method::from_bytes(resolved.method.as_bytes())
        .map_err(|_| ConfigError::UnsupportedMethod(resolved.method.clone()))?;

    let mut display_url = resolved.url.clone();
    if !resolved.query_params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(resolved.query_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(resolved.query_params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        let separator = if display_url.contains('?') { '&' } else { '?' };
        display_url.push(separator);
        display_url.push_str(&encoded);
    }

    let mut headers = HeaderMap::new();
    for (name, value) in &resolved.headers {
        let invalid = |reason: String| ConfigError::InvalidHeader { name: name.clone(), reason };
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        // Repeated names are kept, in order
        headers.append(header_name, header_value);
    }

    if !headers.contains_key(HOST) {
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };
        let value = HeaderValue::from_str(&host)
            .map_err(|e| ConfigError::InvalidUrl { url: resolved.url.clone(), reason: e.to_string() })?;
        headers.insert(HOST, value);
    }

    if !headers.contains_key(USER_AGENT) {
        let value = HeaderValue::from_str(user_agent).map_err(|e| ConfigError::InvalidHeader {
            name: USER_AGENT.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(USER_AGENT, value);
    }

    // One request per connection
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    let body = resolved.body.clone().map(Bytes::from).unwrap_or_default();

    Ok(PreparedRequest { method, url, display_url, headers, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> ResolvedRequest {
        ResolvedRequest {
            method: "POST".into(),
            url: "https://example.com:8443/items/{{missing}}".into(),
            headers: vec![
                ("x-trace".into(), "1".into()),
                ("x-trace".into(), "2".into()),
            ],
            query_params: vec![("q".into(), "a b".into())],
            body: Some("payload".into()),
        }
    }

    #[test]
    fn test_build_request() {
        let resolved = resolved();
        let url = Url::parse(&resolved.url).unwrap();
        let request = build_request(&resolved, url, DEFAULT_USER_AGENT).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.host(), "example.com");
        assert_eq!(request.port(), 8443);
        assert!(request.is_tls());
        assert_eq!(request.target(), "/items/%7B%7Bmissing%7D%7D?q=a+b");
        assert_eq!(request.display_url, "https://example.com:8443/items/{{missing}}?q=a+b");
        assert_eq!(request.headers.get_all("x-trace").iter().count(), 2);
        assert_eq!(request.headers[HOST], "example.com:8443");
        assert_eq!(request.headers[USER_AGENT], DEFAULT_USER_AGENT);
        assert_eq!(request.headers[CONNECTION], "close");
        assert_eq!(request.body, Bytes::from("payload"));
    }

    #[test]
    fn test_user_agent_not_overridden() {
        let mut resolved = resolved();
        resolved.headers = vec![("User-Agent".into(), "custom/1.0".into())];
        let url = Url::parse(&resolved.url).unwrap();
        let request = build_request(&resolved, url, DEFAULT_USER_AGENT).unwrap();
        assert_eq!(request.headers[USER_AGENT], "custom/1.0");
    }
}
