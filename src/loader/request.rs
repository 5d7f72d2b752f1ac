//! Original and proxy request types.
//!
//! # Responsibilities
//! - Carry the intercepted request as the host hands it over
//! - Derive the proxy request that is actually sent upstream
//!
//! # Design Decisions
//! - `ProxyRequest` has no trusted-params field at all, so the proxy fetch
//!   cannot inherit the caller's elevated network privileges
//! - Headers and body are copied verbatim except for the ones the transport
//!   owns (content coding, ranges, framing), so the transform always sees the
//!   complete decoded entity

use axum::http::{header, HeaderMap, HeaderName, Method};
use bytes::Bytes;
use url::Url;

/// Privileged parameters the host attaches to requests it trusts.
///
/// These never leave the intercepted request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedParams {
    /// Network isolation key of the initiating frame.
    pub isolation_key: Option<String>,
    /// Site used for first-party cookie decisions.
    pub site_for_cookies: Option<String>,
    /// Whether the request was triggered by a user gesture.
    pub has_user_activation: bool,
    /// Bypass secure DNS for this request.
    pub disable_secure_dns: bool,
}

/// A resource request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub trusted_params: Option<TrustedParams>,
}

impl ResourceRequest {
    /// Create a body-less GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
            trusted_params: None,
        }
    }

    /// URL path, used by the interception predicates.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// Headers negotiated by the fetch transport, never by the caller.
const TRANSPORT_OWNED: [HeaderName; 3] = [header::ACCEPT_ENCODING, header::RANGE, header::CONTENT_LENGTH];

/// The re-issued request that fetches the real bytes.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl From<&ResourceRequest> for ProxyRequest {
    fn from(original: &ResourceRequest) -> Self {
        if original.trusted_params.is_some() {
            tracing::trace!(url = %original.url, "Dropping trusted params from proxy request");
        }
        let mut headers = original.headers.clone();
        for name in &TRANSPORT_OWNED {
            headers.remove(name);
        }
        Self {
            method: original.method.clone(),
            url: original.url.clone(),
            headers,
            body: original.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn proxy_request_copies_everything_but_trusted_params() {
        let mut original = ResourceRequest::get(Url::parse("http://example.test/doc.md").unwrap());
        original.method = Method::POST;
        original
            .headers
            .insert("accept", HeaderValue::from_static("text/markdown"));
        original.body = Some(Bytes::from_static(b"payload"));
        original.trusted_params = Some(TrustedParams {
            isolation_key: Some("https://example.test".into()),
            has_user_activation: true,
            ..Default::default()
        });

        let proxy = ProxyRequest::from(&original);
        assert_eq!(proxy.method, Method::POST);
        assert_eq!(proxy.url.as_str(), "http://example.test/doc.md");
        assert_eq!(proxy.headers.get("accept").unwrap(), "text/markdown");
        assert_eq!(proxy.body.as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn proxy_request_leaves_encoding_and_ranges_to_the_transport() {
        let mut original = ResourceRequest::get(Url::parse("http://example.test/doc.md").unwrap());
        original
            .headers
            .insert("accept-encoding", HeaderValue::from_static("gzip, deflate, br"));
        original.headers.insert("range", HeaderValue::from_static("bytes=0-3"));
        original.headers.insert("content-length", HeaderValue::from_static("0"));
        original.headers.insert("accept", HeaderValue::from_static("text/html"));

        let proxy = ProxyRequest::from(&original);
        assert!(proxy.headers.get("accept-encoding").is_none());
        assert!(proxy.headers.get("range").is_none());
        assert!(proxy.headers.get("content-length").is_none());
        assert_eq!(proxy.headers["accept"], "text/html");
    }

    #[test]
    fn path_ignores_query() {
        let req = ResourceRequest::get(Url::parse("http://example.test/a/readme.md?raw=1").unwrap());
        assert_eq!(req.path(), "/a/readme.md");
    }
}
