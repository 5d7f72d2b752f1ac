//! Pass-through forwarding for declined requests.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream origin
//! - Strip hop-by-hop headers in both directions
//! - Stream the upstream response back unchanged

use std::str::FromStr;

use axum::{
    body::Body,
    http::{header, uri::Authority, uri::PathAndQuery, uri::Scheme, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

/// Connection-scoped headers (RFC 9110 §7.6.1) that must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in named {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Compose the upstream URI for an incoming request URI.
pub fn upstream_uri(upstream: &Url, incoming: &Uri) -> Option<Uri> {
    let scheme = Scheme::from_str(upstream.scheme()).ok()?;
    let host = upstream.host_str()?;
    let authority = match upstream.port() {
        Some(port) => Authority::from_str(&format!("{host}:{port}")).ok()?,
        None => Authority::from_str(host).ok()?,
    };
    let path_and_query = incoming
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .ok()
}

/// Forwards requests to the upstream origin.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    upstream: Url,
}

impl Forwarder {
    pub fn new(upstream: Url) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, upstream }
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub async fn forward(&self, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();

        let Some(uri) = upstream_uri(&self.upstream, &parts.uri) else {
            tracing::error!(upstream = %self.upstream, uri = %parts.uri, "Cannot build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Invalid upstream").into_response();
        };
        parts.uri = uri;
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %self.upstream, error = %e, "Upstream error");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, X-Custom-Hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-custom-hop", HeaderValue::from_static("1"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("accept", HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["accept"], "text/html");
    }

    #[test]
    fn test_upstream_uri() {
        let upstream = Url::parse("http://127.0.0.1:4000/ignored").unwrap();
        let incoming: Uri = "/docs/a.md?raw=1".parse().unwrap();
        let uri = upstream_uri(&upstream, &incoming).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:4000/docs/a.md?raw=1");

        let bare = Url::parse("http://origin.test").unwrap();
        let uri = upstream_uri(&bare, &Uri::from_static("/")).unwrap();
        assert_eq!(uri.to_string(), "http://origin.test/");
    }
}
