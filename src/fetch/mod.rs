//! Proxy fetch subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (trusted params already stripped)
//!     → ProxyFetcher::issue (bounded by the fetch timeout)
//!     → FetchedResponse { status, body }
//!     → classify(): non-2xx or empty body → FetchError
//!     → ProxyResult
//! ```
//!
//! # Design Decisions
//! - Fetchers report what the network returned; status and emptiness are
//!   classified by the caller in one place
//! - Error bodies are never read, let alone passed through
//! - No retries: a failed fetch is terminal for the loader

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::loader::request::ProxyRequest;

pub use http::HttpFetcher;

/// Outcome of the proxy fetch as the loader consumes it.
pub type ProxyResult = Result<Bytes, FetchError>;

/// Raw response from a fetcher.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    /// `None` when the fetcher did not read a body (e.g. error status).
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned {0}")]
    Status(StatusCode),

    #[error("no upstream body")]
    NoUpstreamBody,
}

/// Issues proxy requests through the normal network path.
#[async_trait]
pub trait ProxyFetcher: Send + Sync + std::fmt::Debug {
    async fn issue(&self, request: ProxyRequest, timeout: Duration) -> Result<FetchedResponse, FetchError>;
}

/// Turn a raw response into a complete body or a failure.
pub fn classify(response: FetchedResponse) -> ProxyResult {
    if !response.status.is_success() {
        return Err(FetchError::Status(response.status));
    }
    match response.body {
        Some(body) if !body.is_empty() => Ok(body),
        _ => Err(FetchError::NoUpstreamBody),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: Option<&'static str>) -> FetchedResponse {
        FetchedResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.map(|b| Bytes::from_static(b.as_bytes())),
        }
    }

    #[test]
    fn success_with_body_is_complete() {
        assert_eq!(classify(response(200, Some("# Hi"))).unwrap(), Bytes::from_static(b"# Hi"));
        assert!(classify(response(203, Some("x"))).is_ok());
    }

    #[test]
    fn empty_or_missing_body_is_failure() {
        assert_eq!(classify(response(200, Some(""))), Err(FetchError::NoUpstreamBody));
        assert_eq!(classify(response(200, None)), Err(FetchError::NoUpstreamBody));
    }

    #[test]
    fn non_2xx_is_failure_even_with_body() {
        assert_eq!(
            classify(response(404, Some("not found"))),
            Err(FetchError::Status(StatusCode::NOT_FOUND))
        );
        assert!(classify(response(301, Some("moved"))).is_err());
        assert!(classify(response(500, None)).is_err());
    }
}
