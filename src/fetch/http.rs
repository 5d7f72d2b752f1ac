//! HTTP proxy fetcher backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::fetch::{FetchError, FetchedResponse, ProxyFetcher};
use crate::loader::request::ProxyRequest;

/// Fetches over the shared reqwest connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("markdown-interceptor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProxyFetcher for HttpFetcher {
    async fn issue(&self, request: ProxyRequest, timeout: Duration) -> Result<FetchedResponse, FetchError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| map_error(e, timeout))?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = %status, "Proxy fetch returned error status, discarding body");
            return Ok(FetchedResponse { status, body: None });
        }

        let body = response.bytes().await.map_err(|e| map_error(e, timeout))?;
        Ok(FetchedResponse {
            status,
            body: Some(body),
        })
    }
}

fn map_error(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(e.to_string())
    }
}
