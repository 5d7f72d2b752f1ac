//! Bridges a proxy loader onto an HTTP response.
//!
//! # Responsibilities
//! - Turn an incoming request into a `ResourceRequest` for the dispatcher
//! - Start the loader and wait for its first notification
//! - Map metadata to a streamed 200 and failures to an error status
//!
//! # Design Decisions
//! - The handler future owns the loader remote; if the client goes away the
//!   future is dropped and the loader sees a disconnect
//! - A loader that ends without notifying (silent policy) leaves the request
//!   hanging until the host's request timeout

use axum::{
    body::Body,
    http::{header, request::Parts, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use tokio::sync::oneshot;
use url::Url;

use crate::http::forward::strip_hop_by_hop;
use crate::loader::channel::ChannelConsumer;
use crate::loader::{
    loader_endpoint, CompletionStatus, FailureKind, LoaderClient, PendingLoader, ResourceRequest, ResponseHead,
};

/// First notification from the loader.
#[derive(Debug)]
pub enum BridgeEvent {
    Metadata(ResponseHead, ChannelConsumer),
    Failed(FailureKind),
}

/// `LoaderClient` that forwards the first notification over a oneshot.
#[derive(Debug)]
pub struct BridgeClient {
    tx: Option<oneshot::Sender<BridgeEvent>>,
}

impl BridgeClient {
    pub fn new() -> (Self, oneshot::Receiver<BridgeEvent>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn send(&mut self, event: BridgeEvent) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(event);
        }
    }
}

impl LoaderClient for BridgeClient {
    fn on_response_metadata(&mut self, head: ResponseHead, body: ChannelConsumer) {
        self.send(BridgeEvent::Metadata(head, body));
    }

    fn on_complete(&mut self, status: CompletionStatus) {
        if let Some(kind) = status.error {
            self.send(BridgeEvent::Failed(kind));
        }
    }
}

/// Build the dispatcher's view of an incoming request.
///
/// The path and query are grafted onto the upstream origin. The body is
/// attached later, only once a request is intercepted.
pub fn resource_request(upstream: &Url, parts: &Parts) -> ResourceRequest {
    let mut url = upstream.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    ResourceRequest {
        method: parts.method.clone(),
        url,
        headers,
        body: None,
        trusted_params: None,
    }
}

/// Status code reported for a synthetic loader failure.
pub fn failure_status(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::FetchFailed | FailureKind::TransformFailed => StatusCode::BAD_GATEWAY,
        FailureKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::ChannelWriteFailed | FailureKind::ConsumerDisconnected | FailureKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run an intercepted request to its HTTP response.
pub async fn serve(pending: PendingLoader, request: ResourceRequest, request_id: &str) -> Response<Body> {
    let (remote, receiver) = loader_endpoint();
    let (client, events) = BridgeClient::new();
    let loader_id = pending.id();
    let _task = pending.start(request, receiver, client);

    let event = events.await;
    // Past the first notification the loader has no more work to cancel.
    drop(remote);

    match event {
        Ok(BridgeEvent::Metadata(head, consumer)) => {
            let mut response = Response::new(Body::from_stream(consumer));
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&head.content_type()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(head.content_length));
            response
        }
        Ok(BridgeEvent::Failed(kind)) => {
            tracing::warn!(request_id = %request_id, loader_id = ?loader_id, reason = %kind, "Responding with synthetic error");
            (failure_status(kind), format!("Interception failed: {kind}")).into_response()
        }
        Err(_) => {
            tracing::debug!(request_id = %request_id, loader_id = ?loader_id, "Loader ended without notifying");
            std::future::pending().await
        }
    }
}
