//! Downstream endpoints bound by `start()`.
//!
//! # Responsibilities
//! - `LoaderClient`: notification sink for response metadata and completion
//! - `LoaderRemote` / `LoaderReceiver`: the control pipe between consumer and
//!   loader; dropping the remote is how a consumer disconnects
//!
//! # Design Decisions
//! - Control messages are accepted and ignored; the loader has no redirect,
//!   priority or flow-control behaviour
//! - Metadata and completion are each delivered at most once

use tokio::sync::mpsc;

use crate::loader::channel::ChannelConsumer;
use crate::loader::state::FailureKind;

/// Response metadata delivered before the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub mime_type: String,
    pub charset: String,
    pub content_length: u64,
}

impl ResponseHead {
    /// Value for a `content-type` header.
    pub fn content_type(&self) -> String {
        format!("{}; charset={}", self.mime_type, self.charset)
    }
}

/// Final status for a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStatus {
    pub error: Option<FailureKind>,
    pub decoded_body_length: u64,
}

impl CompletionStatus {
    pub fn ok(decoded_body_length: u64) -> Self {
        Self {
            error: None,
            decoded_body_length,
        }
    }

    pub fn failed(kind: FailureKind) -> Self {
        Self {
            error: Some(kind),
            decoded_body_length: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The original request's consumer.
pub trait LoaderClient: Send + 'static {
    /// Response headers plus the channel's read end.
    fn on_response_metadata(&mut self, head: ResponseHead, body: ChannelConsumer);

    /// End of the load. Success only ever follows `on_response_metadata`.
    fn on_complete(&mut self, status: CompletionStatus);
}

/// Messages a consumer may send to a running loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderControl {
    FollowRedirect,
    SetPriority(i32),
    PauseReadingBody,
    ResumeReadingBody,
}

/// Create a connected remote/receiver pair.
pub fn loader_endpoint() -> (LoaderRemote, LoaderReceiver) {
    let (tx, rx) = mpsc::channel(8);
    (LoaderRemote { tx }, LoaderReceiver { rx })
}

/// Consumer side of the control pipe.
#[derive(Debug)]
pub struct LoaderRemote {
    tx: mpsc::Sender<LoaderControl>,
}

impl LoaderRemote {
    /// Best-effort control message; dropped if the loader is gone or busy.
    pub fn send(&self, message: LoaderControl) {
        let _ = self.tx.try_send(message);
    }

    /// Disconnect from the loader.
    pub fn disconnect(self) {
        drop(self);
    }
}

/// Loader side of the control pipe.
#[derive(Debug)]
pub struct LoaderReceiver {
    rx: mpsc::Receiver<LoaderControl>,
}

impl LoaderReceiver {
    /// Resolves once the consumer has dropped its remote.
    pub async fn disconnected(&mut self) {
        while let Some(message) = self.rx.recv().await {
            tracing::trace!(?message, "Ignoring loader control message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn control_messages_do_not_count_as_disconnect() {
        let (remote, mut receiver) = loader_endpoint();
        remote.send(LoaderControl::SetPriority(3));
        remote.send(LoaderControl::FollowRedirect);

        let waited = tokio::time::timeout(Duration::from_millis(50), receiver.disconnected()).await;
        assert!(waited.is_err(), "remote still alive");

        remote.disconnect();
        tokio::time::timeout(Duration::from_millis(50), receiver.disconnected())
            .await
            .expect("disconnect observed");
    }

    #[test]
    fn content_type_joins_mime_and_charset() {
        let head = ResponseHead {
            mime_type: "text/html".into(),
            charset: "utf-8".into(),
            content_length: 12,
        };
        assert_eq!(head.content_type(), "text/html; charset=utf-8");
    }
}
