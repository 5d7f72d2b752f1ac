//! Content transform subsystem.
//!
//! # Data Flow
//! ```text
//! complete upstream body (bytes)
//!     → Transform::transform
//!     → TransformedDocument { bytes, charset, mime_type }
//!     → response channel
//! ```
//!
//! # Design Decisions
//! - Transforms are opaque to the loader: bytes in, document or error out
//! - Async so a transform may offload work; the markdown one runs inline
//! - Assumed deterministic and free of side effects

pub mod markdown;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::schema::{MarkdownConfig, TransformKind};

pub use markdown::MarkdownTransform;

/// Output of a successful transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedDocument {
    pub bytes: Bytes,
    pub charset: String,
    pub mime_type: String,
}

impl TransformedDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("input is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("transform rejected input: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Transform: Send + Sync + std::fmt::Debug {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    async fn transform(&self, body: Bytes) -> Result<TransformedDocument, TransformError>;
}

/// Build the transform an interceptor is configured with.
pub fn build(kind: TransformKind, markdown: &MarkdownConfig) -> Arc<dyn Transform> {
    match kind {
        TransformKind::Markdown => Arc::new(MarkdownTransform::from_config(markdown)),
    }
}
