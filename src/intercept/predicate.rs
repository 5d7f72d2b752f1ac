//! Interception predicates.
//!
//! # Responsibilities
//! - Match the URL path suffix (case-sensitive)
//! - Match the `Accept` header (case-insensitive substring)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Predicates are pure functions of the request
//! - No regex to keep classification cheap on every request

use crate::loader::request::ResourceRequest;

/// Decides whether a request belongs to an interceptor.
pub trait RequestPredicate: Send + Sync + std::fmt::Debug {
    fn matches(&self, req: &ResourceRequest) -> bool;
}

/// Matches when the URL path ends with a fixed suffix.
#[derive(Debug, Clone)]
pub struct PathSuffix {
    suffix: String,
}

impl PathSuffix {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }
}

impl RequestPredicate for PathSuffix {
    fn matches(&self, req: &ResourceRequest) -> bool {
        req.path().ends_with(&self.suffix)
    }
}

/// Matches when the `Accept` header mentions a media type.
#[derive(Debug, Clone)]
pub struct AcceptContains {
    needle: String,
}

impl AcceptContains {
    /// The needle is normalized to lowercase.
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into().to_lowercase(),
        }
    }
}

impl RequestPredicate for AcceptContains {
    fn matches(&self, req: &ResourceRequest) -> bool {
        req.headers
            .get_all("accept")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_lowercase().contains(&self.needle))
    }
}

/// Combines predicates with AND semantics.
#[derive(Debug)]
pub struct AllOf {
    predicates: Vec<Box<dyn RequestPredicate>>,
}

impl AllOf {
    pub fn new(predicates: Vec<Box<dyn RequestPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RequestPredicate for AllOf {
    fn matches(&self, req: &ResourceRequest) -> bool {
        !self.predicates.is_empty() && self.predicates.iter().all(|p| p.matches(req))
    }
}
