//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! interceptor. All types derive Serde traits for deserialization from
//! config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loader::{FailurePolicy, LoaderSettings};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin that declined requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Ordered interceptor definitions.
    pub interceptors: Vec<InterceptorConfig>,

    /// Per-loader limits and failure policy.
    pub loader: LoaderConfig,

    /// Markdown transform options.
    pub markdown: MarkdownConfig,

    /// Host request timeouts.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Defaults plus the reference `.md` interceptor.
    pub fn with_markdown_defaults() -> Self {
        Self {
            interceptors: vec![InterceptorConfig::markdown()],
            ..Self::default()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; only scheme, host and port are used.
    pub base_url: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Transform applied by an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[default]
    Markdown,
}

/// One interception rule. All present predicates must match.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptorConfig {
    /// Identifier for logging/metrics.
    pub name: String,

    /// URL path suffix to match (case-sensitive).
    pub path_suffix: Option<String>,

    /// Substring the `Accept` header must contain (case-insensitive).
    pub accept_contains: Option<String>,

    /// Transform to run on matched documents.
    #[serde(default)]
    pub transform: TransformKind,

    /// Interceptor priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

impl InterceptorConfig {
    /// `.md` suffix → markdown.
    pub fn markdown() -> Self {
        Self {
            name: "markdown".to_string(),
            path_suffix: Some(".md".to_string()),
            accept_contains: None,
            transform: TransformKind::Markdown,
            priority: 0,
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Proxy fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Optional end-to-end deadline (fetch + transform + respond) in seconds.
    pub deadline_secs: Option<u64>,

    /// Largest transformed document a response channel may hold.
    pub max_channel_capacity: usize,

    /// What the consumer hears when a loader fails.
    pub failure_policy: FailurePolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 99,
            deadline_secs: None,
            max_channel_capacity: 64 * 1024 * 1024, // 64MB
            failure_policy: FailurePolicy::SyntheticError,
        }
    }
}

impl LoaderConfig {
    pub fn settings(&self) -> LoaderSettings {
        LoaderSettings {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            deadline: self.deadline_secs.map(Duration::from_secs),
            max_channel_capacity: self.max_channel_capacity,
            failure_policy: self.failure_policy,
        }
    }
}

/// CommonMark extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownExtension {
    Tables,
    Strikethrough,
    Tasklists,
    Footnotes,
    SmartPunctuation,
}

/// Markdown transform configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Enabled extensions; empty means plain CommonMark.
    pub extensions: Vec<MarkdownExtension>,
}

/// Timeout configuration for the host server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 120 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
