//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every interceptor can actually match something
//! - Validate value ranges (timeouts > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("upstream.base_url '{0}' is not a valid http URL")]
    UpstreamUrl(String),

    #[error("interceptor '{0}' has no predicate (path_suffix or accept_contains)")]
    NoPredicate(String),

    #[error("interceptor '{0}' has an empty predicate value")]
    EmptyPredicate(String),

    #[error("duplicate interceptor name '{0}'")]
    DuplicateInterceptor(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    // Pass-through forwarding uses a plain HTTP connector.
    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" && url.host_str().is_some() => {}
        _ => errors.push(ValidationError::UpstreamUrl(config.upstream.base_url.clone())),
    }

    let mut names = HashSet::new();
    for interceptor in &config.interceptors {
        if !names.insert(interceptor.name.as_str()) {
            errors.push(ValidationError::DuplicateInterceptor(interceptor.name.clone()));
        }
        match (&interceptor.path_suffix, &interceptor.accept_contains) {
            (None, None) => errors.push(ValidationError::NoPredicate(interceptor.name.clone())),
            (suffix, accept) => {
                let empty = |v: &Option<String>| v.as_deref().is_some_and(str::is_empty);
                if empty(suffix) || empty(accept) {
                    errors.push(ValidationError::EmptyPredicate(interceptor.name.clone()));
                }
            }
        }
    }

    if config.loader.fetch_timeout_secs == 0 {
        errors.push(ValidationError::Zero("loader.fetch_timeout_secs"));
    }
    if config.loader.deadline_secs == Some(0) {
        errors.push(ValidationError::Zero("loader.deadline_secs"));
    }
    if config.loader.max_channel_capacity == 0 {
        errors.push(ValidationError::Zero("loader.max_channel_capacity"));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero("upstream.connect_timeout_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(config.observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
