//! Metrics collection and exposition.
//!
//! # Metrics
//! - `interceptor_decisions_total` (counter): decisions by `decision`
//! - `interceptor_loaders_terminal_total` (counter): by `outcome`, `reason`
//! - `interceptor_transform_bytes` (histogram): transformed document sizes
//! - `interceptor_loader_duration_seconds` (histogram): start to terminal
//!
//! # Design Decisions
//! - Recording without an installed recorder is a cheap no-op
//! - The exporter is only started when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::intercept::InterceptDecision;
use crate::loader::FailureKind;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_decision(decision: InterceptDecision) {
    let label = match decision {
        InterceptDecision::Decline => "decline",
        InterceptDecision::Intercept => "intercept",
    };
    ::metrics::counter!("interceptor_decisions_total", "decision" => label).increment(1);
}

/// Record a loader reaching Done or Failed.
pub fn record_terminal(outcome: &'static str, reason: Option<FailureKind>, started: Instant) {
    let reason = reason.map(|k| k.as_str()).unwrap_or("none");
    ::metrics::counter!(
        "interceptor_loaders_terminal_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
    ::metrics::histogram!("interceptor_loader_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_transform_bytes(transform: &'static str, len: usize) {
    ::metrics::histogram!("interceptor_transform_bytes", "transform" => transform).record(len as f64);
}
