//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and loaders produce:
//!     → logging.rs (structured log events, loader id on every line)
//!     → metrics.rs (decision counters, terminal outcomes, latencies)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the HTTP layer into loader log lines
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
