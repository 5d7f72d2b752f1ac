//! Proxy loader subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (Intercept)
//!     → table.rs (register LoaderId, state Armed)
//!     → PendingLoader handed to host
//!
//! host calls start(request, receiver, client):
//!     → request.rs (ProxyRequest, trusted params dropped)
//!     → fetch (bounded by fetch timeout)
//!     → transform
//!     → channel.rs (exact-capacity pipe, all-or-nothing write)
//!     → client.rs (metadata + read end, then completion)
//!     → table.rs (release, exactly once)
//! ```
//!
//! # Design Decisions
//! - One loader per request, never re-armed
//! - State changes go through state.rs; terminal states are final
//! - Lifetime is owned by the table, not by the loader itself

pub mod channel;
pub mod client;
pub mod proxy_loader;
pub mod request;
pub mod state;
pub mod table;

pub use client::{loader_endpoint, CompletionStatus, LoaderClient, LoaderReceiver, LoaderRemote, ResponseHead};
pub use proxy_loader::{FailurePolicy, LoaderError, LoaderFactory, LoaderOutcome, LoaderSettings, PendingLoader};
pub use request::{ProxyRequest, ResourceRequest, TrustedParams};
pub use state::{FailureKind, LoaderState};
pub use table::{LoaderId, LoaderStats, LoaderTable};
