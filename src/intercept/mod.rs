//! Interception subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing request (method, url, headers)
//!     → dispatcher.rs (ordered interceptor scan)
//!     → predicate.rs (evaluate match conditions)
//!     → Decline: host routes normally
//!     → Intercept: loader created, PendingLoader returned
//!
//! Interceptor compilation (at startup / reload):
//!     InterceptorConfig[]
//!     → Sort by priority
//!     → Compile predicates + loader factory
//!     → Freeze as immutable Dispatcher
//! ```
//!
//! # Design Decisions
//! - Deterministic: same request always gets the same decision
//! - Predicates are pluggable (suffix, Accept header, combinations)

pub mod dispatcher;
pub mod predicate;

pub use dispatcher::{Dispatcher, InterceptDecision, Interceptor};
pub use predicate::{AcceptContains, AllOf, PathSuffix, RequestPredicate};
