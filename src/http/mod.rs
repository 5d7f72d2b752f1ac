//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → dispatcher decides
//!         → Decline: forward.rs (pass-through to upstream)
//!         → Intercept: intercept.rs (start loader, stream transformed body)
//!     → Send to client
//! ```

pub mod forward;
pub mod intercept;
pub mod server;

pub use server::{AppState, HttpServer, ServerError, LOADERS_PATH};
