//! Markdown interceptor library.
//!
//! Classifies outgoing requests, takes over the ones an interceptor claims,
//! re-fetches them through a proxy loader, transforms the body (Markdown to
//! HTML) and hands the result back through a bounded channel.

pub mod config;
pub mod fetch;
pub mod http;
pub mod intercept;
pub mod lifecycle;
pub mod loader;
pub mod observability;
pub mod transform;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use intercept::Dispatcher;
pub use lifecycle::Shutdown;
