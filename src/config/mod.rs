//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → Dispatcher built from [[interceptors]] + [loader]
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new Dispatcher swapped in atomically
//!     → in-flight loaders finish under the settings they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener and upstream changes need a restart; interceptors do not

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AppConfig, InterceptorConfig, ListenerConfig, LoaderConfig, MarkdownConfig, MarkdownExtension,
    ObservabilityConfig, TimeoutConfig, TransformKind, UpstreamConfig,
};
pub use watcher::ConfigWatcher;
