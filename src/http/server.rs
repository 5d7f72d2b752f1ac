//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the interception handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Own the shared loader table and the hot-swappable dispatcher
//! - Apply config reloads without dropping in-flight loaders
//! - Expose in-flight loaders for inspection

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::AppConfig;
use crate::fetch::{FetchError, HttpFetcher, ProxyFetcher};
use crate::http::forward::Forwarder;
use crate::http::intercept;
use crate::intercept::Dispatcher;
use crate::loader::table::LoaderSnapshot;
use crate::loader::{LoaderStats, LoaderTable};

/// Largest request body buffered for an intercepted request.
const MAX_INTERCEPTED_BODY: usize = 1024 * 1024;

/// Path of the loader inspection endpoint.
pub const LOADERS_PATH: &str = "/_interceptor/loaders";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid upstream URL: {0}")]
    Upstream(#[from] url::ParseError),

    #[error("failed to build proxy fetcher: {0}")]
    Fetcher(#[from] FetchError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ArcSwap<Dispatcher>>,
    pub forwarder: Forwarder,
}

/// HTTP host that intercepts matching requests.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    dispatcher: Arc<ArcSwap<Dispatcher>>,
    fetcher: Arc<dyn ProxyFetcher>,
}

impl HttpServer {
    /// Create a server with the default reqwest-backed fetcher.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.upstream.connect_timeout_secs))?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a server with a caller-provided fetcher.
    pub fn with_fetcher(config: AppConfig, fetcher: Arc<dyn ProxyFetcher>) -> Result<Self, ServerError> {
        let upstream = Url::parse(&config.upstream.base_url)?;
        let table = Arc::new(LoaderTable::new());
        let dispatcher = Arc::new(ArcSwap::from_pointee(Dispatcher::from_config(
            &config,
            Arc::clone(&fetcher),
            table,
        )));

        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
            forwarder: Forwarder::new(upstream),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            dispatcher,
            fetcher,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route(LOADERS_PATH, get(loaders_handler))
            .route("/{*path}", any(intercept_handler))
            .route("/", any(intercept_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Shared loader table.
    pub fn table(&self) -> Arc<LoaderTable> {
        Arc::clone(self.dispatcher.load().table())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the dispatcher. Loaders
    /// already created keep running with the factory they were created by.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let fetcher = Arc::clone(&self.fetcher);
        let current = self.config.clone();
        let reload = tokio::spawn(async move {
            while let Some(next) = config_updates.recv().await {
                apply_reload(&dispatcher, &fetcher, &current, &next);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

fn apply_reload(
    dispatcher: &ArcSwap<Dispatcher>,
    fetcher: &Arc<dyn ProxyFetcher>,
    running: &AppConfig,
    next: &AppConfig,
) {
    if next.listener.bind_address != running.listener.bind_address
        || next.upstream.base_url != running.upstream.base_url
    {
        tracing::warn!("Listener and upstream changes take effect after a restart");
    }

    let table = Arc::clone(dispatcher.load().table());
    let rebuilt = Dispatcher::from_config(next, Arc::clone(fetcher), table);
    dispatcher.store(Arc::new(rebuilt));
    tracing::info!(interceptors = next.interceptors.len(), "Interceptors reloaded");
}

fn request_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Intercept or forward every non-admin request.
async fn intercept_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request);
    let (parts, body) = request.into_parts();

    let dispatcher = state.dispatcher.load_full();
    let mut resource = intercept::resource_request(state.forwarder.upstream(), &parts);

    let Some(pending) = dispatcher.maybe_create_loader(&resource) else {
        tracing::debug!(request_id = %request_id, path = %parts.uri.path(), "Forwarding request");
        return state.forwarder.forward(Request::from_parts(parts, body)).await;
    };

    match axum::body::to_bytes(body, MAX_INTERCEPTED_BODY).await {
        Ok(bytes) if !bytes.is_empty() => resource.body = Some(bytes),
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read intercepted request body");
            // Never started, so the loader is released as abandoned.
            drop(pending);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    }

    intercept::serve(pending, resource, &request_id).await
}

#[derive(Debug, Serialize)]
struct LoadersView {
    interceptors: Vec<String>,
    stats: LoaderStats,
    loaders: Vec<LoaderSnapshot>,
}

async fn loaders_handler(State(state): State<AppState>) -> Json<LoadersView> {
    let dispatcher = state.dispatcher.load();
    let table = dispatcher.table();
    Json(LoadersView {
        interceptors: dispatcher.interceptor_names().into_iter().map(String::from).collect(),
        stats: table.stats(),
        loaders: table.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterceptorConfig;
    use crate::loader::ResourceRequest;

    fn server(config: AppConfig) -> HttpServer {
        HttpServer::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_bad_upstream() {
        let mut config = AppConfig::with_markdown_defaults();
        config.upstream.base_url = "not a url".into();
        assert!(matches!(HttpServer::new(config), Err(ServerError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_reload_keeps_table() {
        let server = server(AppConfig::with_markdown_defaults());
        let table = server.table();

        let req = ResourceRequest::get(Url::parse("http://127.0.0.1:3000/a.md").unwrap());
        let pending = server.dispatcher.load().maybe_create_loader(&req).unwrap();
        assert_eq!(table.len(), 1);

        let mut next = AppConfig::with_markdown_defaults();
        next.interceptors = vec![InterceptorConfig {
            name: "markdown-v2".into(),
            ..InterceptorConfig::markdown()
        }];
        apply_reload(&server.dispatcher, &server.fetcher, server.config(), &next);

        assert!(Arc::ptr_eq(&table, &server.table()));
        assert_eq!(server.dispatcher.load().interceptor_names(), vec!["markdown-v2"]);
        assert_eq!(table.len(), 1, "existing loader survives the swap");

        drop(pending);
        assert!(table.is_empty());
    }
}
