//! Interception dispatch.
//!
//! # Responsibilities
//! - Hold the ordered list of `(predicate, loader factory)` pairs
//! - Classify each request as Intercept or Decline
//! - On Intercept, create a loader and hand back its start capability
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new dispatcher that
//!   shares the same loader table
//! - First match wins (ordered by priority, then declaration order)
//! - `decide` never creates anything; only `maybe_create_loader` does

use std::sync::Arc;

use crate::config::schema::{AppConfig, InterceptorConfig};
use crate::fetch::ProxyFetcher;
use crate::intercept::predicate::{AcceptContains, AllOf, PathSuffix, RequestPredicate};
use crate::loader::{LoaderFactory, LoaderTable, PendingLoader, ResourceRequest};
use crate::observability::metrics;
use crate::transform;

/// Whether a request is taken over by an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDecision {
    Decline,
    Intercept,
}

/// One registered interceptor.
#[derive(Debug)]
pub struct Interceptor {
    name: String,
    predicate: Box<dyn RequestPredicate>,
    factory: LoaderFactory,
}

impl Interceptor {
    pub fn new(name: impl Into<String>, predicate: Box<dyn RequestPredicate>, factory: LoaderFactory) -> Self {
        Self {
            name: name.into(),
            predicate,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile an interceptor from its config entry.
    pub fn from_config(config: &InterceptorConfig, factory: LoaderFactory) -> Self {
        let mut predicates: Vec<Box<dyn RequestPredicate>> = Vec::new();
        if let Some(suffix) = &config.path_suffix {
            predicates.push(Box::new(PathSuffix::new(suffix.clone())));
        }
        if let Some(accept) = &config.accept_contains {
            predicates.push(Box::new(AcceptContains::new(accept.clone())));
        }

        let predicate: Box<dyn RequestPredicate> = if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Box::new(AllOf::new(predicates))
        };
        Self::new(config.name.clone(), predicate, factory)
    }
}

/// Routes requests to interceptors.
#[derive(Debug)]
pub struct Dispatcher {
    interceptors: Vec<Interceptor>,
    table: Arc<LoaderTable>,
}

impl Dispatcher {
    pub fn new(interceptors: Vec<Interceptor>, table: Arc<LoaderTable>) -> Self {
        Self { interceptors, table }
    }

    /// Build from configuration, sorting interceptors by priority.
    pub fn from_config(config: &AppConfig, fetcher: Arc<dyn ProxyFetcher>, table: Arc<LoaderTable>) -> Self {
        let mut ordered: Vec<&InterceptorConfig> = config.interceptors.iter().collect();
        // Stable sort keeps declaration order among equal priorities.
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let settings = config.loader.settings();
        let interceptors = ordered
            .into_iter()
            .map(|ic| {
                let transform = transform::build(ic.transform, &config.markdown);
                let factory = LoaderFactory::new(Arc::clone(&fetcher), transform, settings.clone());
                Interceptor::from_config(ic, factory)
            })
            .collect::<Vec<_>>();

        tracing::info!(
            interceptors = ?interceptors.iter().map(Interceptor::name).collect::<Vec<_>>(),
            "Dispatcher configured"
        );
        Self::new(interceptors, table)
    }

    fn find(&self, req: &ResourceRequest) -> Option<&Interceptor> {
        self.interceptors.iter().find(|i| i.predicate.matches(req))
    }

    /// Pure classification; creates nothing.
    pub fn decide(&self, req: &ResourceRequest) -> InterceptDecision {
        match self.find(req) {
            Some(_) => InterceptDecision::Intercept,
            None => InterceptDecision::Decline,
        }
    }

    /// Create a loader for `req` if an interceptor claims it.
    ///
    /// `None` means the host should route the request normally.
    pub fn maybe_create_loader(&self, req: &ResourceRequest) -> Option<PendingLoader> {
        let Some(interceptor) = self.find(req) else {
            metrics::record_decision(InterceptDecision::Decline);
            return None;
        };

        metrics::record_decision(InterceptDecision::Intercept);
        let pending = interceptor
            .factory
            .create(&self.table, &interceptor.name, req.url.as_str());
        tracing::debug!(
            interceptor = %interceptor.name,
            url = %req.url,
            loader_id = ?pending.id(),
            "Intercepting document"
        );
        Some(pending)
    }

    pub fn table(&self) -> &Arc<LoaderTable> {
        &self.table
    }

    pub fn interceptor_names(&self) -> Vec<&str> {
        self.interceptors.iter().map(Interceptor::name).collect()
    }
}
