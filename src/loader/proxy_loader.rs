//! Per-request proxy loader.
//!
//! # Responsibilities
//! - Issue the proxy fetch for one intercepted request
//! - Run the transform over the complete body
//! - Deliver the result through a bounded channel to the consumer
//! - Release its table registration on the terminal path
//!
//! # Design Decisions
//! - `PendingLoader` is the deferred start capability; `start` consumes it so
//!   a loader can be started at most once
//! - Dropping an unstarted `PendingLoader` releases it as abandoned
//! - The whole pipeline races the consumer's disconnect and an optional
//!   end-to-end deadline; losing either race drops the in-flight work

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::fetch::{self, FetchError, ProxyFetcher};
use crate::loader::channel::{self, ChannelConsumer, ChannelError, ChannelProducer};
use crate::loader::client::{CompletionStatus, LoaderClient, LoaderReceiver, ResponseHead};
use crate::loader::request::{ProxyRequest, ResourceRequest};
use crate::loader::state::{FailureKind, InvalidTransition, LoaderState, LoaderStateMachine};
use crate::loader::table::{LoaderId, LoaderTable, Release};
use crate::observability::metrics;
use crate::transform::{Transform, TransformError, TransformedDocument};

/// What the consumer hears when a loader fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Send one error completion (never metadata).
    #[default]
    SyntheticError,
    /// Send nothing; the consumer is left to its own timeout.
    Silent,
}

/// Per-loader limits.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub fetch_timeout: Duration,
    pub deadline: Option<Duration>,
    pub max_channel_capacity: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(99),
            deadline: None,
            max_channel_capacity: 64 * 1024 * 1024,
            failure_policy: FailurePolicy::SyntheticError,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("channel write failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("consumer disconnected")]
    ConsumerDisconnected,

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl LoaderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LoaderError::Fetch(_) => FailureKind::FetchFailed,
            LoaderError::Transform(_) => FailureKind::TransformFailed,
            LoaderError::Channel(_) => FailureKind::ChannelWriteFailed,
            LoaderError::ConsumerDisconnected => FailureKind::ConsumerDisconnected,
            LoaderError::DeadlineExceeded(_) => FailureKind::DeadlineExceeded,
            LoaderError::Transition(_) => FailureKind::Internal,
        }
    }
}

/// Terminal result of a loader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderOutcome {
    Done { bytes: usize },
    Failed(FailureKind),
}

/// Builds loaders for one interceptor.
#[derive(Debug, Clone)]
pub struct LoaderFactory {
    fetcher: Arc<dyn ProxyFetcher>,
    transform: Arc<dyn Transform>,
    settings: Arc<LoaderSettings>,
}

impl LoaderFactory {
    pub fn new(fetcher: Arc<dyn ProxyFetcher>, transform: Arc<dyn Transform>, settings: LoaderSettings) -> Self {
        Self {
            fetcher,
            transform,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Register a new loader in `table` and return its start capability.
    pub fn create(&self, table: &Arc<LoaderTable>, interceptor: &str, url: &str) -> PendingLoader {
        let id = table.insert(interceptor, url);
        PendingLoader {
            loader: Some(ProxyLoader {
                id,
                table: Arc::clone(table),
                machine: LoaderStateMachine::new(),
                fetcher: Arc::clone(&self.fetcher),
                transform: Arc::clone(&self.transform),
                settings: Arc::clone(&self.settings),
            }),
        }
    }
}

/// Deferred start capability handed to the host on Intercept.
#[must_use = "dropping a PendingLoader abandons the intercepted request"]
#[derive(Debug)]
pub struct PendingLoader {
    loader: Option<ProxyLoader>,
}

impl PendingLoader {
    pub fn id(&self) -> Option<LoaderId> {
        self.loader.as_ref().map(|l| l.id)
    }

    /// Bind the downstream endpoints and run the loader to completion.
    pub async fn run<C: LoaderClient>(
        mut self,
        request: ResourceRequest,
        receiver: LoaderReceiver,
        client: C,
    ) -> LoaderOutcome {
        match self.loader.take() {
            Some(loader) => loader.run(request, receiver, client).await,
            None => LoaderOutcome::Failed(FailureKind::Internal),
        }
    }

    /// Like [`run`](Self::run), on a spawned task.
    pub fn start<C: LoaderClient>(
        self,
        request: ResourceRequest,
        receiver: LoaderReceiver,
        client: C,
    ) -> JoinHandle<LoaderOutcome> {
        tokio::spawn(self.run(request, receiver, client))
    }
}

impl Drop for PendingLoader {
    fn drop(&mut self) {
        if let Some(loader) = self.loader.take() {
            tracing::debug!(loader_id = %loader.id, "Loader dropped before start");
            loader.table.release(loader.id, Release::Abandoned);
        }
    }
}

/// Everything prepared for the consumer once the write succeeded.
struct Delivery {
    head: ResponseHead,
    consumer: ChannelConsumer,
    // Held until notifications are sent so the consumer cannot see EOF early.
    producer: ChannelProducer,
}

#[derive(Debug)]
struct ProxyLoader {
    id: LoaderId,
    table: Arc<LoaderTable>,
    machine: LoaderStateMachine,
    fetcher: Arc<dyn ProxyFetcher>,
    transform: Arc<dyn Transform>,
    settings: Arc<LoaderSettings>,
}

impl ProxyLoader {
    async fn run<C: LoaderClient>(
        mut self,
        request: ResourceRequest,
        mut receiver: LoaderReceiver,
        mut client: C,
    ) -> LoaderOutcome {
        let started = Instant::now();
        let url = request.url.to_string();
        let proxy_request = ProxyRequest::from(&request);
        drop(request);

        let deadline = self.settings.deadline;
        let result = {
            let work = self.drive(proxy_request);
            let bounded = async {
                match deadline {
                    Some(limit) => tokio::time::timeout(limit, work)
                        .await
                        .unwrap_or(Err(LoaderError::DeadlineExceeded(limit))),
                    None => work.await,
                }
            };
            tokio::select! {
                biased;
                _ = receiver.disconnected() => Err(LoaderError::ConsumerDisconnected),
                result = bounded => result,
            }
        };

        match result {
            Ok(delivery) => self.finish(delivery, &mut client, &url, started),
            Err(e) => self.abort(e, &mut client, &url, started),
        }
    }

    async fn drive(&mut self, request: ProxyRequest) -> Result<Delivery, LoaderError> {
        self.enter(LoaderState::Fetching)?;
        let body = self.fetch(request).await?;

        self.enter(LoaderState::Transforming)?;
        let document = self.transform.transform(body).await?;
        metrics::record_transform_bytes(self.transform.name(), document.len());

        self.enter(LoaderState::Responding)?;
        Ok(self.respond(document)?)
    }

    async fn fetch(&self, request: ProxyRequest) -> Result<bytes::Bytes, FetchError> {
        let timeout = self.settings.fetch_timeout;
        tracing::debug!(loader_id = %self.id, url = %request.url, "Issuing proxy fetch");
        let response = tokio::time::timeout(timeout, self.fetcher.issue(request, timeout))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;
        fetch::classify(response)
    }

    fn respond(&self, document: TransformedDocument) -> Result<Delivery, ChannelError> {
        let len = document.len();
        let (mut producer, consumer) = channel::create(len, self.settings.max_channel_capacity)?;
        producer.write_all_or_none(document.bytes)?;
        Ok(Delivery {
            head: ResponseHead {
                mime_type: document.mime_type,
                charset: document.charset,
                content_length: len as u64,
            },
            consumer,
            producer,
        })
    }

    fn enter(&mut self, next: LoaderState) -> Result<(), InvalidTransition> {
        match next {
            LoaderState::Fetching => self.machine.begin_fetch()?,
            LoaderState::Transforming => self.machine.body_received()?,
            LoaderState::Responding => self.machine.transformed()?,
            LoaderState::Done => self.machine.complete()?,
            LoaderState::Failed(kind) => self.machine.fail(kind)?,
            LoaderState::Armed => {
                return Err(InvalidTransition {
                    from: self.machine.current(),
                    to: next,
                })
            }
        };
        self.table.set_state(self.id, next);
        Ok(())
    }

    fn finish<C: LoaderClient>(
        mut self,
        delivery: Delivery,
        client: &mut C,
        url: &str,
        started: Instant,
    ) -> LoaderOutcome {
        if let Err(e) = self.enter(LoaderState::Done) {
            return self.abort(e.into(), client, url, started);
        }
        let Delivery { head, consumer, producer } = delivery;
        let bytes = head.content_length as usize;

        client.on_response_metadata(head, consumer);
        client.on_complete(CompletionStatus::ok(bytes as u64));
        drop(producer);

        tracing::info!(
            loader_id = %self.id,
            url = %url,
            bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Intercepted document delivered"
        );
        metrics::record_terminal("done", None, started);
        self.table.release(self.id, Release::Done);
        LoaderOutcome::Done { bytes }
    }

    fn abort<C: LoaderClient>(
        mut self,
        error: LoaderError,
        client: &mut C,
        url: &str,
        started: Instant,
    ) -> LoaderOutcome {
        let kind = error.kind();
        if let Err(e) = self.enter(LoaderState::Failed(kind)) {
            tracing::warn!(loader_id = %self.id, error = %e, "Failure recorded outside a working state");
        }

        tracing::error!(
            loader_id = %self.id,
            url = %url,
            reason = %kind,
            error = %error,
            "Intercepted request failed"
        );

        if self.settings.failure_policy == FailurePolicy::SyntheticError && kind != FailureKind::ConsumerDisconnected {
            client.on_complete(CompletionStatus::failed(kind));
        }

        metrics::record_terminal("failed", Some(kind), started);
        self.table.release(self.id, Release::Failed(kind));
        LoaderOutcome::Failed(kind)
    }

    #[cfg(test)]
    fn terminal_transitions(&self) -> u32 {
        self.machine.terminal_transitions()
    }
}
