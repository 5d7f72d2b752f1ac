//! Loader lifetime table.
//!
//! # Responsibilities
//! - Own the registration of every loader between Intercept and terminal
//! - Expose in-flight loaders for status reporting
//! - Count lifecycle events for auditing
//!
//! # Design Decisions
//! - Entries are inserted by the dispatcher and erased exactly once, on the
//!   terminal path or when an unstarted loader is dropped
//! - DashMap so loaders for different requests never contend on one lock

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::loader::state::{FailureKind, LoaderState};

/// Identifier of one loader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LoaderId(Uuid);

impl LoaderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoaderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ldr-{}", self.0)
    }
}

/// How a loader left the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Done,
    Failed(FailureKind),
    /// Created but never started by the host.
    Abandoned,
}

#[derive(Debug, Clone)]
struct LoaderEntry {
    interceptor: String,
    url: String,
    state: LoaderState,
    created_at: Instant,
}

/// Serializable view of one in-flight loader.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderSnapshot {
    pub id: String,
    pub interceptor: String,
    pub url: String,
    pub state: LoaderState,
    pub age_ms: u64,
}

/// Lifetime counters since process start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    pub created: u64,
    pub started: u64,
    pub done: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub fetch_failed: u64,
    pub transform_failed: u64,
    pub channel_write_failed: u64,
    pub cancelled: u64,
    pub in_flight: u64,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    started: AtomicU64,
    done: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    fetch_failed: AtomicU64,
    transform_failed: AtomicU64,
    channel_write_failed: AtomicU64,
    cancelled: AtomicU64,
}

/// Registry of loaders between creation and release.
#[derive(Debug, Default)]
pub struct LoaderTable {
    entries: DashMap<LoaderId, LoaderEntry>,
    counters: Counters,
}

impl LoaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created loader.
    pub fn insert(&self, interceptor: &str, url: &str) -> LoaderId {
        let id = LoaderId::new();
        self.entries.insert(
            id,
            LoaderEntry {
                interceptor: interceptor.to_string(),
                url: url.to_string(),
                state: LoaderState::Armed,
                created_at: Instant::now(),
            },
        );
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Record a state change. No-op for released loaders.
    pub fn set_state(&self, id: LoaderId, state: LoaderState) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            if entry.state == LoaderState::Armed && state == LoaderState::Fetching {
                self.counters.started.fetch_add(1, Ordering::Relaxed);
            }
            entry.state = state;
        }
    }

    /// Erase a loader. Returns false if it was already gone.
    pub fn release(&self, id: LoaderId, how: Release) -> bool {
        if self.entries.remove(&id).is_none() {
            tracing::warn!(loader_id = %id, "Loader released twice");
            return false;
        }

        let c = &self.counters;
        match how {
            Release::Done => {
                c.done.fetch_add(1, Ordering::Relaxed);
            }
            Release::Abandoned => {
                c.abandoned.fetch_add(1, Ordering::Relaxed);
            }
            Release::Failed(kind) => {
                c.failed.fetch_add(1, Ordering::Relaxed);
                let bucket = match kind {
                    FailureKind::FetchFailed => Some(&c.fetch_failed),
                    FailureKind::TransformFailed => Some(&c.transform_failed),
                    FailureKind::ChannelWriteFailed => Some(&c.channel_write_failed),
                    FailureKind::ConsumerDisconnected | FailureKind::DeadlineExceeded => Some(&c.cancelled),
                    FailureKind::Internal => None,
                };
                if let Some(bucket) = bucket {
                    bucket.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        true
    }

    pub fn contains(&self, id: LoaderId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn state(&self, id: LoaderId) -> Option<LoaderState> {
        self.entries.get(&id).map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LoaderStats {
        let c = &self.counters;
        LoaderStats {
            created: c.created.load(Ordering::Relaxed),
            started: c.started.load(Ordering::Relaxed),
            done: c.done.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            abandoned: c.abandoned.load(Ordering::Relaxed),
            fetch_failed: c.fetch_failed.load(Ordering::Relaxed),
            transform_failed: c.transform_failed.load(Ordering::Relaxed),
            channel_write_failed: c.channel_write_failed.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            in_flight: self.entries.len() as u64,
        }
    }

    pub fn snapshot(&self) -> Vec<LoaderSnapshot> {
        self.entries
            .iter()
            .map(|e| LoaderSnapshot {
                id: e.key().to_string(),
                interceptor: e.interceptor.clone(),
                url: e.url.clone(),
                state: e.state,
                age_ms: e.created_at.elapsed().as_millis() as u64,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_exactly_once() {
        let table = LoaderTable::new();
        let id = table.insert("markdown", "http://example.test/doc.md");
        assert!(table.contains(id));

        assert!(table.release(id, Release::Done));
        assert!(!table.release(id, Release::Failed(FailureKind::FetchFailed)));

        let stats = table.stats();
        assert_eq!(stats.done, 1);
        assert_eq!(stats.failed, 0);
        assert!(table.is_empty());
    }

    #[test]
    fn failures_are_bucketed_by_kind() {
        let table = LoaderTable::new();
        for kind in [
            FailureKind::FetchFailed,
            FailureKind::FetchFailed,
            FailureKind::TransformFailed,
            FailureKind::ConsumerDisconnected,
        ] {
            let id = table.insert("markdown", "http://example.test/a.md");
            table.release(id, Release::Failed(kind));
        }
        let stats = table.stats();
        assert_eq!(stats.failed, 4);
        assert_eq!(stats.fetch_failed, 2);
        assert_eq!(stats.transform_failed, 1);
        assert_eq!(stats.cancelled, 1);
    }

    #[test]
    fn state_tracking_counts_starts() {
        let table = LoaderTable::new();
        let id = table.insert("markdown", "http://example.test/a.md");
        table.set_state(id, LoaderState::Fetching);
        table.set_state(id, LoaderState::Transforming);
        assert_eq!(table.state(id), Some(LoaderState::Transforming));
        assert_eq!(table.stats().started, 1);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].interceptor, "markdown");
    }

    #[test]
    fn loader_ids_are_unique() {
        assert_ne!(LoaderId::new(), LoaderId::new());
    }
}
