//! Loader state machine.
//!
//! # States
//! - Armed: created by the dispatcher, not yet wired to a consumer
//! - Fetching: proxy request in flight
//! - Transforming: complete body handed to the transform
//! - Responding: channel allocated and payload written
//! - Done / Failed: terminal
//!
//! # State Transitions
//! ```text
//! Armed → Fetching: start() called by the host
//! Fetching → Transforming: non-empty 2xx body received
//! Transforming → Responding: transform succeeded
//! Responding → Done: metadata + completion sent
//! Fetching | Transforming | Responding → Failed
//! Armed → Failed: consumer gone before the first poll
//! ```
//!
//! # Design Decisions
//! - Terminal states reject every further transition
//! - The machine counts terminal transitions so the exactly-once property can
//!   be asserted instead of assumed

use std::fmt;

/// Reason a loader ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, timeout, non-2xx status or empty body.
    FetchFailed,
    /// The transform rejected the body.
    TransformFailed,
    /// The all-or-nothing channel write could not be satisfied.
    ChannelWriteFailed,
    /// The consumer went away before completion.
    ConsumerDisconnected,
    /// The end-to-end deadline elapsed.
    DeadlineExceeded,
    /// The state machine refused a transition.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::FetchFailed => "fetch_failed",
            FailureKind::TransformFailed => "transform_failed",
            FailureKind::ChannelWriteFailed => "channel_write_failed",
            FailureKind::ConsumerDisconnected => "consumer_disconnected",
            FailureKind::DeadlineExceeded => "deadline_exceeded",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum LoaderState {
    Armed,
    Fetching,
    Transforming,
    Responding,
    Done,
    Failed(FailureKind),
}

impl LoaderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoaderState::Done | LoaderState::Failed(_))
    }

    /// Whether `self → next` is a legal edge.
    pub fn permits(&self, next: LoaderState) -> bool {
        use LoaderState::*;
        matches!(
            (self, next),
            (Armed, Fetching)
                | (Armed, Failed(_))
                | (Fetching, Transforming)
                | (Transforming, Responding)
                | (Responding, Done)
                | (Fetching, Failed(_))
                | (Transforming, Failed(_))
                | (Responding, Failed(_))
        )
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderState::Armed => f.write_str("armed"),
            LoaderState::Fetching => f.write_str("fetching"),
            LoaderState::Transforming => f.write_str("transforming"),
            LoaderState::Responding => f.write_str("responding"),
            LoaderState::Done => f.write_str("done"),
            LoaderState::Failed(kind) => write!(f, "failed({})", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal loader transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: LoaderState,
    pub to: LoaderState,
}

/// Tagged current state plus one transition method per edge.
#[derive(Debug)]
pub struct LoaderStateMachine {
    current: LoaderState,
    terminal_transitions: u32,
}

impl LoaderStateMachine {
    pub fn new() -> Self {
        Self {
            current: LoaderState::Armed,
            terminal_transitions: 0,
        }
    }

    pub fn current(&self) -> LoaderState {
        self.current
    }

    /// Number of terminal transitions taken. Never exceeds 1.
    pub fn terminal_transitions(&self) -> u32 {
        self.terminal_transitions
    }

    pub fn begin_fetch(&mut self) -> Result<LoaderState, InvalidTransition> {
        self.advance(LoaderState::Fetching)
    }

    pub fn body_received(&mut self) -> Result<LoaderState, InvalidTransition> {
        self.advance(LoaderState::Transforming)
    }

    pub fn transformed(&mut self) -> Result<LoaderState, InvalidTransition> {
        self.advance(LoaderState::Responding)
    }

    pub fn complete(&mut self) -> Result<LoaderState, InvalidTransition> {
        self.advance(LoaderState::Done)
    }

    pub fn fail(&mut self, kind: FailureKind) -> Result<LoaderState, InvalidTransition> {
        self.advance(LoaderState::Failed(kind))
    }

    fn advance(&mut self, next: LoaderState) -> Result<LoaderState, InvalidTransition> {
        if !self.current.permits(next) {
            return Err(InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        if next.is_terminal() {
            self.terminal_transitions += 1;
        }
        Ok(next)
    }
}

impl Default for LoaderStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
