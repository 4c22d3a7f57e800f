use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::dispatcher::SessionHandlers;

/// Lifecycle of the adapter's single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Ready,
    Listening,
    Processing,
    Speaking,
    Error,
    Disconnected,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Listening => "listening",
            ConnectionState::Processing => "processing",
            ConnectionState::Speaking => "speaking",
            ConnectionState::Error => "error",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        }
    }

    /// The transport is up and conversational events are being applied.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Ready
                | ConnectionState::Listening
                | ConnectionState::Processing
                | ConnectionState::Speaking
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Error | ConnectionState::Disconnected | ConnectionState::Closed
        )
    }

    /// Whether `next` is a legal successor. Self-transitions are not.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        if *self == next {
            return false;
        }
        match next {
            Closed => true,
            Connecting => matches!(self, Idle | Error | Disconnected | Closed),
            Error => *self != Closed,
            Disconnected => *self == Connecting || self.is_active(),
            Ready => *self == Connecting || self.is_active(),
            Listening | Processing | Speaking => self.is_active(),
            Idle => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only path through which the session state changes. Every applied
/// transition is reported to the handlers.
#[derive(Clone)]
pub(crate) struct Transitions {
    state: Arc<watch::Sender<ConnectionState>>,
    handlers: Arc<dyn SessionHandlers>,
}

impl Transitions {
    pub(crate) fn new(
        state: Arc<watch::Sender<ConnectionState>>,
        handlers: Arc<dyn SessionHandlers>,
    ) -> Self {
        Self { state, handlers }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn handlers(&self) -> &Arc<dyn SessionHandlers> {
        &self.handlers
    }

    /// Moves to `next` if the transition is legal. Returns whether it was applied.
    pub(crate) fn apply(&self, next: ConnectionState, detail: Option<&str>) -> bool {
        let mut previous = next;
        let applied = self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                previous = *current;
                *current = next;
                true
            } else {
                false
            }
        });

        if applied {
            tracing::debug!("state: {} -> {}", previous, next);
            self.handlers.on_state_change(next, detail);
        } else {
            tracing::trace!("ignoring transition to {} from {}", next, self.current());
        }
        applied
    }
}
