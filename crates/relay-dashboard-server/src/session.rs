//! Stream session lifecycle.
//!
//! Every `WebSocket` upgrade creates a new [`StreamSession`] that moves
//! through `Connecting -> Open -> Closing -> Closed` (or straight from
//! `Connecting` to `Closed` when the upstream connection fails). `Closed`
//! is terminal. The [`SessionRegistry`] counts live sessions so callers can
//! check that handles return to baseline after clients disconnect.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_dashboard_types::ServerMode;
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade requested; upstream connect in progress (proxy mode).
    Connecting,
    /// Frames are flowing.
    Open,
    /// One side is gone; the counterpart is being closed.
    Closing,
    /// Terminal. All resources released.
    Closed,
}

/// Why a session left the `Open` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The dashboard client closed its socket.
    ClientClosed,
    /// The daemon closed the upstream socket.
    UpstreamClosed,
    /// The client socket failed.
    ClientError(String),
    /// The upstream socket failed.
    UpstreamError(String),
    /// The server is shutting down.
    Shutdown,
}

/// Inputs that drive the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Both sides are connected (or mock mode accepted the client).
    Established,
    /// The upstream connection could not be opened.
    ConnectFailed(String),
    /// A side closed or errored, or the server is shutting down.
    Close(CloseReason),
    /// The counterpart has been closed and handles dropped.
    Released,
}

/// Attempted transition that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    /// State the session was in.
    pub from: SessionState,
    /// The rejected event.
    pub event: SessionEvent,
}

/// Apply `event` to `from`.
///
/// # Errors
///
/// Returns [`InvalidTransition`] for any pair not in the lifecycle above,
/// including every event applied to `Closed`.
pub fn transition(from: SessionState, event: &SessionEvent) -> Result<SessionState, InvalidTransition> {
    match (from, event) {
        (SessionState::Connecting, SessionEvent::Established) => Ok(SessionState::Open),
        (SessionState::Connecting, SessionEvent::ConnectFailed(_)) => Ok(SessionState::Closed),
        (SessionState::Open, SessionEvent::Close(_)) => Ok(SessionState::Closing),
        (SessionState::Closing, SessionEvent::Released) => Ok(SessionState::Closed),
        _ => Err(InvalidTransition {
            from,
            event: event.clone(),
        }),
    }
}

/// Shared counters of stream sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    active: Arc<AtomicUsize>,
    opened: Arc<AtomicU64>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions created and not yet dropped.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Sessions ever created.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    fn enter(&self) -> SessionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            active: Arc::clone(&self.active),
        }
    }
}

/// Decrements the active count when dropped.
#[derive(Debug)]
struct SessionGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One dashboard stream connection.
///
/// The task that owns a session also owns its client socket and, in
/// proxy mode, its upstream socket; both are dropped with the task.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    mode: ServerMode,
    created_at: DateTime<Utc>,
    state: SessionState,
    close_reason: Option<CloseReason>,
    _guard: SessionGuard,
}

impl StreamSession {
    /// New session in `Connecting`, counted in `registry`.
    pub fn new(mode: ServerMode, registry: &SessionRegistry) -> Self {
        let session = Self {
            id: Uuid::now_v7(),
            mode,
            created_at: Utc::now(),
            state: SessionState::Connecting,
            close_reason: None,
            _guard: registry.enter(),
        };
        debug!(session_id = %session.id, %mode, "stream session connecting");
        session
    }

    /// Session identifier.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Mode the session runs under; fixed for its lifetime.
    pub const fn mode(&self) -> ServerMode {
        self.mode
    }

    /// When the upgrade was requested.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Why the session closed, once it has.
    pub const fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    /// Apply `event`, logging the transition.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] and leaves the state unchanged if the
    /// event is not valid in the current state.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        let next = transition(self.state, &event)?;
        match &event {
            SessionEvent::Established => {
                info!(session_id = %self.id, mode = %self.mode, "stream session open");
            }
            SessionEvent::ConnectFailed(reason) => {
                info!(session_id = %self.id, mode = %self.mode, reason = %reason, "stream session failed to connect");
            }
            SessionEvent::Close(reason) => {
                debug!(session_id = %self.id, mode = %self.mode, ?reason, "stream session closing");
                self.close_reason = Some(reason.clone());
            }
            SessionEvent::Released => {
                let lifetime_ms = Utc::now()
                    .signed_duration_since(self.created_at)
                    .num_milliseconds();
                info!(
                    session_id = %self.id,
                    mode = %self.mode,
                    reason = ?self.close_reason,
                    lifetime_ms,
                    "stream session closed"
                );
            }
        }
        self.state = next;
        Ok(next)
    }
}
