//! Session lifecycle: state tracking and the request/response loop.
//!
//! State moves `Starting → Connected → (Idle ⇄ Handling)* → Terminated`.
//! `Handling` holds while at least one call is in flight; rmcp may run calls
//! concurrently, so the tracker counts them rather than toggling a flag.
//! `Terminated` is final.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rmcp::ServiceExt;
use rmcp::service::QuitReason;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ShellportError;
use crate::server::ShellportMcpServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Server constructed, no transport attached
    Starting,
    /// Transport attached, MCP handshake in progress
    Connected,
    /// Handshake complete, no call in flight
    Idle,
    /// One or more calls in flight
    Handling,
    /// Input closed, transport failed, or cancelled
    Terminated,
}

/// Shared, observable session state.
#[derive(Clone)]
pub struct SessionTracker {
    state: Arc<watch::Sender<SessionState>>,
    in_flight: Arc<AtomicUsize>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(watch::Sender::new(SessionState::Starting)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_connected(&self) {
        self.transition(|s| matches!(s, SessionState::Starting), SessionState::Connected);
    }

    /// Handshake finished. Lands on `Handling` if a call already slipped in.
    pub(crate) fn mark_ready(&self) {
        let next = if self.in_flight() > 0 {
            SessionState::Handling
        } else {
            SessionState::Idle
        };
        self.transition(
            |s| matches!(s, SessionState::Starting | SessionState::Connected),
            next,
        );
    }

    pub(crate) fn mark_terminated(&self) {
        self.state.send_replace(SessionState::Terminated);
    }

    /// Enter `Handling` until the returned guard is dropped.
    pub fn begin_call(&self) -> CallGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.transition(|s| matches!(s, SessionState::Idle), SessionState::Handling);
        CallGuard {
            tracker: self.clone(),
        }
    }

    fn transition(&self, from: impl Fn(SessionState) -> bool, to: SessionState) {
        self.state.send_if_modified(|current| {
            if from(*current) && *current != to {
                tracing::debug!(from = ?*current, to = ?to, "session state");
                *current = to;
                true
            } else {
                false
            }
        });
    }
}

/// Marks one in-flight call. Dropping the last guard returns the session to `Idle`.
pub struct CallGuard {
    tracker: SessionTracker,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker
                .transition(|s| matches!(s, SessionState::Handling), SessionState::Idle);
        }
    }
}

/// Serve one MCP session over `reader`/`writer` until the input closes, the
/// transport fails, or `cancel` fires.
///
/// Protocol frames go to `writer` only; diagnostics go through `tracing`.
pub async fn run_session<R, W>(
    server: ShellportMcpServer,
    reader: R,
    writer: W,
    cancel: CancellationToken,
) -> crate::Result<QuitReason>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let tracker = server.session().clone();
    tracker.mark_connected();

    let running = match server.serve_with_ct((reader, writer), cancel).await {
        Ok(running) => running,
        Err(e) => {
            tracker.mark_terminated();
            return Err(ShellportError::Transport(format!(
                "MCP handshake failed: {}",
                e
            )));
        }
    };

    tracing::info!("session established, waiting for requests");

    let result = running.waiting().await;
    tracker.mark_terminated();

    match result {
        Ok(reason) => {
            tracing::info!(?reason, "session ended");
            Ok(reason)
        }
        Err(e) => {
            tracing::error!(error = %e, "session task failed");
            Err(ShellportError::Transport(e.to_string()))
        }
    }
}
