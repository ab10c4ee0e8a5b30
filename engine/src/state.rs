//! Turn state machine types.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_types::ChatRequest;
use tokio::sync::Notify;

/// Where the session is in the request/response cycle.
///
/// ```text
/// Idle --submit--> Streaming --run_turn--> Idle
/// ```
#[derive(Debug, Clone, Default)]
pub enum TurnState {
    #[default]
    Idle,
    /// A user message was accepted; the request waits for `run_turn`.
    Streaming(ChatRequest),
}

impl TurnState {
    #[must_use]
    pub fn pending_request(&self) -> Option<&ChatRequest> {
        match self {
            TurnState::Idle => None,
            TurnState::Streaming(request) => Some(request),
        }
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, TurnState::Streaming(_))
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    requested: AtomicBool,
    notify: Notify,
}

/// Stop request shared between the front end and the running turn.
///
/// Cloning shares the flag. Setting it from a signal handler is safe.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.inner.requested.store(false, Ordering::SeqCst);
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
