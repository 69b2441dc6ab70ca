//! Cancellation tokens for handoffs
//!
//! A caller may abandon a handoff at any point before internalization. The
//! orchestrator polls its token between stages; once the payee wallet has
//! accepted the transaction the token is no longer consulted.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::errors::{HandoffError, HandoffResult};

/// Generic cancellation token trait
pub trait CancellationToken: Send + Sync + std::fmt::Debug {
    /// Check if cancellation has been requested
    fn is_cancelled(&self) -> bool;

    /// Request cancellation
    fn cancel(&self);

    /// Reset the cancellation state. Not every token supports this.
    fn reset(&self) {}

    /// `Cancelled` error naming the step that would have run next
    fn check(&self, before: &str) -> HandoffResult<()> {
        if self.is_cancelled() {
            Err(HandoffError::Cancelled(before.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Atomic boolean-based cancellation token
#[derive(Debug, Clone)]
pub struct AtomicCancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl AtomicCancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a pre-cancelled token
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    /// Create a (token, handle) pair; the handle cancels from another task
    pub fn create_pair() -> (Self, CancellationHandle) {
        let token = Self::new();
        let handle = CancellationHandle {
            cancelled: token.cancelled.clone(),
        };
        (token, handle)
    }
}

impl Default for AtomicCancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken for AtomicCancellationToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Cancels the token it was paired with
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A token that never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelToken;

impl CancellationToken for NeverCancelToken {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn cancel(&self) {}
}
