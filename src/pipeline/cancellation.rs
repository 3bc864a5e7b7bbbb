//! Cooperative cancellation shared by every pipeline stage

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

/// Cancellation signal observed by the reader, the workers and the merger
///
/// Cloning yields a handle to the same signal. Cancelling is idempotent.
/// A [`child`](Self::child) is cancelled whenever its parent is, but can also
/// be cancelled on its own without touching the parent.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            warn!("Cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
