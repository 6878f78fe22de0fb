//! Operation context: a cancellation signal plus an optional deadline.
//!
//! Every store operation takes an [`OpContext`]. Checks are cooperative and
//! happen at operation boundaries: before the first filesystem call, and
//! before each directory a listing descends into. A check never interrupts a
//! syscall already in flight.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// Cancellation and deadline carried by a single operation (or a tree of them).
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Wrap an existing token, e.g. one tied to a shutdown signal.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own. The earlier of the two deadlines wins.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail if the context has been cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.token.is_cancelled() {
            return Err(StoreError::OperationCancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(StoreError::OperationDeadlineExceeded)
            }
            _ => Ok(()),
        }
    }

    /// Resolve once the context is cancelled or expires, yielding the error
    /// an operation should report.
    pub async fn done(&self) -> StoreError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => StoreError::OperationCancelled,
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        StoreError::OperationDeadlineExceeded
                    }
                }
            }
            None => {
                self.token.cancelled().await;
                StoreError::OperationCancelled
            }
        }
    }
}

impl From<CancellationToken> for OpContext {
    fn from(token: CancellationToken) -> Self {
        Self::from_token(token)
    }
}
