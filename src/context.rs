// src/context.rs
//! Cancellable, optionally deadline-bound execution context handed to every
//! pipeline operation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Child context: cancelled with its parent, but cancelling it leaves the parent alone.
    /// The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `Some` once the context is cancelled or past its deadline.
    pub fn err(&self) -> Option<PipelineError> {
        if self.token.is_cancelled() {
            return Some(PipelineError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(PipelineError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is done, yielding the reason.
    pub async fn done(&self) -> PipelineError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => PipelineError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => PipelineError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                PipelineError::Cancelled
            }
        }
    }
}
