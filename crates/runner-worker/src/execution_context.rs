// ExecutionContext: the cancellation signal and optional deadline handed to
// every blocking sandbox operation.

use runner_common::InfrastructureError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation plus an optional deadline for one sandbox operation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl ExecutionContext {
    /// A context bounded only by `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Add a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The budget this context was created with, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.deadline.map(|(_, timeout)| timeout)
    }

    /// Time left before the deadline fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Fail immediately if the context is already cancelled or expired.
    pub fn check(&self) -> Result<(), InfrastructureError> {
        if self.cancel.is_cancelled() {
            return Err(InfrastructureError::Cancelled);
        }
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => {
                Err(InfrastructureError::DeadlineExceeded(timeout))
            }
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the token is cancelled, or the
    /// deadline passes. An interrupted future is dropped.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, InfrastructureError> {
        self.check()?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = fut => Ok(output),
            _ = self.cancel.cancelled() => Err(InfrastructureError::Cancelled),
            _ = expired => Err(InfrastructureError::DeadlineExceeded(
                self.timeout().unwrap_or_default(),
            )),
        }
    }
}
