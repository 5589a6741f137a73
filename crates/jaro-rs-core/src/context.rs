//! Per-request cancellation and deadline.

use crate::error::CoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carried by every engine operation and port call.
///
/// Cloning shares the same token; use [`RequestContext::child`] for a scope
/// that can be canceled without affecting the parent.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// Context driven by an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    /// Replace the deadline, keeping the earlier of the two.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Attach an id that audit events use instead of the task id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Child scope: canceled with the parent, cancelable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            correlation_id: self.correlation_id.clone(),
        }
    }

    /// Detached scope for work that must outlive the request, such as
    /// background runs. Keeps the correlation id only.
    pub fn detached(&self) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            correlation_id: self.correlation_id.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `Err(Canceled)` once the token fires or the deadline passes.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.token.is_cancelled() {
            return Err(canceled());
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(deadline_exceeded());
        }
        Ok(())
    }

    /// Race `future` against cancellation and the deadline.
    pub async fn run<F, T>(&self, future: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(canceled()),
            _ = wait_for(self.deadline) => Err(deadline_exceeded()),
            result = future => result,
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn canceled() -> CoreError {
    CoreError::Canceled("request canceled".to_string())
}

fn deadline_exceeded() -> CoreError {
    CoreError::Canceled("deadline exceeded".to_string())
}
