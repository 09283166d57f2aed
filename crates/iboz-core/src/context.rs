//! Cancellation and deadline propagation.
//!
//! Every lifecycle operation and every port call receives a [`Context`].
//! A context is cancelled either explicitly through its token or implicitly
//! once its deadline passes. Clones share the same cancellation state.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason an operation was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancellation {
    /// The context was cancelled by its owner.
    #[error("operation cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal passed through every operation.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context that is never cancelled unless [`Context::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Creates a context that expires after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Creates a context that is cancelled together with `self` but can also
    /// be cancelled on its own. The earlier of the two deadlines applies.
    #[must_use]
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

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<Cancellation> {
        if self.token.is_cancelled() {
            return Some(Cancellation::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    /// Fails fast if the context is already done.
    ///
    /// # Errors
    ///
    /// Returns the [`Cancellation`] reason once the context is cancelled or expired.
    pub fn check(&self) -> Result<(), Cancellation> {
        self.err().map_or(Ok(()), Err)
    }

    /// Completes when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Cancellation {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => Cancellation::Cancelled,
                    () = tokio::time::sleep_until(deadline) => Cancellation::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Cancellation::Cancelled
            }
        }
    }

    /// Drives `future` to completion unless the context finishes first.
    ///
    /// The future is dropped as soon as the context is done.
    ///
    /// # Errors
    ///
    /// Returns the [`Cancellation`] reason if the context finished first.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Cancellation>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            output = future => Ok(output),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_context_is_live() {
        let ctx = Context::new();
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancel_is_shared_by_clones() {
        let ctx = Context::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert_eq!(clone.check(), Err(Cancellation::Cancelled));
    }

    #[tokio::test]
    async fn child_follows_parent_but_not_the_reverse() {
        let parent = Context::new();
        let child = parent.child(None);
        child.cancel();
        assert!(parent.check().is_ok());

        let child = parent.child(None);
        parent.cancel();
        assert_eq!(child.check(), Err(Cancellation::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = Context::with_timeout(Duration::from_secs(5));
        assert!(ctx.check().is_ok());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(ctx.check(), Err(Cancellation::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn run_aborts_slow_future() {
        let ctx = Context::with_timeout(Duration::from_secs(1));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(result, Err(Cancellation::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn child_keeps_earlier_deadline() {
        let parent = Context::with_timeout(Duration::from_secs(2));
        let child = parent.child(Some(Duration::from_secs(10)));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
