//! Cancellable scrape context.
//!
//! Wraps a [`CancellationToken`] and an optional deadline. Every blocking
//! point of a scrape goes through [`ScrapeContext::run`], which resolves to
//! the cancellation reason as soon as either fires.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CancelReason;

#[derive(Debug, Clone)]
pub struct ScrapeContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ScrapeContext {
    /// Context cancelled only through `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Context that also expires `timeout` from now.
    ///
    /// A timeout past the clock's range means no deadline.
    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Derived context: cancelled with its parent, same deadline.
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

    /// Whether the context is already done, without waiting.
    pub fn check(&self) -> Result<(), CancelReason> {
        if self.token.is_cancelled() {
            return Err(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(CancelReason::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes or the context is done.
    ///
    /// A context that is already done never polls `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancelReason>
    where
        F: Future,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CancelReason::Cancelled),
            _ = deadline => Err(CancelReason::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_output_when_live() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn cancelled_context_never_polls() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        ctx.cancel();

        let mut polled = false;
        let result = ctx.run(async { polled = true }).await;
        assert_eq!(result, Err(CancelReason::Cancelled));
        assert!(!polled);
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_future() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(CancelReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_pending_future() {
        let ctx = ScrapeContext::with_timeout(CancellationToken::new(), Duration::from_secs(5));
        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(CancelReason::DeadlineExceeded));
        assert_eq!(ctx.check(), Err(CancelReason::DeadlineExceeded));
    }

    #[tokio::test]
    async fn unrepresentable_timeout_has_no_deadline() {
        let ctx = ScrapeContext::with_timeout(CancellationToken::new(), Duration::MAX);
        assert_eq!(ctx.check(), Ok(()));
        assert_eq!(ctx.run(async { 1 }).await, Ok(1));
    }

    #[tokio::test]
    async fn child_follows_parent() {
        let parent = ScrapeContext::new(CancellationToken::new());
        let child = parent.child();
        parent.cancel();
        assert_eq!(child.check(), Err(CancelReason::Cancelled));
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent_live() {
        let parent = ScrapeContext::new(CancellationToken::new());
        let child = parent.child();
        child.cancel();
        assert_eq!(parent.check(), Ok(()));
    }
}
