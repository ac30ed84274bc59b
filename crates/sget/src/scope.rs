//! Workflow-scoped cancellation and deadline

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline shared by every step of one workflow
#[derive(Debug, Clone)]
pub struct Scope {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Start a scope now; the deadline, if any, counts from this moment
    pub fn new(cancel: CancellationToken, deadline: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: deadline.map(|d| Instant::now() + d),
        }
    }

    /// A scope that only ends when `cancel` fires
    pub fn unbounded(cancel: CancellationToken) -> Self {
        Self::new(cancel, None)
    }

    /// Fail fast if the scope has already ended
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if matches!(self.deadline, Some(at) if Instant::now() >= at) {
            return Err(Error::Timeout);
        }
        Ok(())
    }

    /// Run `fut` until it completes, the token is cancelled, or the deadline passes
    ///
    /// Dropping the losing future aborts any in-flight request it owns.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let bounded = async {
            match self.deadline {
                Some(at) => tokio::time::timeout_at(at, fut)
                    .await
                    .map_err(|_| Error::Timeout)?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = bounded => result,
        }
    }

    /// Sleep for `duration` unless the scope ends first
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let scope = Scope::unbounded(CancellationToken::new());
        assert_eq!(scope.guard(async { Ok(7) }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_call() {
        let cancel = CancellationToken::new();
        let scope = Scope::unbounded(cancel.clone());
        cancel.cancel();
        let result: Result<()> = scope.guard(std::future::pending()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(matches!(scope.check(), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_aborts_pending_call() {
        let scope = Scope::new(CancellationToken::new(), Some(Duration::from_millis(50)));
        let result: Result<()> = scope.guard(std::future::pending()).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(matches!(scope.check(), Err(Error::Timeout)));
    }
}
