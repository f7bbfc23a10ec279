use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{Result, SlidecastError};

/// Cloneable handle that stops in-flight work on request or once a deadline passes.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CancellationToken {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline: timeout.map(|t| Instant::now() + t),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail fast when the token already fired.
    pub fn checkpoint(&self) -> Result<()> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(SlidecastError::Cancelled("run aborted".to_string()));
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SlidecastError::Cancelled("deadline exceeded".to_string()));
        }
        Ok(())
    }

    /// Resolves once the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => return,
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Drive `future` to completion unless the token fires first. The future is
    /// dropped on cancellation, which kills any child process spawned with `kill_on_drop`.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.checkpoint()?;
        tokio::select! {
            result = future => result,
            _ = self.cancelled() => Err(self
                .checkpoint()
                .err()
                .unwrap_or_else(|| SlidecastError::Cancelled("run aborted".to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_without_cancellation() {
        let token = CancellationToken::default();
        let value = token.run(async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_work() {
        let token = CancellationToken::default();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<()> = token
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SlidecastError::Cancelled(_))));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_work() {
        let token = CancellationToken::new(Some(Duration::from_millis(20)));
        let result: Result<()> = token
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SlidecastError::Cancelled(msg)) if msg.contains("deadline")));
    }

    #[test]
    fn test_checkpoint_after_cancel() {
        let token = CancellationToken::default();
        assert!(token.checkpoint().is_ok());
        token.cancel();
        assert!(token.checkpoint().is_err());
    }
}
