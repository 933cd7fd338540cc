//! Cancellation context and the blocking-call wrapper built on it.
//!
//! A [`Context`] combines a [`CancellationToken`] with an optional deadline.
//! [`run_blocking`] moves a blocking call onto the tokio blocking pool and
//! races it against the context. When the context wins, the caller gets
//! [`CertimateError::Cancelled`] immediately while the blocking call keeps
//! running in the background; whatever it does remotely (for example a
//! certificate actually issued by the CA) is not undone, and its result is
//! dropped.

use crate::utils::errors::{CancelReason, CertimateError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled unless [`Context::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context that additionally expires after `timeout`.
    ///
    /// The child shares the parent's token, so cancelling the parent also
    /// cancels the child. The earlier of the two deadlines applies.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
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

    /// Why this context is done, or `None` while it is still live.
    pub fn reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Non-blocking check used between remote calls.
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(CertimateError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CancelReason::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Await `fut` unless the context finishes first.
    ///
    /// On cancellation the future is dropped; a request already on the wire
    /// may still take effect remotely.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.done() => Err(CertimateError::Cancelled(reason)),
            result = fut => result,
        }
    }

    /// Sleep for `period` unless the context finishes first.
    pub async fn sleep(&self, period: Duration) -> Result<()> {
        tokio::select! {
            reason = self.done() => Err(CertimateError::Cancelled(reason)),
            _ = tokio::time::sleep(period) => Ok(()),
        }
    }
}

/// Run `blocking_fn` on the blocking pool and wait for it or for `ctx`.
///
/// Never retries. A panic inside `blocking_fn` is reported as an invalid
/// input error rather than propagated.
pub async fn run_blocking<T, F>(ctx: &Context, blocking_fn: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    ctx.check()?;

    let handle = tokio::task::spawn_blocking(blocking_fn);

    tokio::select! {
        biased;
        reason = ctx.done() => {
            tracing::warn!(%reason, "abandoning blocking call, it keeps running in the background");
            Err(CertimateError::Cancelled(reason))
        }
        joined = handle => match joined {
            Ok(result) => result,
            Err(e) => Err(CertimateError::InvalidInput(format!(
                "blocking task did not complete: {e}"
            ))),
        },
    }
}
