// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The execution context for a call.
//!
//! Every transport operation receives a [CallContext]. The context carries a
//! cancellation signal and an optional deadline. Long-running operations,
//! such as streaming reads and writes or multi-step rewrites, observe the
//! context and stop promptly once it is cancelled or its deadline expires.
//!
//! Cancelling a call never changes the client configuration.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carries cancellation and a deadline across a call.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::context::CallContext;
/// use std::time::Duration;
/// let ctx = CallContext::new().with_timeout(Duration::from_secs(30));
/// let child = ctx.child();
/// child.cancel();
/// assert!(child.is_cancelled());
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline to `timeout` from now.
    ///
    /// If the context already has an earlier deadline it is kept. A timeout
    /// too large to represent leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Sets the deadline.
    ///
    /// If the context already has an earlier deadline it is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Creates a child context.
    ///
    /// Cancelling the parent also cancels the child, cancelling the child
    /// does not affect the parent. The child inherits the deadline.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels the context and all its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The time remaining until the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns an error if the context is cancelled or its deadline expired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::cancelled(ContextError::Cancelled));
        }
        match self.remaining() {
            Some(d) if d.is_zero() => Err(Error::timeout(ContextError::DeadlineExceeded)),
            _ => Ok(()),
        }
    }

    /// Runs `future` until it completes, the context is cancelled, or the
    /// deadline expires.
    ///
    /// If the context is cancelled, or the deadline expires, first the future
    /// is dropped and the function returns an error. A context that is already
    /// done never polls the future.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::cancelled(ContextError::Cancelled)),
            _ = deadline => Err(Error::timeout(ContextError::DeadlineExceeded)),
            r = future => r,
        }
    }

    /// Waits for `duration`, returning early with an error if the context is
    /// cancelled or the deadline expires first.
    pub(crate) async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

/// The source of cancellation and timeout errors produced by a context.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum ContextError {
    #[error("the call context was cancelled")]
    Cancelled,
    #[error("the call context deadline expired")]
    DeadlineExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[tokio::test]
    async fn run_completes() -> anyhow::Result<()> {
        let ctx = CallContext::new();
        let got = ctx.run(async { Ok(42) }).await?;
        assert_eq!(got, 42);
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.remaining(), None);
        Ok(())
    }

    #[tokio::test]
    async fn run_cancelled() {
        let ctx = CallContext::new();
        let clone = ctx.clone();
        let pending = async move {
            clone.cancel();
            std::future::pending::<Result<()>>().await
        };
        let err = ctx.run(pending).await.unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        let source = err.source().and_then(|e| e.downcast_ref::<ContextError>());
        assert_eq!(source, Some(&ContextError::Cancelled));
        assert!(ctx.check().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_deadline() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(5));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        let err = ctx.check().unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_deadline_wins() {
        let ctx = CallContext::new()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(50));
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(5)));
        let ctx = ctx.with_timeout(Duration::from_secs(1));
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout() -> anyhow::Result<()> {
        let ctx = CallContext::new().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        ctx.check()?;

        let ctx = CallContext::new()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::MAX);
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(5)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_interrupted() {
        let ctx = CallContext::new();
        let child = ctx.child();
        let task = tokio::spawn(async move { child.sleep(Duration::from_secs(3600)).await });
        ctx.cancel();
        let got = task.await.expect("task does not panic");
        assert!(got.is_err_and(|e| e.is_cancelled()));
    }

    #[test]
    fn child_cancellation() {
        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
