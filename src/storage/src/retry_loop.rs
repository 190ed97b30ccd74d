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

//! The retry loop used by transports.
//!
//! Transports call [retry_loop] with the resolved call settings. The loop
//! only retries when the settings carry a retry configuration, and its
//! [RetryMode][crate::retry_config::RetryMode] permits retrying a call with
//! the resolved idempotency.

use crate::call_option::attempt_timeout;
use crate::context::CallContext;
use crate::retry_policy::{RetryResult, RetryState};
use crate::settings::Settings;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Runs `attempt` until it succeeds or the retry policy stops the loop.
///
/// The closure receives the attempt number, starting at 1. Each attempt is
/// bounded by the context and by the attempt timeout in the call options, if
/// any. Errors caused by the context itself (cancellation or an expired
/// deadline) are never retried.
pub(crate) async fn retry_loop<F, Fut, T>(
    ctx: &CallContext,
    settings: &Settings,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let timeout = attempt_timeout(settings.call_options());
    let retry = settings.retry().and_then(|config| {
        config
            .effective_idempotency(settings.idempotent())
            .map(|idempotent| (config, idempotent))
    });
    let Some((config, idempotent)) = retry else {
        return run_attempt(ctx, timeout, attempt(1)).await;
    };

    let loop_state = RetryState::new(idempotent);
    let mut attempt_count = 0_u32;
    loop {
        attempt_count = attempt_count.saturating_add(1);
        let state = loop_state.clone().set_attempt_count(attempt_count);
        let error = match run_attempt(ctx, timeout, attempt(attempt_count)).await {
            Ok(r) => return Ok(r),
            Err(e) if ctx.check().is_err() => return Err(e),
            Err(e) => e,
        };
        let error = match config.policy().on_error(&state, error) {
            RetryResult::Permanent(e) => return Err(e),
            RetryResult::Exhausted(e) => return Err(Error::exhausted(e)),
            RetryResult::Continue(e) => e,
        };
        let delay = config.backoff().on_failure(state.start, attempt_count);
        if config
            .policy()
            .remaining_time(&state)
            .is_some_and(|remaining| remaining < delay)
        {
            return Err(Error::exhausted(error));
        }
        tracing::warn!(
            attempt = attempt_count,
            ?delay,
            "retrying after error: {error}"
        );
        ctx.sleep(delay).await?;
    }
}

async fn run_attempt<Fut, T>(ctx: &CallContext, timeout: Option<Duration>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout {
        None => ctx.run(fut).await,
        Some(t) => {
            ctx.run(async move {
                match tokio::time::timeout(t, fut).await {
                    Ok(r) => r,
                    Err(e) => Err(Error::timeout(e)),
                }
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff_policy::tests::MockBackoffPolicy;
    use crate::call_option::CallOption;
    use crate::options::*;
    use crate::retry_config::{RetryConfig, RetryMode};
    use crate::retry_policy::tests::{permanent, transient};
    use crate::retry_policy::{RetryPolicyExt, RetryableErrors};
    use crate::settings::init_settings;
    use std::collections::VecDeque;
    use std::error::Error as _;

    fn fixed_backoff(delay: Duration) -> MockBackoffPolicy {
        let mut mock = MockBackoffPolicy::new();
        mock.expect_on_failure().return_const(delay);
        mock
    }

    fn config(mode: RetryMode) -> RetryConfig {
        RetryConfig::new()
            .with_retry_policy(RetryableErrors.with_attempt_limit(3))
            .with_backoff_policy(fixed_backoff(Duration::from_secs(1)))
            .with_mode(mode)
    }

    // Runs the loop over a canned sequence of responses, returning the result
    // and the number of attempts.
    async fn run(
        ctx: &CallContext,
        settings: &Settings,
        responses: Vec<Result<i32>>,
    ) -> (Result<i32>, u32) {
        let mut responses = VecDeque::from(responses);
        let mut attempts = 0;
        let got = retry_loop(ctx, settings, |n| {
            attempts = n;
            let r = responses.pop_front().unwrap_or(Ok(-1));
            async move { r }
        })
        .await;
        (got, attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn without_retry_config() {
        let settings = init_settings(&[idempotent(true)]);
        let (got, attempts) = run(&CallContext::new(), &settings, vec![Err(transient())]).await;
        let err = got.unwrap_err();
        assert_eq!(err.status().map(|s| s.code), transient().status().map(|s| s.code));
        assert!(!err.is_exhausted(), "{err:?}");
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let settings = init_settings(&[with_retry_config(config(RetryMode::Idempotent)), idempotent(true)]);
        let start = tokio::time::Instant::now();
        let (got, attempts) = run(
            &CallContext::new(),
            &settings,
            vec![Err(transient()), Err(transient()), Ok(42)],
        )
        .await;
        assert_eq!(got.ok(), Some(42));
        assert_eq!(attempts, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error() {
        let settings = init_settings(&[with_retry_config(config(RetryMode::Idempotent)), idempotent(true)]);
        let (got, attempts) = run(&CallContext::new(), &settings, vec![Err(permanent()), Ok(42)]).await;
        let err = got.unwrap_err();
        assert!(err.status().is_some(), "{err:?}");
        assert!(!err.is_exhausted(), "{err:?}");
        assert_eq!(attempts, 1);
    }

    #[test_case::test_case(RetryMode::Idempotent, false, 1)]
    #[test_case::test_case(RetryMode::Idempotent, true, 2)]
    #[test_case::test_case(RetryMode::Always, false, 2)]
    #[test_case::test_case(RetryMode::Never, true, 1)]
    #[tokio::test(start_paused = true)]
    async fn modes(mode: RetryMode, idempotency: bool, want: u32) {
        let settings = init_settings(&[with_retry_config(config(mode)), idempotent(idempotency)]);
        let (_, attempts) = run(&CallContext::new(), &settings, vec![Err(transient()), Ok(42)]).await;
        assert_eq!(attempts, want);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted() {
        let settings = init_settings(&[with_retry_config(config(RetryMode::Idempotent)), idempotent(true)]);
        let (got, attempts) = run(
            &CallContext::new(),
            &settings,
            vec![Err(transient()), Err(transient()), Err(transient()), Ok(42)],
        )
        .await;
        let err = got.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        let last = err.source().and_then(|e| e.downcast_ref::<Error>());
        assert!(last.and_then(|e| e.status()).is_some(), "{err:?}");
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_time_too_short() {
        let config = RetryConfig::new()
            .with_retry_policy(RetryableErrors.with_time_limit(Duration::from_millis(500)))
            .with_backoff_policy(fixed_backoff(Duration::from_secs(1)));
        let settings = init_settings(&[with_retry_config(config), idempotent(true)]);
        let (got, attempts) = run(&CallContext::new(), &settings, vec![Err(transient()), Ok(42)]).await;
        let err = got.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_backoff() {
        let config = RetryConfig::new().with_backoff_policy(fixed_backoff(Duration::from_secs(3600)));
        let settings = init_settings(&[with_retry_config(config), idempotent(true)]);
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        let task = tokio::spawn(async move {
            retry_loop(&ctx, &settings, |_| async { Err::<(), _>(transient()) }).await
        });
        tokio::time::sleep(Duration::from_secs(10)).await;
        canceller.cancel();
        let err = task.await.expect("task does not panic").unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_retries() {
        let config = RetryConfig::new().with_backoff_policy(fixed_backoff(Duration::from_secs(1)));
        let settings = init_settings(&[with_retry_config(config), idempotent(true)]);
        let ctx = CallContext::new().with_timeout(Duration::from_millis(2500));
        let start = tokio::time::Instant::now();
        let err = retry_loop(&ctx, &settings, |_| async { Err::<(), _>(transient()) })
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn very_long_backoff() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        let config = RetryConfig::new().with_backoff_policy(fixed_backoff(Duration::MAX));
        let settings = init_settings(&[with_retry_config(config), idempotent(true)]);
        let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
        let (got, attempts) = run(&ctx, &settings, vec![Err(transient()), Ok(42)]).await;
        let err = got.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout() {
        let settings = init_settings(&[
            with_retry_config(config(RetryMode::Idempotent)),
            idempotent(true),
            with_call_options([CallOption::attempt_timeout(Duration::from_secs(5))]),
        ]);
        let mut attempts = 0;
        let got = retry_loop(&CallContext::new(), &settings, |n| {
            attempts = n;
            async move {
                if n == 1 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(n)
            }
        })
        .await;
        assert_eq!(got.ok(), Some(2));
        assert_eq!(attempts, 2);

        let settings = settings.derive(&[idempotent(false)]);
        let err = retry_loop(&CallContext::new(), &settings, |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
    }
}
