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

//! Defines traits for retry policies and some common implementations.
//!
//! The storage service returns transient errors, a request may fail even if
//! it would succeed on a second attempt. Transports can automatically retry
//! these requests, driven by the [RetryConfig][crate::retry_config::RetryConfig]
//! in the resolved call settings.
//!
//! Retrying a request is only safe when the request is idempotent. Whether
//! a request is idempotent is part of the call settings, the policies receive
//! it through [RetryState].
//!
//! Policies are stateless. The retry loop keeps the state for each call, so a
//! single policy can be shared by any number of settings and concurrent calls.
//!
//! # Example
//! ```
//! # use google_cloud_storage_transport::retry_policy::*;
//! use std::time::Duration;
//! let policy = RetryableErrors
//!     .with_time_limit(Duration::from_secs(10))
//!     .with_attempt_limit(5);
//! ```

use crate::Error;
use crate::error::rpc::Code;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Determines how errors are handled in the retry loop.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Query the retry policy after an error.
    ///
    /// # Parameters
    /// * `state` - the state of the retry loop: its start time, the number of
    ///   attempts so far (including the one that just failed), and whether the
    ///   request is idempotent.
    /// * `error` - the last error received.
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult;

    /// The remaining time in the retry policy.
    ///
    /// For policies based on time, this returns the remaining time in the
    /// policy. The retry loop uses this value to bound the backoff delay.
    fn remaining_time(&self, _state: &RetryState) -> Option<Duration> {
        None
    }
}

/// The result of a retry policy decision.
#[derive(Debug)]
pub enum RetryResult {
    /// The error is not retryable, return it to the caller.
    Permanent(Error),
    /// The error may be retryable, but the policy is exhausted.
    Exhausted(Error),
    /// Retry the request after the backoff period.
    Continue(Error),
}

impl RetryResult {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// The state of a retry loop, as presented to the policies.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct RetryState {
    /// If true, the request is idempotent and safe to retry.
    pub idempotent: bool,
    /// When the retry loop started.
    pub start: Instant,
    /// The number of attempts so far.
    pub attempt_count: u32,
}

impl RetryState {
    pub fn new(idempotent: bool) -> Self {
        Self::default().set_idempotent(idempotent)
    }

    pub fn set_idempotent(mut self, v: bool) -> Self {
        self.idempotent = v;
        self
    }

    pub fn set_start<T: Into<Instant>>(mut self, v: T) -> Self {
        self.start = v.into();
        self
    }

    pub fn set_attempt_count<T: Into<u32>>(mut self, v: T) -> Self {
        self.attempt_count = v.into();
        self
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            idempotent: false,
            start: Instant::now(),
            attempt_count: 0,
        }
    }
}

/// Extension trait to decorate retry policies with limits.
pub trait RetryPolicyExt: RetryPolicy + Sized {
    /// Decorate a retry policy to limit the total elapsed time in the retry
    /// loop.
    fn with_time_limit(self, maximum_duration: Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a retry policy to limit the number of attempts.
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: RetryPolicy> RetryPolicyExt for T {}

/// The default retry policy for the storage service.
///
/// Retries 408, 429, and 5xx HTTP responses, service errors with codes
/// `UNAVAILABLE`, `INTERNAL`, `RESOURCE_EXHAUSTED`, or `DEADLINE_EXCEEDED`,
/// I/O errors and per-attempt timeouts. Only idempotent requests are retried.
///
/// This policy does not limit the number of attempts or the elapsed time,
/// decorate it with [RetryPolicyExt] to add limits.
#[derive(Clone, Debug)]
pub struct RetryableErrors;

impl RetryableErrors {
    fn is_transient(error: &Error) -> bool {
        if error.is_io() || error.is_timeout() {
            return true;
        }
        if let Some(code) = error.status().map(|s| s.code) {
            return matches!(
                code,
                Code::Unavailable | Code::Internal | Code::ResourceExhausted | Code::DeadlineExceeded
            );
        }
        matches!(error.http_status_code(), Some(408 | 429 | 500..600))
    }
}

impl RetryPolicy for RetryableErrors {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        if !state.idempotent || !Self::is_transient(&error) {
            return RetryResult::Permanent(error);
        }
        RetryResult::Continue(error)
    }
}

/// A retry policy that never retries.
#[derive(Clone, Debug)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn on_error(&self, _state: &RetryState, error: Error) -> RetryResult {
        RetryResult::Exhausted(error)
    }
}

/// A retry policy decorator that limits the total time in the retry loop.
///
/// The limit is measured from [RetryState::start].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = RetryableErrors>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_duration: Duration,
}

impl LimitedElapsedTime {
    /// Creates a new instance, using [RetryableErrors] as the inner policy.
    pub fn new(maximum_duration: Duration) -> Self {
        Self::custom(RetryableErrors, maximum_duration)
    }
}

impl<P: RetryPolicy> LimitedElapsedTime<P> {
    pub fn custom(inner: P, maximum_duration: Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn deadline(&self, state: &RetryState) -> Instant {
        state.start + self.maximum_duration
    }
}

impl<P: RetryPolicy> RetryPolicy for LimitedElapsedTime<P> {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Continue(e) if Instant::now() >= self.deadline(state) => {
                RetryResult::Exhausted(e)
            }
            result => result,
        }
    }

    fn remaining_time(&self, state: &RetryState) -> Option<Duration> {
        let remaining = self
            .deadline(state)
            .saturating_duration_since(Instant::now());
        match self.inner.remaining_time(state) {
            Some(inner) => Some(remaining.min(inner)),
            None => Some(remaining),
        }
    }
}

/// A retry policy decorator that limits the number of attempts.
#[derive(Debug)]
pub struct LimitedAttemptCount<P = RetryableErrors>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, using [RetryableErrors] as the inner policy.
    pub fn new(maximum_attempts: u32) -> Self {
        Self::custom(RetryableErrors, maximum_attempts)
    }
}

impl<P: RetryPolicy> LimitedAttemptCount<P> {
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }
}

impl<P: RetryPolicy> RetryPolicy for LimitedAttemptCount<P> {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Continue(e) if state.attempt_count >= self.maximum_attempts => {
                RetryResult::Exhausted(e)
            }
            result => result,
        }
    }

    fn remaining_time(&self, state: &RetryState) -> Option<Duration> {
        self.inner.remaining_time(state)
    }
}

impl<T: RetryPolicy + ?Sized> RetryPolicy for Arc<T> {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        self.as_ref().on_error(state, error)
    }

    fn remaining_time(&self, state: &RetryState) -> Option<Duration> {
        self.as_ref().remaining_time(state)
    }
}
