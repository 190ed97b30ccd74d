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

//! The retry configuration carried by the call settings.
//!
//! A [RetryConfig] is referenced, not owned, by the settings. It is shared
//! through an `Arc` and is never mutated after construction. Options that
//! change the retry configuration replace the reference wholesale.

use crate::backoff_policy::BackoffPolicy;
use crate::exponential_backoff::ExponentialBackoff;
use crate::retry_policy::{RetryPolicy, RetryableErrors};
use std::sync::Arc;

/// Controls which requests are retried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum RetryMode {
    /// Retry only requests where the resolved settings are idempotent.
    #[default]
    Idempotent,
    /// Retry all requests, even if they are not idempotent.
    Always,
    /// Never retry.
    Never,
}

/// The retry configuration for a call.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::retry_config::*;
/// # use google_cloud_storage_transport::retry_policy::*;
/// use std::time::Duration;
/// let config = RetryConfig::new()
///     .with_retry_policy(RetryableErrors.with_attempt_limit(5))
///     .with_mode(RetryMode::Always);
/// assert_eq!(config.mode(), RetryMode::Always);
/// ```
#[derive(Clone, Debug)]
pub struct RetryConfig {
    policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn BackoffPolicy>,
    mode: RetryMode,
}

impl RetryConfig {
    /// Creates a configuration retrying transient errors on idempotent
    /// requests, with the default exponential backoff.
    pub fn new() -> Self {
        Self {
            policy: Arc::new(RetryableErrors),
            backoff: Arc::new(ExponentialBackoff::default()),
            mode: RetryMode::default(),
        }
    }

    pub fn with_retry_policy<P: RetryPolicy + 'static>(mut self, v: P) -> Self {
        self.policy = Arc::new(v);
        self
    }

    pub fn with_backoff_policy<B: BackoffPolicy + 'static>(mut self, v: B) -> Self {
        self.backoff = Arc::new(v);
        self
    }

    pub fn with_mode(mut self, v: RetryMode) -> Self {
        self.mode = v;
        self
    }

    pub fn policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.policy
    }

    pub fn backoff(&self) -> &Arc<dyn BackoffPolicy> {
        &self.backoff
    }

    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    /// Whether a call with the given idempotency may be retried.
    ///
    /// Returns `None` if the call must not be retried at all.
    pub(crate) fn effective_idempotency(&self, idempotent: bool) -> Option<bool> {
        match self.mode {
            RetryMode::Idempotent => Some(idempotent),
            RetryMode::Always => Some(true),
            RetryMode::Never => None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}
