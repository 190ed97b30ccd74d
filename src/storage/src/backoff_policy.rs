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

//! Defines the trait for backoff policies.
//!
//! When a request fails with a retryable error the retry loop waits before
//! the next attempt. The backoff policy determines how long to wait.

use std::time::Duration;
use tokio::time::Instant;

/// Determines how long to wait before retrying a request.
///
/// Backoff policies are stateless. The retry loop passes its start time and
/// attempt count on each call.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the backoff delay after a failed attempt.
    ///
    /// # Parameters
    /// * `loop_start` - when the retry loop started.
    /// * `attempt_count` - the number of attempts so far, including the one
    ///   that just failed.
    fn on_failure(&self, loop_start: Instant, attempt_count: u32) -> Duration;
}
