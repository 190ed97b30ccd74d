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

//! Options applied to the call settings.
//!
//! Each [StorageOption] writes exactly one field of a
//! [Settings][crate::settings::Settings] value. Options never read the
//! settings, and they always replace a field wholesale: the sequence and
//! retry fields hold shared references, modifying them in place would leak
//! changes into every copy of the settings.
//!
//! # Example
//! ```
//! # use google_cloud_storage_transport::options::*;
//! # use google_cloud_storage_transport::settings::init_settings;
//! # use google_cloud_storage_transport::retry_config::RetryConfig;
//! let settings = init_settings(&[
//!     with_retry_config(RetryConfig::new()),
//!     idempotent(true),
//! ]);
//! assert!(settings.idempotent());
//! assert!(settings.retry().is_some());
//! ```

use crate::call_option::CallOption;
use crate::client_option::ClientOption;
use crate::retry_config::RetryConfig;
use crate::settings::Settings;
use std::sync::Arc;

/// A single configuration change applied to a [Settings] value.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum StorageOption {
    /// Replaces the low-level call options.
    CallOptions(Arc<[CallOption]>),
    /// Replaces the retry configuration. `None` disables retries.
    RetryConfig(Option<Arc<RetryConfig>>),
    /// Sets the idempotency flag.
    Idempotent(bool),
    /// Replaces the transport construction options.
    ClientOptions(Arc<[ClientOption]>),
}

impl StorageOption {
    /// Writes the field this option controls.
    pub fn apply(&self, settings: &mut Settings) {
        match self {
            Self::CallOptions(v) => settings.call_options = v.clone(),
            Self::RetryConfig(v) => settings.retry = v.clone(),
            Self::Idempotent(v) => settings.idempotent = *v,
            Self::ClientOptions(v) => settings.client_options = v.clone(),
        }
    }
}

impl PartialEq for StorageOption {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::CallOptions(a), Self::CallOptions(b)) => a == b,
            (Self::RetryConfig(a), Self::RetryConfig(b)) => crate::settings::same_retry(a, b),
            (Self::Idempotent(a), Self::Idempotent(b)) => a == b,
            (Self::ClientOptions(a), Self::ClientOptions(b)) => a == b,
            _ => false,
        }
    }
}

/// Replaces the low-level call options.
pub fn with_call_options<I>(opts: I) -> StorageOption
where
    I: IntoIterator<Item = CallOption>,
{
    StorageOption::CallOptions(opts.into_iter().collect())
}

/// Replaces the retry configuration.
///
/// The configuration is shared, not copied. Passing an `Arc` lets many
/// settings refer to the same configuration.
pub fn with_retry_config<T: Into<Arc<RetryConfig>>>(config: T) -> StorageOption {
    StorageOption::RetryConfig(Some(config.into()))
}

/// Removes the retry configuration, each call makes a single attempt.
pub fn without_retry() -> StorageOption {
    StorageOption::RetryConfig(None)
}

/// Sets whether the call is idempotent and thus safe to retry.
pub fn idempotent(v: bool) -> StorageOption {
    StorageOption::Idempotent(v)
}

/// Replaces the transport construction options.
///
/// These are consumed when the transport is constructed. The order is
/// preserved.
pub fn with_client_options<I>(opts: I) -> StorageOption
where
    I: IntoIterator<Item = ClientOption>,
{
    StorageOption::ClientOptions(opts.into_iter().collect())
}

/// Applies `opts` to `settings`, strictly in order.
///
/// When several options write the same field the last one wins.
pub fn resolve_options(settings: &mut Settings, opts: &[StorageOption]) {
    for opt in opts {
        opt.apply(settings);
    }
}
