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

//! The resolved configuration for a client or a single call.
//!
//! A client owns one default [Settings] value for its lifetime. Each call
//! derives its own settings from the defaults with [call_settings], which
//! copies the defaults and applies the call's options to the copy. The
//! defaults are never a write target, so concurrent calls sharing a client
//! cannot observe each other's options and no lock is needed.
//!
//! The copy is shallow: the retry configuration and the option sequences are
//! shared through `Arc`. This is only correct because options replace these
//! fields wholesale, see [StorageOption][crate::options::StorageOption].

use crate::call_option::CallOption;
use crate::client_option::ClientOption;
use crate::options::{StorageOption, resolve_options};
use crate::retry_config::RetryConfig;
use std::sync::Arc;

/// Resolved call-ready configuration.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub(crate) retry: Option<Arc<RetryConfig>>,
    pub(crate) call_options: Arc<[CallOption]>,
    pub(crate) idempotent: bool,
    pub(crate) client_options: Arc<[ClientOption]>,
}

impl Settings {
    /// The retry configuration, if any.
    pub fn retry(&self) -> Option<&Arc<RetryConfig>> {
        self.retry.as_ref()
    }

    /// The low-level call options.
    pub fn call_options(&self) -> &[CallOption] {
        &self.call_options
    }

    /// Whether the call is idempotent.
    pub fn idempotent(&self) -> bool {
        self.idempotent
    }

    /// The transport construction options.
    pub fn client_options(&self) -> &[ClientOption] {
        &self.client_options
    }

    /// Returns a copy of these settings with `opts` applied, in order.
    ///
    /// `self` is not modified.
    pub fn derive(&self, opts: &[StorageOption]) -> Settings {
        let mut settings = self.clone();
        resolve_options(&mut settings, opts);
        settings
    }
}

impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        same_retry(&self.retry, &other.retry)
            && self.call_options == other.call_options
            && self.idempotent == other.idempotent
            && self.client_options == other.client_options
    }
}

/// Retry configurations are compared by identity.
pub(crate) fn same_retry(a: &Option<Arc<RetryConfig>>, b: &Option<Arc<RetryConfig>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Creates the default settings for a client.
pub fn init_settings(opts: &[StorageOption]) -> Settings {
    Settings::default().derive(opts)
}

/// Derives the settings for a single call.
///
/// Returns `None` if there are no defaults. A missing defaults value is not
/// the same as empty defaults, and no settings are made up in its place.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::options::idempotent;
/// # use google_cloud_storage_transport::settings::{call_settings, init_settings};
/// let defaults = init_settings(&[idempotent(false)]);
/// let call = call_settings(Some(&defaults), &[idempotent(true)]);
/// assert!(call.is_some_and(|s| s.idempotent()));
/// assert!(!defaults.idempotent());
/// assert!(call_settings(None, &[idempotent(true)]).is_none());
/// ```
pub fn call_settings(defaults: Option<&Settings>, opts: &[StorageOption]) -> Option<Settings> {
    defaults.map(|d| d.derive(opts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn sample_defaults() -> Settings {
        init_settings(&[
            with_retry_config(RetryConfig::new()),
            with_call_options([CallOption::user_agent("defaults")]),
            with_client_options([ClientOption::Tracing(false)]),
        ])
    }

    #[test]
    fn last_writer_wins() {
        let first = Arc::new(RetryConfig::new());
        let last = Arc::new(RetryConfig::new());
        let got = init_settings(&[
            idempotent(true),
            with_retry_config(first.clone()),
            with_call_options([CallOption::user_agent("first")]),
            idempotent(false),
            with_retry_config(last.clone()),
            with_client_options([ClientOption::endpoint("http://first")]),
            with_call_options([CallOption::user_agent("last")]),
            idempotent(true),
            with_client_options([ClientOption::endpoint("http://last")]),
        ]);
        assert!(got.retry().is_some_and(|r| Arc::ptr_eq(r, &last)));
        assert!(got.idempotent());
        assert_eq!(got.call_options(), &[CallOption::user_agent("last")]);
        assert_eq!(
            got.client_options(),
            &[ClientOption::endpoint("http://last")]
        );
    }

    #[test]
    fn untouched_fields_keep_base() {
        let base = sample_defaults();
        let got = base.derive(&[idempotent(true)]);
        assert!(same_retry(&got.retry, &base.retry));
        assert_eq!(got.call_options(), base.call_options());
        assert_eq!(got.client_options(), base.client_options());
        assert!(got.idempotent());
    }

    #[test]
    fn empty_sequence() {
        let base = sample_defaults();
        assert_eq!(base.derive(&[]), base);
        assert_eq!(init_settings(&[]), Settings::default());
    }

    #[test]
    fn defaults_unchanged() {
        let defaults = sample_defaults();
        let snapshot = defaults.clone();
        let got = call_settings(
            Some(&defaults),
            &[
                without_retry(),
                idempotent(true),
                with_call_options([CallOption::attempt_timeout(Duration::from_secs(5))]),
                with_client_options(Vec::<ClientOption>::new()),
            ],
        )
        .expect("defaults are present");
        assert_eq!(defaults, snapshot);
        assert_ne!(got, snapshot);
        assert!(got.retry().is_none());
        assert!(defaults.retry().is_some());
    }

    #[test]
    fn absent_defaults() {
        assert_eq!(call_settings(None, &[]), None);
        assert_eq!(call_settings(None, &[idempotent(true)]), None);
        assert_eq!(
            call_settings(Some(&Settings::default()), &[]),
            Some(Settings::default())
        );
    }

    #[test]
    fn end_to_end() {
        let retry = Arc::new(RetryConfig::new());
        let defaults = init_settings(&[idempotent(false)]);
        let got = call_settings(
            Some(&defaults),
            &[with_retry_config(retry.clone()), idempotent(true)],
        )
        .expect("defaults are present");
        assert!(got.idempotent());
        assert!(got.retry().is_some_and(|r| Arc::ptr_eq(r, &retry)));
        assert!(!defaults.idempotent());
        assert!(defaults.retry().is_none());
    }

    #[test]
    fn concurrent_resolution() {
        const N: usize = 32;
        let defaults = Arc::new(sample_defaults());
        let snapshot = defaults.as_ref().clone();
        let results = std::thread::scope(|s| {
            let handles = (0..N)
                .map(|i| {
                    let defaults = defaults.clone();
                    s.spawn(move || {
                        let flag = i % 2 == 0;
                        let agent = format!("call-{i}");
                        let got = call_settings(
                            Some(defaults.as_ref()),
                            &[
                                idempotent(flag),
                                with_call_options([CallOption::user_agent(agent.clone())]),
                            ],
                        );
                        (flag, agent, got)
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread does not panic"))
                .collect::<Vec<_>>()
        });
        assert_eq!(results.len(), N);
        for (flag, agent, got) in results {
            let got = got.expect("defaults are present");
            assert_eq!(got.idempotent(), flag);
            assert_eq!(got.call_options(), &[CallOption::user_agent(agent)]);
            assert!(same_retry(&got.retry, &snapshot.retry));
        }
        assert_eq!(*defaults, snapshot);
    }
}
