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

//! Low-level options applied to each attempt of a call.
//!
//! These options are carried, unchanged, from the caller to the transport. The
//! transport interprets them on every attempt. A call receives the full list
//! from its resolved [Settings][crate::settings::Settings], when the same
//! option appears more than once the last value wins.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// A single low-level option for an RPC.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum CallOption {
    /// Limit the duration of each attempt.
    ///
    /// The overall call is still bounded by the deadline of its
    /// [CallContext][crate::context::CallContext], and by the retry policy.
    AttemptTimeout(Duration),
    /// Prefix the user-agent reported by the transport.
    UserAgent(String),
    /// Send an additional header with each attempt.
    Header(HeaderName, HeaderValue),
}

impl CallOption {
    /// Creates an [AttemptTimeout][CallOption::AttemptTimeout] option.
    pub fn attempt_timeout<T: Into<Duration>>(v: T) -> Self {
        Self::AttemptTimeout(v.into())
    }

    /// Creates a [UserAgent][CallOption::UserAgent] option.
    pub fn user_agent<T: Into<String>>(v: T) -> Self {
        Self::UserAgent(v.into())
    }

    /// Creates a [Header][CallOption::Header] option.
    pub fn header(name: HeaderName, value: HeaderValue) -> Self {
        Self::Header(name, value)
    }
}

/// The effective attempt timeout, if any.
pub(crate) fn attempt_timeout(opts: &[CallOption]) -> Option<Duration> {
    opts.iter().rev().find_map(|o| match o {
        CallOption::AttemptTimeout(d) => Some(*d),
        _ => None,
    })
}

/// The effective user-agent prefix, if any.
pub(crate) fn user_agent(opts: &[CallOption]) -> Option<&str> {
    opts.iter().rev().find_map(|o| match o {
        CallOption::UserAgent(v) => Some(v.as_str()),
        _ => None,
    })
}

/// The additional headers, later values replace earlier values for the same
/// name.
pub(crate) fn headers(opts: &[CallOption]) -> HeaderMap {
    opts.iter()
        .filter_map(|o| match o {
            CallOption::Header(name, value) => Some((name.clone(), value.clone())),
            _ => None,
        })
        .fold(HeaderMap::new(), |mut map, (name, value)| {
            map.insert(name, value);
            map
        })
}
