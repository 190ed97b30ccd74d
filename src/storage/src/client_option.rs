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

//! Options used to construct a transport.
//!
//! Transports walk these options in the order supplied by the application.
//! The order is significant: interceptors run in exactly the order they
//! appear, and later endpoint or user-agent values replace earlier ones.

use crate::Result;
use http::HeaderMap;
use std::sync::Arc;

/// A transport construction option.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ClientOption {
    /// Override the default endpoint.
    Endpoint(String),
    /// Prefix the user-agent reported by the transport.
    UserAgent(String),
    /// Add an interceptor at the end of the chain.
    Interceptor(Arc<dyn Interceptor>),
    /// Enable (or disable) tracing spans for each operation.
    Tracing(bool),
}

impl ClientOption {
    pub fn endpoint<T: Into<String>>(v: T) -> Self {
        Self::Endpoint(v.into())
    }

    pub fn user_agent<T: Into<String>>(v: T) -> Self {
        Self::UserAgent(v.into())
    }

    pub fn interceptor<T: Interceptor + 'static>(v: T) -> Self {
        Self::Interceptor(Arc::new(v))
    }
}

impl PartialEq for ClientOption {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Endpoint(a), Self::Endpoint(b)) => a == b,
            (Self::UserAgent(a), Self::UserAgent(b)) => a == b,
            (Self::Interceptor(a), Self::Interceptor(b)) => Arc::ptr_eq(a, b),
            (Self::Tracing(a), Self::Tracing(b)) => a == b,
            _ => false,
        }
    }
}

/// Observes, and possibly rejects, each attempt before it is sent.
///
/// Interceptors run in the order they were supplied when the transport was
/// constructed. An interceptor returning an error fails the attempt, the
/// error is subject to the retry policy like any other error.
///
/// # Example
/// ```
/// use google_cloud_storage_transport::client_option::{Interceptor, RequestInfo};
/// #[derive(Debug)]
/// struct Audit;
/// impl Interceptor for Audit {
///     fn before_attempt(&self, request: &RequestInfo) -> google_cloud_storage_transport::Result<()> {
///         println!("{} attempt {}", request.operation, request.attempt);
///         Ok(())
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync + std::fmt::Debug {
    fn before_attempt(&self, request: &RequestInfo) -> Result<()>;
}

/// Describes an attempt to the interceptors.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct RequestInfo {
    /// The name of the operation, e.g. `get_bucket`.
    pub operation: &'static str,
    /// The project billed for the request.
    pub user_project: String,
    /// The attempt number, starting at 1.
    pub attempt: u32,
    /// The resolved idempotency flag for the call.
    pub idempotent: bool,
    /// The full user-agent, including any prefixes.
    pub user_agent: String,
    /// The additional headers requested via call options.
    pub headers: HeaderMap,
}

pub(crate) const LOGGING_VAR: &str = "GOOGLE_CLOUD_RUST_LOGGING";

/// Returns true if the operations should be wrapped in tracing spans.
///
/// Tracing is enabled by a `Tracing(true)` option, or by setting the
/// `GOOGLE_CLOUD_RUST_LOGGING` environment variable to `true`.
pub(crate) fn tracing_enabled(option: bool) -> bool {
    if option {
        return true;
    }
    std::env::var(LOGGING_VAR)
        .map(|v| v == "true")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoped_env::ScopedEnv;
    use serial_test::serial;

    #[derive(Debug)]
    struct Noop;
    impl Interceptor for Noop {
        fn before_attempt(&self, _request: &RequestInfo) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn interceptor_equality() {
        let a = ClientOption::interceptor(Noop);
        let b = ClientOption::interceptor(Noop);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(ClientOption::endpoint("a"), ClientOption::endpoint("a"));
        assert_ne!(ClientOption::endpoint("a"), ClientOption::user_agent("a"));
    }

    #[test]
    #[serial]
    fn tracing() {
        let _e = ScopedEnv::remove(LOGGING_VAR);
        assert!(!tracing_enabled(false), "expected tracing to be disabled");
        assert!(tracing_enabled(true), "expected tracing to be enabled");

        let _e = ScopedEnv::set(LOGGING_VAR, "true");
        assert!(tracing_enabled(false), "expected tracing to be enabled");

        let _e = ScopedEnv::set(LOGGING_VAR, "not-true");
        assert!(!tracing_enabled(false), "expected tracing to be disabled");
    }
}
