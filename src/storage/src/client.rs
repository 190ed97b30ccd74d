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

//! The caller-facing client.
//!
//! [Storage] wraps a transport, any type implementing
//! [stub::Storage][crate::stub::Storage]. It never changes the transport
//! settings: the per-call options are forwarded untouched, and each
//! transport resolves them against its own defaults.
//!
//! # Example
//! ```
//! # use google_cloud_storage_transport::client::Storage;
//! # use google_cloud_storage_transport::context::CallContext;
//! # use google_cloud_storage_transport::model::BucketAttrs;
//! # use google_cloud_storage_transport::stub::Storage as _;
//! # async fn sample() -> anyhow::Result<()> {
//! let client = Storage::builder()
//!     .with_user_project("my-project")
//!     .with_idempotency(true)
//!     .build()?;
//! let bucket = client
//!     .stub()
//!     .create_bucket(CallContext::new(), "my-project".into(), BucketAttrs::new("my-bucket"), vec![])
//!     .await?;
//! println!("created {bucket:?}");
//! # Ok(()) }
//! ```

use crate::call_option::CallOption;
use crate::client_option::ClientOption;
use crate::context::CallContext;
use crate::model::ObjectAttrs;
use crate::model::rewrite::RewriteObjectRequest;
use crate::options::{self, StorageOption};
use crate::retry_config::RetryConfig;
use crate::rewrite::{Rewrite, RewriteState};
use crate::transport::memory::InMemoryStorage;
use crate::{RewriteError, stub};
use std::sync::Arc;

/// The result of building a client.
pub type BuilderResult<T> = std::result::Result<T, Error>;

/// Implements a client for Cloud Storage over a transport.
///
/// The client holds its transport in an [Arc], cloning the client is cheap
/// and the clones share the transport.
#[derive(Debug)]
pub struct Storage<S = InMemoryStorage> {
    stub: Arc<S>,
}

impl<S> Clone for Storage<S> {
    fn clone(&self) -> Self {
        Self {
            stub: self.stub.clone(),
        }
    }
}

impl Storage {
    /// Returns a builder for [Storage] over the in-memory transport.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<S> Storage<S>
where
    S: stub::Storage,
{
    /// Creates a new client from a transport.
    ///
    /// Mostly used in tests, to mock the transport.
    pub fn from_stub(stub: S) -> Self {
        Self {
            stub: Arc::new(stub),
        }
    }

    /// The transport used by this client.
    pub fn stub(&self) -> &S {
        &self.stub
    }

    /// Rewrites an object, calling the transport until the rewrite is done.
    ///
    /// If the request includes a rewrite token, the rewrite resumes from
    /// that point.
    pub async fn rewrite_until_done(
        &self,
        ctx: &CallContext,
        request: RewriteObjectRequest,
        opts: Vec<StorageOption>,
    ) -> crate::Result<ObjectAttrs> {
        let mut rewrite = Rewrite::new(request);
        loop {
            match rewrite.advance(self.stub.as_ref(), ctx, &opts).await? {
                RewriteState::Done(_) => break,
                state => tracing::debug!(written = state.written(), "rewrite in progress"),
            }
        }
        rewrite
            .into_result()
            .ok_or_else(|| crate::Error::deser(RewriteError::MissingResource))
    }
}

/// Configures and creates a [Storage] client.
///
/// The builder accumulates the options in the order they are added, and
/// passes them to the transport when [build][ClientBuilder::build] is
/// called.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::client::Storage;
/// # use google_cloud_storage_transport::retry_config::RetryConfig;
/// # use google_cloud_storage_transport::retry_policy::{RetryableErrors, RetryPolicyExt};
/// let client = Storage::builder()
///     .with_user_project("my-project")
///     .with_retry_config(RetryConfig::new().with_retry_policy(RetryableErrors.with_attempt_limit(3)))
///     .with_page_size(100)
///     .build()?;
/// # Ok::<(), google_cloud_storage_transport::client::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    user_project: String,
    options: Vec<StorageOption>,
    client_options: Vec<ClientOption>,
    page_size: Option<usize>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project billed for the requests.
    pub fn with_user_project<T: Into<String>>(mut self, v: T) -> Self {
        self.user_project = v.into();
        self
    }

    /// Sets the default retry configuration.
    pub fn with_retry_config<T: Into<Arc<RetryConfig>>>(mut self, v: T) -> Self {
        self.options.push(options::with_retry_config(v));
        self
    }

    /// Clears any default retry configuration.
    pub fn without_retry(mut self) -> Self {
        self.options.push(options::without_retry());
        self
    }

    /// Sets the default idempotency for all calls.
    pub fn with_idempotency(mut self, v: bool) -> Self {
        self.options.push(options::idempotent(v));
        self
    }

    /// Sets the default low-level call options.
    pub fn with_call_options<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = CallOption>,
    {
        self.options.push(options::with_call_options(v));
        self
    }

    /// Appends options used to construct the transport.
    ///
    /// Unlike the other options, the client options accumulate: calling this
    /// function more than once appends to the sequence.
    pub fn with_client_options<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = ClientOption>,
    {
        self.client_options.extend(v);
        self
    }

    /// Sets the maximum number of items in each page of a listing.
    pub fn with_page_size(mut self, v: usize) -> Self {
        self.page_size = Some(v);
        self
    }

    /// Enables tracing spans for each operation.
    ///
    /// Tracing can also be enabled by setting the `GOOGLE_CLOUD_RUST_LOGGING`
    /// environment variable to `true`.
    pub fn with_tracing(mut self) -> Self {
        self.client_options.push(ClientOption::Tracing(true));
        self
    }

    /// Creates a client over the in-memory transport.
    pub fn build(self) -> BuilderResult<Storage<InMemoryStorage>> {
        let page_size = self.page_size;
        if page_size == Some(0) {
            return Err(Error::configuration("the page size must be positive"));
        }
        self.build_with(move |user_project, opts| {
            let transport = InMemoryStorage::new(user_project, &opts)?;
            Ok(match page_size {
                Some(n) => transport.with_page_size(n),
                None => transport,
            })
        })
    }

    /// Creates a client using `factory` to create the transport.
    ///
    /// The factory receives the user project and the accumulated options.
    pub fn build_with<S, F>(self, factory: F) -> BuilderResult<Storage<S>>
    where
        S: stub::Storage,
        F: FnOnce(String, Vec<StorageOption>) -> crate::Result<S>,
    {
        let opts = self.options();
        tracing::info!(
            user_project = %self.user_project,
            options = opts.len(),
            client_options = self.client_options.len(),
            page_size = ?self.page_size,
            "creating storage client"
        );
        let transport = factory(self.user_project, opts).map_err(Error::transport)?;
        Ok(Storage::from_stub(transport))
    }

    fn options(&self) -> Vec<StorageOption> {
        let mut opts = self.options.clone();
        if !self.client_options.is_empty() {
            opts.push(options::with_client_options(self.client_options.clone()));
        }
        opts
    }
}

/// An error creating a client.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// The builder configuration is invalid.
    pub fn is_configuration(&self) -> bool {
        matches!(&self.0, ErrorKind::Configuration(_))
    }

    /// The transport could not be initialized.
    pub fn is_transport(&self) -> bool {
        matches!(&self.0, ErrorKind::Transport(_))
    }

    fn configuration(message: &'static str) -> Self {
        Self(ErrorKind::Configuration(message))
    }

    fn transport<T: Into<BoxError>>(source: T) -> Self {
        Self(ErrorKind::Transport(source.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("invalid client configuration: {0}")]
    Configuration(&'static str),
    #[error("could not initialize transport client")]
    Transport(#[source] BoxError),
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
