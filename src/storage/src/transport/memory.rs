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

//! An in-process transport.
//!
//! [InMemoryStorage] keeps buckets, objects, and HMAC keys in memory. It
//! implements every operation of [Storage], including the retry loop,
//! interceptors, and error normalization that a network transport performs.
//! Applications use it in tests, and as a reference for other transports.

mod backend;

use crate::call_option;
use crate::client_option::{ClientOption, Interceptor, RequestInfo, tracing_enabled};
use crate::context::CallContext;
use crate::model::compose::{ComposeObjectRequest, MAX_COMPOSE_SOURCES};
use crate::model::rewrite::{RewriteObjectRequest, RewriteObjectResponse};
use crate::model::{
    AclEntity, AclRole, AclRule, BucketAttrs, BucketAttrsToUpdate, BucketConditions, Conditions,
    HmacKey, HmacKeyAttrsToUpdate, HmacKeyQuery, HmacKeyState, ObjectAttrs, ObjectAttrsToUpdate,
    Policy, Query,
};
use crate::options::StorageOption;
use crate::paginator::{BucketIterator, HmacKeysIterator, ObjectIterator, Paginator};
use crate::retry_loop::retry_loop;
use crate::settings::{Settings, init_settings};
use crate::streaming::{
    ObjectReader, ObjectWriter, ReadObjectRequest, WriteObjectRequest, WriteSession,
};
use crate::stub::Storage;
use crate::{Error, Result};
use backend::{AclTarget, BackendError, State};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Instrument;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_USER_AGENT: &str = concat!("gcloud-rust-storage/", env!("CARGO_PKG_VERSION"));
const DEFAULT_PAGE_SIZE: usize = 1000;
const READ_CHUNK_SIZE: usize = 256 * 1024;
const REWRITE_GRANULARITY: i64 = 1024 * 1024;

/// A [Storage] transport keeping all the data in memory.
///
/// Clones share the same data.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::transport::memory::InMemoryStorage;
/// # use google_cloud_storage_transport::options::idempotent;
/// let transport = InMemoryStorage::new("my-project", &[idempotent(true)])?;
/// # Ok::<(), google_cloud_storage_transport::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
    page_size: usize,
}

#[derive(Debug)]
struct Inner {
    user_project: String,
    settings: Settings,
    endpoint: String,
    user_agent: String,
    interceptors: Vec<Arc<dyn Interceptor>>,
    tracing: bool,
    state: Mutex<State>,
}

impl InMemoryStorage {
    /// Creates a new transport.
    ///
    /// The options are resolved once, the result becomes the defaults for
    /// every call. The client options are applied in order: later endpoints
    /// and user agents replace earlier ones, interceptors run in the order
    /// they appear.
    pub fn new<T: Into<String>>(user_project: T, opts: &[StorageOption]) -> Result<Self> {
        let settings = init_settings(opts);
        let mut endpoint = DEFAULT_ENDPOINT.to_string();
        let mut user_agent = None;
        let mut interceptors = Vec::new();
        let mut tracing = false;
        for option in settings.client_options() {
            match option {
                ClientOption::Endpoint(v) => endpoint = v.clone(),
                ClientOption::UserAgent(v) => user_agent = Some(v.clone()),
                ClientOption::Interceptor(v) => interceptors.push(v.clone()),
                ClientOption::Tracing(v) => tracing = *v,
            }
        }
        url::Url::parse(&endpoint).map_err(Error::binding)?;
        let user_agent = match user_agent {
            Some(prefix) => format!("{prefix} {DEFAULT_USER_AGENT}"),
            None => DEFAULT_USER_AGENT.to_string(),
        };
        let inner = Inner {
            user_project: user_project.into(),
            settings,
            endpoint,
            user_agent,
            interceptors,
            tracing: tracing_enabled(tracing),
            state: Mutex::new(State::default()),
        };
        tracing::debug!(
            endpoint = %inner.endpoint,
            interceptors = inner.interceptors.len(),
            tracing = inner.tracing,
            "created in-memory storage transport"
        );
        Ok(Self {
            inner: Arc::new(inner),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Changes the maximum number of items in each page of a listing.
    pub fn with_page_size(mut self, v: usize) -> Self {
        self.page_size = v.max(1);
        self
    }

    /// The settings used as defaults for every call.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn user_project(&self) -> &str {
        &self.inner.user_project
    }

    // Resolves the settings for one call and runs `op` in the retry loop.
    async fn execute<T, F>(
        &self,
        operation: &'static str,
        ctx: &CallContext,
        opts: &[StorageOption],
        op: F,
    ) -> Result<T>
    where
        F: Fn(&mut State) -> std::result::Result<T, BackendError>,
    {
        let settings = self.inner.settings.derive(opts);
        let span = if self.inner.tracing {
            tracing::info_span!(
                "storage",
                operation,
                user_project = %self.inner.user_project
            )
        } else {
            tracing::Span::none()
        };
        let attempt = |attempt: u32| {
            let result = self
                .before_attempt(operation, &settings, attempt)
                .and_then(|_| self.with_state(&op));
            std::future::ready(result)
        };
        retry_loop(ctx, &settings, attempt).instrument(span).await
    }

    fn before_attempt(&self, operation: &'static str, settings: &Settings, attempt: u32) -> Result<()> {
        tracing::debug!(
            operation,
            attempt,
            idempotent = settings.idempotent(),
            "sending request"
        );
        if self.inner.interceptors.is_empty() {
            return Ok(());
        }
        let user_agent = match call_option::user_agent(settings.call_options()) {
            Some(prefix) => format!("{prefix} {}", self.inner.user_agent),
            None => self.inner.user_agent.clone(),
        };
        let request = RequestInfo {
            operation,
            user_project: self.inner.user_project.clone(),
            attempt,
            idempotent: settings.idempotent(),
            user_agent,
            headers: call_option::headers(settings.call_options()),
        };
        self.inner
            .interceptors
            .iter()
            .try_for_each(|i| i.before_attempt(&request))
    }

    fn with_state<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> std::result::Result<T, BackendError>,
    {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        op(&mut state).map_err(Error::from)
    }

    fn page_size(&self, requested: i32) -> usize {
        match usize::try_from(requested) {
            Ok(n) if n > 0 => n.min(self.page_size),
            _ => self.page_size,
        }
    }
}

fn required(name: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::binding(format!("missing required parameter: {name}")));
    }
    Ok(())
}

fn validate_conditions(conds: Option<&Conditions>) -> Result<()> {
    conds.map(Conditions::validate).transpose().map(|_| ())
}

fn validate_bucket_conditions(conds: Option<&BucketConditions>) -> Result<()> {
    conds
        .map(BucketConditions::validate)
        .transpose()
        .map(|_| ())
}

// The service copies data in multiples of 1 MiB.
fn rewrite_chunk(max_bytes: Option<i64>) -> Result<i64> {
    match max_bytes {
        None => Ok(REWRITE_GRANULARITY),
        Some(v) if v <= 0 => Err(Error::binding(format!(
            "max_bytes_rewritten_per_call must be positive, got {v}"
        ))),
        Some(v) => Ok(v.saturating_add(REWRITE_GRANULARITY - 1) / REWRITE_GRANULARITY
            * REWRITE_GRANULARITY),
    }
}

fn read_stream(ctx: CallContext, data: Bytes) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    futures::stream::unfold(Some(data), move |state| {
        let ctx = ctx.clone();
        async move {
            let Some(mut data) = state else {
                return None;
            };
            if data.is_empty() {
                return None;
            }
            if let Err(e) = ctx.check() {
                return Some((Err(e), None));
            }
            let chunk = data.split_to(READ_CHUNK_SIZE.min(data.len()));
            Some((Ok(chunk), Some(data)))
        }
    })
}

impl Storage for InMemoryStorage {
    async fn get_service_account(
        &self,
        ctx: CallContext,
        project_id: String,
        opts: Vec<StorageOption>,
    ) -> Result<String> {
        required("project_id", &project_id)?;
        self.execute("get_service_account", &ctx, &opts, |_| {
            Ok(format!(
                "service-{project_id}@gs-project-accounts.iam.gserviceaccount.com"
            ))
        })
        .await
    }

    async fn create_bucket(
        &self,
        ctx: CallContext,
        project_id: String,
        attrs: BucketAttrs,
        opts: Vec<StorageOption>,
    ) -> Result<BucketAttrs> {
        required("project_id", &project_id)?;
        required("bucket", &attrs.name)?;
        self.execute("create_bucket", &ctx, &opts, |state| {
            state.create_bucket(&project_id, attrs.clone())
        })
        .await
    }

    fn list_buckets(
        &self,
        ctx: CallContext,
        project_id: String,
        prefix: String,
        opts: Vec<StorageOption>,
    ) -> BucketIterator {
        if let Err(e) = required("project_id", &project_id) {
            return Paginator::from_error(e);
        }
        let this = self.clone();
        let execute = move |token: String| {
            let (this, ctx, project_id, prefix, opts) = (
                this.clone(),
                ctx.clone(),
                project_id.clone(),
                prefix.clone(),
                opts.clone(),
            );
            async move {
                let page_size = this.page_size;
                this.execute("list_buckets", &ctx, &opts, |state| {
                    state.list_buckets(&project_id, &prefix, &token, page_size)
                })
                .await
            }
        };
        Paginator::new(String::new(), execute)
    }

    async fn delete_bucket(
        &self,
        ctx: CallContext,
        bucket: String,
        conds: Option<BucketConditions>,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        validate_bucket_conditions(conds.as_ref())?;
        self.execute("delete_bucket", &ctx, &opts, |state| {
            state.delete_bucket(&bucket, conds.as_ref())
        })
        .await
    }

    async fn get_bucket(
        &self,
        ctx: CallContext,
        bucket: String,
        conds: Option<BucketConditions>,
        opts: Vec<StorageOption>,
    ) -> Result<BucketAttrs> {
        required("bucket", &bucket)?;
        validate_bucket_conditions(conds.as_ref())?;
        self.execute("get_bucket", &ctx, &opts, |state| {
            state.get_bucket(&bucket, conds.as_ref())
        })
        .await
    }

    async fn update_bucket(
        &self,
        ctx: CallContext,
        bucket: String,
        uattrs: BucketAttrsToUpdate,
        conds: Option<BucketConditions>,
        opts: Vec<StorageOption>,
    ) -> Result<BucketAttrs> {
        required("bucket", &bucket)?;
        validate_bucket_conditions(conds.as_ref())?;
        self.execute("update_bucket", &ctx, &opts, |state| {
            state.update_bucket(&bucket, &uattrs, conds.as_ref())
        })
        .await
    }

    async fn lock_bucket_retention_policy(
        &self,
        ctx: CallContext,
        bucket: String,
        conds: Option<BucketConditions>,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        match &conds {
            Some(c) if c.metageneration_match.is_some() => c.validate()?,
            _ => {
                return Err(Error::binding(
                    "locking a retention policy requires a metageneration_match condition",
                ));
            }
        }
        self.execute("lock_bucket_retention_policy", &ctx, &opts, |state| {
            state.lock_retention_policy(&bucket, conds.as_ref())
        })
        .await
    }

    fn list_objects(
        &self,
        ctx: CallContext,
        bucket: String,
        query: Query,
        opts: Vec<StorageOption>,
    ) -> Result<ObjectIterator> {
        required("bucket", &bucket)?;
        if !query.start_offset.is_empty()
            && !query.end_offset.is_empty()
            && query.start_offset > query.end_offset
        {
            return Err(Error::binding(format!(
                "the start offset {} is after the end offset {}",
                query.start_offset, query.end_offset
            )));
        }
        let page_size = self.page_size(query.page_size);
        let seed = query.page_token.clone();
        let this = self.clone();
        let execute = move |token: String| {
            let (this, ctx, bucket, query, opts) = (
                this.clone(),
                ctx.clone(),
                bucket.clone(),
                query.clone(),
                opts.clone(),
            );
            async move {
                this.execute("list_objects", &ctx, &opts, |state| {
                    state.list_objects(&bucket, &query, &token, page_size)
                })
                .await
            }
        };
        Ok(Paginator::new(seed, execute))
    }

    async fn delete_object(
        &self,
        ctx: CallContext,
        bucket: String,
        object: String,
        generation: Option<i64>,
        conds: Option<Conditions>,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("object", &object)?;
        validate_conditions(conds.as_ref())?;
        self.execute("delete_object", &ctx, &opts, |state| {
            state.delete_object(&bucket, &object, generation, conds.as_ref())
        })
        .await
    }

    async fn get_object(
        &self,
        ctx: CallContext,
        bucket: String,
        object: String,
        generation: Option<i64>,
        conds: Option<Conditions>,
        opts: Vec<StorageOption>,
    ) -> Result<ObjectAttrs> {
        required("bucket", &bucket)?;
        required("object", &object)?;
        validate_conditions(conds.as_ref())?;
        self.execute("get_object", &ctx, &opts, |state| {
            state.get_object(&bucket, &object, generation, conds.as_ref())
        })
        .await
    }

    async fn update_object(
        &self,
        ctx: CallContext,
        bucket: String,
        object: String,
        generation: Option<i64>,
        uattrs: ObjectAttrsToUpdate,
        conds: Option<Conditions>,
        opts: Vec<StorageOption>,
    ) -> Result<ObjectAttrs> {
        required("bucket", &bucket)?;
        required("object", &object)?;
        validate_conditions(conds.as_ref())?;
        self.execute("update_object", &ctx, &opts, |state| {
            state.update_object(&bucket, &object, generation, &uattrs, conds.as_ref())
        })
        .await
    }

    async fn delete_default_object_acl(
        &self,
        ctx: CallContext,
        bucket: String,
        entity: AclEntity,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("entity", entity.as_str())?;
        self.execute("delete_default_object_acl", &ctx, &opts, |state| {
            backend::delete_acl(state.acl_mut(AclTarget::DefaultObject(&bucket))?, &entity)
        })
        .await
    }

    async fn list_default_object_acls(
        &self,
        ctx: CallContext,
        bucket: String,
        opts: Vec<StorageOption>,
    ) -> Result<Vec<AclRule>> {
        required("bucket", &bucket)?;
        self.execute("list_default_object_acls", &ctx, &opts, |state| {
            state
                .acl_mut(AclTarget::DefaultObject(&bucket))
                .map(|acl| acl.to_vec())
        })
        .await
    }

    async fn update_default_object_acl(
        &self,
        ctx: CallContext,
        bucket: String,
        entity: AclEntity,
        role: AclRole,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("entity", entity.as_str())?;
        self.execute("update_default_object_acl", &ctx, &opts, |state| {
            let acl = state.acl_mut(AclTarget::DefaultObject(&bucket))?;
            backend::upsert_acl(acl, entity.clone(), role);
            Ok(())
        })
        .await
    }

    async fn delete_bucket_acl(
        &self,
        ctx: CallContext,
        bucket: String,
        entity: AclEntity,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("entity", entity.as_str())?;
        self.execute("delete_bucket_acl", &ctx, &opts, |state| {
            backend::delete_acl(state.acl_mut(AclTarget::Bucket(&bucket))?, &entity)
        })
        .await
    }

    async fn list_bucket_acls(
        &self,
        ctx: CallContext,
        bucket: String,
        opts: Vec<StorageOption>,
    ) -> Result<Vec<AclRule>> {
        required("bucket", &bucket)?;
        self.execute("list_bucket_acls", &ctx, &opts, |state| {
            state
                .acl_mut(AclTarget::Bucket(&bucket))
                .map(|acl| acl.to_vec())
        })
        .await
    }

    async fn update_bucket_acl(
        &self,
        ctx: CallContext,
        bucket: String,
        entity: AclEntity,
        role: AclRole,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("entity", entity.as_str())?;
        self.execute("update_bucket_acl", &ctx, &opts, |state| {
            let acl = state.acl_mut(AclTarget::Bucket(&bucket))?;
            backend::upsert_acl(acl, entity.clone(), role);
            Ok(())
        })
        .await
    }

    async fn delete_object_acl(
        &self,
        ctx: CallContext,
        bucket: String,
        object: String,
        entity: AclEntity,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("object", &object)?;
        required("entity", entity.as_str())?;
        self.execute("delete_object_acl", &ctx, &opts, |state| {
            backend::delete_acl(state.acl_mut(AclTarget::Object(&bucket, &object))?, &entity)
        })
        .await
    }

    async fn list_object_acls(
        &self,
        ctx: CallContext,
        bucket: String,
        object: String,
        opts: Vec<StorageOption>,
    ) -> Result<Vec<AclRule>> {
        required("bucket", &bucket)?;
        required("object", &object)?;
        self.execute("list_object_acls", &ctx, &opts, |state| {
            state
                .acl_mut(AclTarget::Object(&bucket, &object))
                .map(|acl| acl.to_vec())
        })
        .await
    }

    async fn update_object_acl(
        &self,
        ctx: CallContext,
        bucket: String,
        object: String,
        entity: AclEntity,
        role: AclRole,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("bucket", &bucket)?;
        required("object", &object)?;
        required("entity", entity.as_str())?;
        self.execute("update_object_acl", &ctx, &opts, |state| {
            let acl = state.acl_mut(AclTarget::Object(&bucket, &object))?;
            backend::upsert_acl(acl, entity.clone(), role);
            Ok(())
        })
        .await
    }

    async fn compose_object(
        &self,
        ctx: CallContext,
        req: ComposeObjectRequest,
        opts: Vec<StorageOption>,
    ) -> Result<ObjectAttrs> {
        required("destination bucket", &req.destination.bucket)?;
        required("destination object", &req.destination.name)?;
        if req.sources.is_empty() || req.sources.len() > MAX_COMPOSE_SOURCES {
            return Err(Error::binding(format!(
                "compose requires between 1 and {MAX_COMPOSE_SOURCES} sources, got {}",
                req.sources.len()
            )));
        }
        for source in &req.sources {
            required("source object", &source.name)?;
        }
        validate_conditions(req.conditions.as_ref())?;
        self.execute("compose_object", &ctx, &opts, |state| {
            state.compose_object(&req)
        })
        .await
    }

    async fn rewrite_object(
        &self,
        ctx: CallContext,
        req: RewriteObjectRequest,
        opts: Vec<StorageOption>,
    ) -> Result<RewriteObjectResponse> {
        required("source bucket", &req.source.bucket)?;
        required("source object", &req.source.name)?;
        required("destination bucket", &req.destination.bucket)?;
        required("destination object", &req.destination.name)?;
        validate_conditions(req.source.conditions.as_ref())?;
        validate_conditions(req.destination.conditions.as_ref())?;
        let chunk = rewrite_chunk(req.max_bytes_rewritten_per_call)?;
        self.execute("rewrite_object", &ctx, &opts, |state| {
            state.rewrite_object(&req, chunk)
        })
        .await
    }

    async fn open_reader(
        &self,
        ctx: CallContext,
        req: ReadObjectRequest,
        opts: Vec<StorageOption>,
    ) -> Result<ObjectReader> {
        required("bucket", &req.bucket)?;
        required("object", &req.object)?;
        validate_conditions(req.conditions.as_ref())?;
        let (attrs, data) = self
            .execute("open_reader", &ctx, &opts, |state| {
                state.read_object(
                    &req.bucket,
                    &req.object,
                    req.generation,
                    req.conditions.as_ref(),
                )
            })
            .await?;
        let (start, end) = req.range(attrs.size)?;
        let data = data.slice(start as usize..end as usize);
        Ok(ObjectReader::new(attrs, end - start, read_stream(ctx, data)))
    }

    async fn open_writer(
        &self,
        ctx: CallContext,
        req: WriteObjectRequest,
        opts: Vec<StorageOption>,
    ) -> Result<ObjectWriter> {
        required("bucket", &req.attrs.bucket)?;
        required("object", &req.attrs.name)?;
        validate_conditions(req.conditions.as_ref())?;
        self.execute("open_writer", &ctx, &opts, |state| {
            state.check_bucket(&req.attrs.bucket)
        })
        .await?;
        Ok(ObjectWriter::new(WriteSessionImpl {
            storage: self.clone(),
            ctx,
            request: req,
            opts,
            buffer: BytesMut::new(),
        }))
    }

    async fn get_iam_policy(
        &self,
        ctx: CallContext,
        resource: String,
        _version: i32,
        opts: Vec<StorageOption>,
    ) -> Result<Policy> {
        required("resource", &resource)?;
        self.execute("get_iam_policy", &ctx, &opts, |state| {
            state.get_iam_policy(&resource)
        })
        .await
    }

    async fn set_iam_policy(
        &self,
        ctx: CallContext,
        resource: String,
        policy: Policy,
        opts: Vec<StorageOption>,
    ) -> Result<Policy> {
        required("resource", &resource)?;
        self.execute("set_iam_policy", &ctx, &opts, |state| {
            state.set_iam_policy(&resource, policy.clone())
        })
        .await
    }

    async fn test_iam_permissions(
        &self,
        ctx: CallContext,
        resource: String,
        permissions: Vec<String>,
        opts: Vec<StorageOption>,
    ) -> Result<Vec<String>> {
        required("resource", &resource)?;
        self.execute("test_iam_permissions", &ctx, &opts, |state| {
            state.test_iam_permissions(&resource, &permissions)
        })
        .await
    }

    async fn get_hmac_key(
        &self,
        ctx: CallContext,
        project_id: String,
        access_id: String,
        opts: Vec<StorageOption>,
    ) -> Result<HmacKey> {
        required("project_id", &project_id)?;
        required("access_id", &access_id)?;
        self.execute("get_hmac_key", &ctx, &opts, |state| {
            state.get_hmac_key(&project_id, &access_id)
        })
        .await
    }

    fn list_hmac_keys(
        &self,
        ctx: CallContext,
        project_id: String,
        query: HmacKeyQuery,
        opts: Vec<StorageOption>,
    ) -> HmacKeysIterator {
        if let Err(e) = required("project_id", &project_id) {
            return Paginator::from_error(e);
        }
        let page_size = self.page_size(query.page_size);
        let this = self.clone();
        let execute = move |token: String| {
            let (this, ctx, project_id, query, opts) = (
                this.clone(),
                ctx.clone(),
                project_id.clone(),
                query.clone(),
                opts.clone(),
            );
            async move {
                this.execute("list_hmac_keys", &ctx, &opts, |state| {
                    state.list_hmac_keys(&project_id, &query, &token, page_size)
                })
                .await
            }
        };
        Paginator::new(String::new(), execute)
    }

    async fn update_hmac_key(
        &self,
        ctx: CallContext,
        project_id: String,
        access_id: String,
        attrs: HmacKeyAttrsToUpdate,
        opts: Vec<StorageOption>,
    ) -> Result<HmacKey> {
        required("project_id", &project_id)?;
        required("access_id", &access_id)?;
        if attrs.state == HmacKeyState::Deleted {
            return Err(Error::binding(
                "HMAC keys can only be updated to the ACTIVE or INACTIVE states",
            ));
        }
        self.execute("update_hmac_key", &ctx, &opts, |state| {
            state.update_hmac_key(&project_id, &access_id, &attrs)
        })
        .await
    }

    async fn create_hmac_key(
        &self,
        ctx: CallContext,
        project_id: String,
        service_account_email: String,
        opts: Vec<StorageOption>,
    ) -> Result<HmacKey> {
        required("project_id", &project_id)?;
        required("service_account_email", &service_account_email)?;
        self.execute("create_hmac_key", &ctx, &opts, |state| {
            state.create_hmac_key(&project_id, &service_account_email)
        })
        .await
    }

    async fn delete_hmac_key(
        &self,
        ctx: CallContext,
        project_id: String,
        access_id: String,
        opts: Vec<StorageOption>,
    ) -> Result<()> {
        required("project_id", &project_id)?;
        required("access_id", &access_id)?;
        self.execute("delete_hmac_key", &ctx, &opts, |state| {
            state.delete_hmac_key(&project_id, &access_id)
        })
        .await
    }
}

// Buffers the data until the writer is closed.
#[derive(Debug)]
struct WriteSessionImpl {
    storage: InMemoryStorage,
    ctx: CallContext,
    request: WriteObjectRequest,
    opts: Vec<StorageOption>,
    buffer: BytesMut,
}

#[async_trait::async_trait]
impl WriteSession for WriteSessionImpl {
    async fn write(&mut self, data: Bytes) -> Result<()> {
        self.ctx.check()?;
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<ObjectAttrs> {
        let Self {
            storage,
            ctx,
            request,
            opts,
            buffer,
        } = *self;
        ctx.check()?;
        let data = buffer.freeze();
        storage
            .execute("write_object", &ctx, &opts, |state| {
                state.insert_object(
                    &request.attrs.bucket,
                    request.attrs.clone(),
                    data.clone(),
                    request.conditions.as_ref(),
                    &request.predefined_acl,
                    0,
                )
            })
            .await
    }
}
