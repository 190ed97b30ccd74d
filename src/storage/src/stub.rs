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

//! Traits to mock the clients in this library.
//!
//! Application developers may need to mock the clients in this library to test
//! how their application works with different (and sometimes hard to trigger)
//! client and service behavior. Such test can define mocks implementing the
//! trait(s) defined in this module, initialize the client with an instance of
//! this mock in their tests, and verify their application responds as expected.
//!
//! The same trait is the contract for transports: every concrete transport
//! implements [Storage]. Each method receives a [CallContext], the semantic
//! parameters of the operation, and the call's options. Implementations
//! resolve the options against their default settings with
//! [call_settings][crate::settings::call_settings] before making the call,
//! and normalize all errors into [Error][crate::Error].
//!
//! Every method has a default implementation returning an
//! [unimplemented][crate::Error::is_unimplemented] error, so a transport (or a
//! test double) only needs to implement the operations it supports.

use crate::context::CallContext;
use crate::model::compose::ComposeObjectRequest;
use crate::model::rewrite::{RewriteObjectRequest, RewriteObjectResponse};
use crate::model::{
    AclEntity, AclRole, AclRule, BucketAttrs, BucketAttrsToUpdate, BucketConditions, Conditions,
    HmacKey, HmacKeyAttrsToUpdate, HmacKeyQuery, ObjectAttrs, ObjectAttrsToUpdate, Policy, Query,
};
use crate::options::StorageOption;
use crate::paginator::{BucketIterator, HmacKeysIterator, ObjectIterator, Paginator};
use crate::streaming::{ObjectReader, ObjectWriter, ReadObjectRequest, WriteObjectRequest};
use crate::{Error, Result};
use std::future::Future;

/// Defines the trait used to implement [crate::client::Storage].
///
/// Application developers may need to implement this trait to mock
/// `client::Storage`. In other use-cases, application developers only
/// use `client::Storage` and need not be concerned with this trait or
/// its implementations.
///
/// Services gain new RPCs routinely. Consequently, this trait gains new methods
/// too. To avoid breaking applications the trait provides a default
/// implementation of each method. Most of these implementations just return an
/// error.
pub trait Storage: std::fmt::Debug + Send + Sync {
    /// Returns the email of the service account used by the service for
    /// the project.
    fn get_service_account(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<String>> + Send {
        unimplemented_stub("get_service_account")
    }

    fn create_bucket(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _attrs: BucketAttrs,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<BucketAttrs>> + Send {
        unimplemented_stub("create_bucket")
    }

    /// Lists the buckets in a project whose names start with `prefix`.
    ///
    /// The listing is lazy, errors are returned by the iterator.
    fn list_buckets(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _prefix: String,
        _opts: Vec<StorageOption>,
    ) -> BucketIterator {
        Paginator::from_error(Error::unimplemented("list_buckets"))
    }

    fn delete_bucket(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _conds: Option<BucketConditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("delete_bucket")
    }

    fn get_bucket(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _conds: Option<BucketConditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<BucketAttrs>> + Send {
        unimplemented_stub("get_bucket")
    }

    fn update_bucket(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _uattrs: BucketAttrsToUpdate,
        _conds: Option<BucketConditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<BucketAttrs>> + Send {
        unimplemented_stub("update_bucket")
    }

    /// Locks the retention policy of a bucket.
    ///
    /// The conditions must include a metageneration match.
    fn lock_bucket_retention_policy(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _conds: Option<BucketConditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("lock_bucket_retention_policy")
    }

    /// Lists the objects in a bucket.
    ///
    /// Invalid queries fail immediately, other errors are returned by the
    /// iterator.
    fn list_objects(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _query: Query,
        _opts: Vec<StorageOption>,
    ) -> Result<ObjectIterator> {
        Err(Error::unimplemented("list_objects"))
    }

    fn delete_object(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _object: String,
        _generation: Option<i64>,
        _conds: Option<Conditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("delete_object")
    }

    fn get_object(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _object: String,
        _generation: Option<i64>,
        _conds: Option<Conditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<ObjectAttrs>> + Send {
        unimplemented_stub("get_object")
    }

    #[allow(clippy::too_many_arguments)]
    fn update_object(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _object: String,
        _generation: Option<i64>,
        _uattrs: ObjectAttrsToUpdate,
        _conds: Option<Conditions>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<ObjectAttrs>> + Send {
        unimplemented_stub("update_object")
    }

    fn delete_default_object_acl(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _entity: AclEntity,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("delete_default_object_acl")
    }

    fn list_default_object_acls(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<Vec<AclRule>>> + Send {
        unimplemented_stub("list_default_object_acls")
    }

    fn update_default_object_acl(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _entity: AclEntity,
        _role: AclRole,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("update_default_object_acl")
    }

    fn delete_bucket_acl(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _entity: AclEntity,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("delete_bucket_acl")
    }

    fn list_bucket_acls(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<Vec<AclRule>>> + Send {
        unimplemented_stub("list_bucket_acls")
    }

    fn update_bucket_acl(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _entity: AclEntity,
        _role: AclRole,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("update_bucket_acl")
    }

    fn delete_object_acl(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _object: String,
        _entity: AclEntity,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("delete_object_acl")
    }

    fn list_object_acls(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _object: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<Vec<AclRule>>> + Send {
        unimplemented_stub("list_object_acls")
    }

    fn update_object_acl(
        &self,
        _ctx: CallContext,
        _bucket: String,
        _object: String,
        _entity: AclEntity,
        _role: AclRole,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("update_object_acl")
    }

    /// Concatenates objects into a new object.
    fn compose_object(
        &self,
        _ctx: CallContext,
        _req: ComposeObjectRequest,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<ObjectAttrs>> + Send {
        unimplemented_stub("compose_object")
    }

    /// Performs one step of a rewrite.
    ///
    /// See [Rewrite][crate::rewrite::Rewrite] to drive the steps.
    fn rewrite_object(
        &self,
        _ctx: CallContext,
        _req: RewriteObjectRequest,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<RewriteObjectResponse>> + Send {
        unimplemented_stub("rewrite_object")
    }

    /// Opens a streaming read.
    fn open_reader(
        &self,
        _ctx: CallContext,
        _req: ReadObjectRequest,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<ObjectReader>> + Send {
        unimplemented_stub("open_reader")
    }

    /// Opens a streaming write.
    fn open_writer(
        &self,
        _ctx: CallContext,
        _req: WriteObjectRequest,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<ObjectWriter>> + Send {
        unimplemented_stub("open_writer")
    }

    /// Returns the IAM policy for a bucket.
    fn get_iam_policy(
        &self,
        _ctx: CallContext,
        _resource: String,
        _version: i32,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<Policy>> + Send {
        unimplemented_stub("get_iam_policy")
    }

    /// Replaces the IAM policy for a bucket, returning the new policy.
    fn set_iam_policy(
        &self,
        _ctx: CallContext,
        _resource: String,
        _policy: Policy,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<Policy>> + Send {
        unimplemented_stub("set_iam_policy")
    }

    /// Returns the subset of `permissions` the caller has on the bucket.
    fn test_iam_permissions(
        &self,
        _ctx: CallContext,
        _resource: String,
        _permissions: Vec<String>,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<Vec<String>>> + Send {
        unimplemented_stub("test_iam_permissions")
    }

    fn get_hmac_key(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _access_id: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<HmacKey>> + Send {
        unimplemented_stub("get_hmac_key")
    }

    /// Lists the HMAC keys in a project.
    ///
    /// The listing is lazy, errors are returned by the iterator.
    fn list_hmac_keys(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _query: HmacKeyQuery,
        _opts: Vec<StorageOption>,
    ) -> HmacKeysIterator {
        Paginator::from_error(Error::unimplemented("list_hmac_keys"))
    }

    fn update_hmac_key(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _access_id: String,
        _attrs: HmacKeyAttrsToUpdate,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<HmacKey>> + Send {
        unimplemented_stub("update_hmac_key")
    }

    /// Creates an HMAC key. The secret is only returned by this call.
    fn create_hmac_key(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _service_account_email: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<HmacKey>> + Send {
        unimplemented_stub("create_hmac_key")
    }

    /// Deletes an HMAC key. Only inactive keys can be deleted.
    fn delete_hmac_key(
        &self,
        _ctx: CallContext,
        _project_id: String,
        _access_id: String,
        _opts: Vec<StorageOption>,
    ) -> impl Future<Output = Result<()>> + Send {
        unimplemented_stub("delete_hmac_key")
    }
}

fn unimplemented_stub<T: Send>(operation: &'static str) -> impl Future<Output = Result<T>> + Send {
    std::future::ready(Err(Error::unimplemented(operation)))
}
