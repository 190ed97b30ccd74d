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

//! The resource types exchanged with the transports.
//!
//! These are plain value objects. The caller-facing layer constructs them,
//! passes them once into a transport, and does not retain them.

pub mod compose;
pub mod rewrite;

use crate::paginator::PageableResponse;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// The metadata for a bucket.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct BucketAttrs {
    /// The name of the bucket.
    pub name: String,
    /// The location of the bucket, e.g. `US-CENTRAL1`.
    pub location: String,
    /// The default storage class for new objects, e.g. `STANDARD`.
    pub storage_class: String,
    /// The creation time.
    pub created: Option<DateTime<Utc>>,
    /// The last time the metadata changed.
    pub updated: Option<DateTime<Utc>>,
    /// The metadata version, incremented on each update.
    pub metageneration: i64,
    /// If true, overwritten or deleted objects become noncurrent versions.
    pub versioning_enabled: bool,
    /// If true, the requester pays for operations on the bucket.
    pub requester_pays: bool,
    /// The default event-based hold for new objects.
    pub default_event_based_hold: bool,
    /// User-provided labels.
    pub labels: BTreeMap<String, String>,
    /// The minimum retention for objects in the bucket.
    pub retention_policy: Option<RetentionPolicy>,
    /// The HTTP entity tag for the bucket metadata.
    pub etag: String,
}

impl BucketAttrs {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self::default().set_name(name)
    }

    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    pub fn set_location<T: Into<String>>(mut self, v: T) -> Self {
        self.location = v.into();
        self
    }

    pub fn set_storage_class<T: Into<String>>(mut self, v: T) -> Self {
        self.storage_class = v.into();
        self
    }

    pub fn set_versioning_enabled(mut self, v: bool) -> Self {
        self.versioning_enabled = v;
        self
    }

    pub fn set_requester_pays(mut self, v: bool) -> Self {
        self.requester_pays = v;
        self
    }

    pub fn set_labels<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn set_retention_policy<T: Into<RetentionPolicy>>(mut self, v: T) -> Self {
        self.retention_policy = Some(v.into());
        self
    }
}

/// The retention policy for a bucket.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct RetentionPolicy {
    /// Objects cannot be deleted or replaced until they reach this age.
    pub retention_period: Duration,
    /// When the policy took effect.
    pub effective_time: Option<DateTime<Utc>>,
    /// Once locked, the policy cannot be removed and its period cannot be
    /// reduced.
    pub is_locked: bool,
}

impl RetentionPolicy {
    pub fn new(retention_period: Duration) -> Self {
        Self {
            retention_period,
            ..Default::default()
        }
    }
}

impl From<Duration> for RetentionPolicy {
    fn from(value: Duration) -> Self {
        Self::new(value)
    }
}

/// The changes applied by an update to a bucket.
///
/// Fields set to `None` are not modified.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct BucketAttrsToUpdate {
    pub versioning_enabled: Option<bool>,
    pub requester_pays: Option<bool>,
    pub default_event_based_hold: Option<bool>,
    pub storage_class: Option<String>,
    /// A zero period removes the retention policy.
    pub retention_period: Option<Duration>,
    pub set_labels: BTreeMap<String, String>,
    pub delete_labels: BTreeSet<String>,
}

impl BucketAttrsToUpdate {
    pub fn set_versioning_enabled(mut self, v: bool) -> Self {
        self.versioning_enabled = Some(v);
        self
    }

    pub fn set_requester_pays(mut self, v: bool) -> Self {
        self.requester_pays = Some(v);
        self
    }

    pub fn set_default_event_based_hold(mut self, v: bool) -> Self {
        self.default_event_based_hold = Some(v);
        self
    }

    pub fn set_storage_class<T: Into<String>>(mut self, v: T) -> Self {
        self.storage_class = Some(v.into());
        self
    }

    pub fn set_retention_period(mut self, v: Duration) -> Self {
        self.retention_period = Some(v);
        self
    }

    pub fn set_label<K: Into<String>, V: Into<String>>(mut self, k: K, v: V) -> Self {
        self.set_labels.insert(k.into(), v.into());
        self
    }

    pub fn delete_label<K: Into<String>>(mut self, k: K) -> Self {
        self.delete_labels.insert(k.into());
        self
    }
}

/// Preconditions for bucket operations.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct BucketConditions {
    pub metageneration_match: Option<i64>,
    pub metageneration_not_match: Option<i64>,
}

impl BucketConditions {
    pub fn set_metageneration_match(mut self, v: i64) -> Self {
        self.metageneration_match = Some(v);
        self
    }

    pub fn set_metageneration_not_match(mut self, v: i64) -> Self {
        self.metageneration_not_match = Some(v);
        self
    }

    /// Rejects empty or contradictory conditions.
    pub fn validate(&self) -> Result<()> {
        match (self.metageneration_match, self.metageneration_not_match) {
            (None, None) => Err(Error::binding(ConditionsError::Empty)),
            (Some(_), Some(_)) => Err(Error::binding(ConditionsError::Conflict(
                "metageneration_match",
                "metageneration_not_match",
            ))),
            _ => Ok(()),
        }
    }
}

/// The metadata for an object.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ObjectAttrs {
    /// The name of the bucket containing the object.
    pub bucket: String,
    /// The name of the object.
    pub name: String,
    pub content_type: String,
    pub content_language: String,
    pub content_encoding: String,
    pub cache_control: String,
    /// The size of the object data, in bytes.
    pub size: i64,
    /// The content generation of the object.
    pub generation: i64,
    /// The metadata version for this generation of the object.
    pub metageneration: i64,
    pub storage_class: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// When this generation became noncurrent. Only set for noncurrent
    /// versions.
    pub deleted: Option<DateTime<Utc>>,
    /// User-provided metadata.
    pub metadata: BTreeMap<String, String>,
    pub event_based_hold: bool,
    pub temporary_hold: bool,
    /// The number of source objects in a composite object.
    pub component_count: i32,
    pub kms_key_name: String,
    pub etag: String,
    /// Set only for synthetic entries in listings with a delimiter. When set,
    /// no other fields are set.
    pub prefix: String,
}

impl ObjectAttrs {
    pub fn new<B: Into<String>, N: Into<String>>(bucket: B, name: N) -> Self {
        Self::default().set_bucket(bucket).set_name(name)
    }

    pub fn set_bucket<T: Into<String>>(mut self, v: T) -> Self {
        self.bucket = v.into();
        self
    }

    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    pub fn set_content_type<T: Into<String>>(mut self, v: T) -> Self {
        self.content_type = v.into();
        self
    }

    pub fn set_storage_class<T: Into<String>>(mut self, v: T) -> Self {
        self.storage_class = v.into();
        self
    }

    pub fn set_metadata<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn set_kms_key_name<T: Into<String>>(mut self, v: T) -> Self {
        self.kms_key_name = v.into();
        self
    }
}

/// The changes applied by an update to an object.
///
/// Fields set to `None` are not modified.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ObjectAttrsToUpdate {
    pub content_type: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    pub event_based_hold: Option<bool>,
    pub temporary_hold: Option<bool>,
    /// Replaces all the user-provided metadata.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ObjectAttrsToUpdate {
    pub fn set_content_type<T: Into<String>>(mut self, v: T) -> Self {
        self.content_type = Some(v.into());
        self
    }

    pub fn set_content_language<T: Into<String>>(mut self, v: T) -> Self {
        self.content_language = Some(v.into());
        self
    }

    pub fn set_content_encoding<T: Into<String>>(mut self, v: T) -> Self {
        self.content_encoding = Some(v.into());
        self
    }

    pub fn set_cache_control<T: Into<String>>(mut self, v: T) -> Self {
        self.cache_control = Some(v.into());
        self
    }

    pub fn set_event_based_hold(mut self, v: bool) -> Self {
        self.event_based_hold = Some(v);
        self
    }

    pub fn set_temporary_hold(mut self, v: bool) -> Self {
        self.temporary_hold = Some(v);
        self
    }

    pub fn set_metadata<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = Some(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }
}

/// Preconditions for object operations.
///
/// An operation with preconditions fails with `FAILED_PRECONDITION` if any of
/// them does not hold.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Conditions {
    pub generation_match: Option<i64>,
    pub generation_not_match: Option<i64>,
    /// The object must not exist. Equivalent to a generation match on 0.
    pub does_not_exist: bool,
    pub metageneration_match: Option<i64>,
    pub metageneration_not_match: Option<i64>,
}

impl Conditions {
    pub fn set_generation_match(mut self, v: i64) -> Self {
        self.generation_match = Some(v);
        self
    }

    pub fn set_generation_not_match(mut self, v: i64) -> Self {
        self.generation_not_match = Some(v);
        self
    }

    pub fn set_does_not_exist(mut self, v: bool) -> Self {
        self.does_not_exist = v;
        self
    }

    pub fn set_metageneration_match(mut self, v: i64) -> Self {
        self.metageneration_match = Some(v);
        self
    }

    pub fn set_metageneration_not_match(mut self, v: i64) -> Self {
        self.metageneration_not_match = Some(v);
        self
    }

    /// Rejects empty or contradictory conditions.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_transport::model::Conditions;
    /// let conds = Conditions::default().set_generation_match(7).set_does_not_exist(true);
    /// let err = conds.validate().unwrap_err();
    /// assert!(err.is_binding());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(Error::binding(ConditionsError::Empty));
        }
        let generation = [
            ("generation_match", self.generation_match.is_some()),
            ("generation_not_match", self.generation_not_match.is_some()),
            ("does_not_exist", self.does_not_exist),
        ];
        let mut set = generation.iter().filter(|(_, v)| *v).map(|(n, _)| *n);
        if let (Some(a), Some(b)) = (set.next(), set.next()) {
            return Err(Error::binding(ConditionsError::Conflict(a, b)));
        }
        if self.metageneration_match.is_some() && self.metageneration_not_match.is_some() {
            return Err(Error::binding(ConditionsError::Conflict(
                "metageneration_match",
                "metageneration_not_match",
            )));
        }
        Ok(())
    }
}

/// Invalid preconditions, detected before any request is made.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum ConditionsError {
    #[error("the conditions are empty")]
    Empty,
    #[error("conflicting conditions: {0} and {1}")]
    Conflict(&'static str, &'static str),
}

/// Filters and paginates a listing of objects.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Query {
    /// Returns only objects whose names begin with this prefix.
    pub prefix: String,
    /// Collapses names that contain the delimiter after the prefix into a
    /// single synthetic entry.
    pub delimiter: String,
    /// Returns only objects with names lexicographically at or after this
    /// value.
    pub start_offset: String,
    /// Returns only objects with names lexicographically before this value.
    pub end_offset: String,
    /// If true, also returns noncurrent versions.
    pub versions: bool,
    /// Resumes the listing at this page.
    pub page_token: String,
    /// The maximum number of results per page, zero uses the transport
    /// default.
    pub page_size: i32,
}

impl Query {
    pub fn set_prefix<T: Into<String>>(mut self, v: T) -> Self {
        self.prefix = v.into();
        self
    }

    pub fn set_delimiter<T: Into<String>>(mut self, v: T) -> Self {
        self.delimiter = v.into();
        self
    }

    pub fn set_start_offset<T: Into<String>>(mut self, v: T) -> Self {
        self.start_offset = v.into();
        self
    }

    pub fn set_end_offset<T: Into<String>>(mut self, v: T) -> Self {
        self.end_offset = v.into();
        self
    }

    pub fn set_versions(mut self, v: bool) -> Self {
        self.versions = v;
        self
    }

    pub fn set_page_token<T: Into<String>>(mut self, v: T) -> Self {
        self.page_token = v.into();
        self
    }

    pub fn set_page_size(mut self, v: i32) -> Self {
        self.page_size = v;
        self
    }
}

/// A page of buckets.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketAttrs>,
    pub next_page_token: String,
}

impl PageableResponse for ListBucketsResponse {
    type PageItem = BucketAttrs;
    fn items(self) -> Vec<BucketAttrs> {
        self.buckets
    }
    fn next_page_token(&self) -> String {
        self.next_page_token.clone()
    }
}

/// A page of objects.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListObjectsResponse {
    pub objects: Vec<ObjectAttrs>,
    /// The synthetic prefixes, only returned for queries with a delimiter.
    pub prefixes: Vec<String>,
    pub next_page_token: String,
}

impl PageableResponse for ListObjectsResponse {
    type PageItem = ObjectAttrs;
    /// Returns the objects, followed by one entry for each prefix.
    fn items(self) -> Vec<ObjectAttrs> {
        let prefixes = self.prefixes.into_iter().map(|prefix| ObjectAttrs {
            prefix,
            ..Default::default()
        });
        self.objects.into_iter().chain(prefixes).collect()
    }
    fn next_page_token(&self) -> String {
        self.next_page_token.clone()
    }
}

/// A page of HMAC keys.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListHmacKeysResponse {
    pub keys: Vec<HmacKey>,
    pub next_page_token: String,
}

impl PageableResponse for ListHmacKeysResponse {
    type PageItem = HmacKey;
    fn items(self) -> Vec<HmacKey> {
        self.keys
    }
    fn next_page_token(&self) -> String {
        self.next_page_token.clone()
    }
}

/// An entity in an access control list.
///
/// Entities are strings such as `user-liz@example.com`, `group-admins@example.com`,
/// `domain-example.com`, `project-owners-123`, `allUsers` or
/// `allAuthenticatedUsers`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct AclEntity(String);

impl AclEntity {
    pub const ALL_USERS: &'static str = "allUsers";
    pub const ALL_AUTHENTICATED_USERS: &'static str = "allAuthenticatedUsers";

    pub fn new<T: Into<String>>(v: T) -> Self {
        Self(v.into())
    }

    pub fn user<T: AsRef<str>>(email: T) -> Self {
        Self(format!("user-{}", email.as_ref()))
    }

    pub fn group<T: AsRef<str>>(email: T) -> Self {
        Self(format!("group-{}", email.as_ref()))
    }

    pub fn domain<T: AsRef<str>>(domain: T) -> Self {
        Self(format!("domain-{}", domain.as_ref()))
    }

    pub fn all_users() -> Self {
        Self(Self::ALL_USERS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AclEntity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AclEntity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for AclEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The level of access granted to an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum AclRole {
    Owner,
    #[default]
    Reader,
    Writer,
}

/// An access control rule.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct AclRule {
    pub entity: AclEntity,
    pub role: AclRole,
    /// The email address, for `user-` and `group-` entities.
    pub email: String,
    /// The domain, for `domain-` entities.
    pub domain: String,
}

impl AclRule {
    pub fn new<E: Into<AclEntity>>(entity: E, role: AclRole) -> Self {
        let entity = entity.into();
        let (email, domain) = match entity.as_str().split_once('-') {
            Some(("user" | "group", v)) => (v.to_string(), String::new()),
            Some(("domain", v)) => (String::new(), v.to_string()),
            _ => (String::new(), String::new()),
        };
        Self {
            entity,
            role,
            email,
            domain,
        }
    }
}

/// An IAM policy.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Policy {
    pub version: i32,
    pub bindings: Vec<Binding>,
    /// Used for optimistic concurrency control. A `set_iam_policy` call fails
    /// if the etag does not match the current policy.
    pub etag: String,
}

impl Policy {
    /// The members with the given role.
    pub fn members(&self, role: &str) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|b| b.role == role)
            .flat_map(|b| b.members.iter().cloned())
            .collect()
    }

    /// Grants `role` to `member`.
    pub fn add<M: Into<String>, R: Into<String>>(mut self, member: M, role: R) -> Self {
        let (member, role) = (member.into(), role.into());
        match self.bindings.iter_mut().find(|b| b.role == role) {
            Some(b) if b.members.contains(&member) => {}
            Some(b) => b.members.push(member),
            None => self.bindings.push(Binding {
                role,
                members: vec![member],
            }),
        }
        self
    }

    /// Revokes `role` from `member`, dropping empty bindings.
    pub fn remove(mut self, member: &str, role: &str) -> Self {
        for b in self.bindings.iter_mut().filter(|b| b.role == role) {
            b.members.retain(|m| m != member);
        }
        self.bindings.retain(|b| !b.members.is_empty());
        self
    }

    pub fn set_etag<T: Into<String>>(mut self, v: T) -> Self {
        self.etag = v.into();
        self
    }
}

/// Associates members with a role.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Binding {
    pub role: String,
    pub members: Vec<String>,
}

/// The state of an HMAC key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum HmacKeyState {
    #[default]
    Active,
    Inactive,
    Deleted,
}

/// An HMAC key, used to authenticate requests with the XML API.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct HmacKey {
    /// The key identifier, `{project_id}/{access_id}`.
    pub id: String,
    pub access_id: String,
    pub project_id: String,
    pub service_account_email: String,
    pub state: HmacKeyState,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub etag: String,
    /// The base64 encoded secret. Only returned when the key is created.
    pub secret: String,
}

/// The changes applied by an update to an HMAC key.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct HmacKeyAttrsToUpdate {
    /// The new state, only `Active` and `Inactive` are valid.
    pub state: HmacKeyState,
    /// If set, the update fails unless it matches the current etag.
    pub etag: Option<String>,
}

impl HmacKeyAttrsToUpdate {
    pub fn new(state: HmacKeyState) -> Self {
        Self { state, etag: None }
    }

    pub fn set_etag<T: Into<String>>(mut self, v: T) -> Self {
        self.etag = Some(v.into());
        self
    }
}

/// Filters and paginates a listing of HMAC keys.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct HmacKeyQuery {
    /// Returns only keys for this service account.
    pub service_account_email: Option<String>,
    /// If true, also returns keys in the `Deleted` state.
    pub show_deleted: bool,
    pub page_size: i32,
}

impl HmacKeyQuery {
    pub fn set_service_account_email<T: Into<String>>(mut self, v: T) -> Self {
        self.service_account_email = Some(v.into());
        self
    }

    pub fn set_show_deleted(mut self, v: bool) -> Self {
        self.show_deleted = v;
        self
    }

    pub fn set_page_size(mut self, v: i32) -> Self {
        self.page_size = v;
        self
    }
}
