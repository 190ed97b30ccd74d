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

//! The state behind [InMemoryStorage][super::InMemoryStorage].
//!
//! All the functions here are synchronous and run while the transport holds
//! the state lock. They return [BackendError], which the transport converts
//! to service errors with the same codes, HTTP status and reasons as the
//! service.

use crate::Error;
use crate::error::rpc::{Code, ErrorInfo, Status};
use crate::model::compose::ComposeObjectRequest;
use crate::model::rewrite::{RewriteObjectRequest, RewriteObjectResponse};
use crate::model::{
    AclEntity, AclRole, AclRule, BucketAttrs, BucketAttrsToUpdate, BucketConditions, Conditions,
    HmacKey, HmacKeyAttrsToUpdate, HmacKeyQuery, HmacKeyState, ListBucketsResponse,
    ListHmacKeysResponse, ListObjectsResponse, ObjectAttrs, ObjectAttrsToUpdate, Policy, Query,
    RetentionPolicy,
};
use base64::Engine;
use base64::prelude::{BASE64_STANDARD, BASE64_URL_SAFE_NO_PAD};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

const DOMAIN: &str = "storage.googleapis.com";

/// How long an unused rewrite token remains valid.
pub(crate) const REWRITE_TTL: TimeDelta = TimeDelta::hours(24);

#[derive(thiserror::Error, Debug)]
pub(crate) enum BackendError {
    #[error("the bucket {0} does not exist")]
    BucketNotFound(String),
    #[error("the object {bucket}/{object} does not exist")]
    ObjectNotFound { bucket: String, object: String },
    #[error("the bucket {0} already exists")]
    BucketExists(String),
    #[error("the bucket {0} is not empty")]
    BucketNotEmpty(String),
    #[error("the {0} precondition failed")]
    ConditionNotMet(&'static str),
    #[error("the etag does not match the current value")]
    EtagMismatch,
    #[error("the ACL entity {0} does not exist")]
    AclNotFound(AclEntity),
    #[error("the HMAC key {0} does not exist")]
    HmacKeyNotFound(String),
    #[error("the object {0} is under a retention policy or an active hold")]
    Retained(String),
    #[error("{0}")]
    FailedPrecondition(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
}

impl BackendError {
    fn object_not_found(bucket: &str, object: &str) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.to_string(),
            object: object.to_string(),
        }
    }

    fn classify(&self) -> (Code, u16, &'static str) {
        match self {
            Self::BucketNotFound(_)
            | Self::ObjectNotFound { .. }
            | Self::AclNotFound(_)
            | Self::HmacKeyNotFound(_) => (Code::NotFound, 404, "notFound"),
            Self::BucketExists(_) => (Code::AlreadyExists, 409, "conflict"),
            Self::BucketNotEmpty(_) => (Code::FailedPrecondition, 409, "conflict"),
            Self::ConditionNotMet(_) | Self::EtagMismatch => {
                (Code::FailedPrecondition, 412, "conditionNotMet")
            }
            Self::Retained(_) => (Code::PermissionDenied, 403, "retentionPolicyNotMet"),
            Self::FailedPrecondition(_) => (Code::FailedPrecondition, 400, "failedPrecondition"),
            Self::InvalidArgument(_) => (Code::InvalidArgument, 400, "invalid"),
        }
    }
}

impl From<BackendError> for Error {
    fn from(value: BackendError) -> Self {
        let (code, status_code, reason) = value.classify();
        let status = Status::default()
            .set_code(code)
            .set_message(value.to_string())
            .set_details([ErrorInfo::new(reason, DOMAIN)]);
        Error::service_with_http_metadata(status, Some(status_code), None)
    }
}

type Result<T> = std::result::Result<T, BackendError>;

/// Selects one of the access control lists.
#[derive(Clone, Copy, Debug)]
pub(crate) enum AclTarget<'a> {
    Bucket(&'a str),
    DefaultObject(&'a str),
    Object(&'a str, &'a str),
}

#[derive(Debug, Default)]
pub(crate) struct State {
    buckets: BTreeMap<String, BucketEntry>,
    hmac_keys: BTreeMap<String, HmacKey>,
    rewrites: HashMap<String, RewriteProgress>,
    last_generation: i64,
    revision: u64,
}

#[derive(Debug)]
struct BucketEntry {
    project_id: String,
    attrs: BucketAttrs,
    acl: Vec<AclRule>,
    default_object_acl: Vec<AclRule>,
    policy: Policy,
    objects: BTreeMap<String, ObjectVersions>,
}

// The live version of an object, if any, and its noncurrent versions. Entries
// with no versions left are removed from the bucket.
#[derive(Debug, Default)]
struct ObjectVersions {
    live: Option<StoredObject>,
    noncurrent: Vec<StoredObject>,
}

#[derive(Clone, Debug)]
struct StoredObject {
    attrs: ObjectAttrs,
    data: Bytes,
    acl: Vec<AclRule>,
}

#[derive(Clone, Debug)]
struct RewriteProgress {
    source: StoredObject,
    destination: (String, String),
    written: i64,
    updated: DateTime<Utc>,
}

impl BucketEntry {
    fn object(&self, name: &str, generation: Option<i64>) -> Option<&StoredObject> {
        let versions = self.objects.get(name)?;
        match generation {
            None => versions.live.as_ref(),
            Some(g) => versions
                .live
                .iter()
                .chain(versions.noncurrent.iter())
                .find(|o| o.attrs.generation == g),
        }
    }

    fn object_mut(&mut self, name: &str, generation: Option<i64>) -> Option<&mut StoredObject> {
        let versions = self.objects.get_mut(name)?;
        match generation {
            None => versions.live.as_mut(),
            Some(g) => versions
                .live
                .iter_mut()
                .chain(versions.noncurrent.iter_mut())
                .find(|o| o.attrs.generation == g),
        }
    }
}

impl State {
    fn next_generation(&mut self) -> i64 {
        let candidate = Utc::now().timestamp_micros();
        self.last_generation = candidate.max(self.last_generation.saturating_add(1));
        self.last_generation
    }

    fn next_etag(&mut self) -> String {
        self.revision += 1;
        BASE64_STANDARD.encode(self.revision.to_be_bytes())
    }

    fn bucket(&self, name: &str) -> Result<&BucketEntry> {
        self.buckets
            .get(name)
            .ok_or_else(|| BackendError::BucketNotFound(name.to_string()))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut BucketEntry> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| BackendError::BucketNotFound(name.to_string()))
    }

    pub(crate) fn check_bucket(&self, name: &str) -> Result<()> {
        self.bucket(name).map(|_| ())
    }

    pub(crate) fn create_bucket(&mut self, project_id: &str, attrs: BucketAttrs) -> Result<BucketAttrs> {
        if self.buckets.contains_key(&attrs.name) {
            return Err(BackendError::BucketExists(attrs.name));
        }
        let now = Utc::now();
        let mut attrs = attrs;
        if attrs.location.is_empty() {
            attrs.location = "US".to_string();
        }
        if attrs.storage_class.is_empty() {
            attrs.storage_class = "STANDARD".to_string();
        }
        attrs.created = Some(now);
        attrs.updated = Some(now);
        attrs.metageneration = 1;
        attrs.etag = self.next_etag();
        if let Some(policy) = attrs.retention_policy.as_mut() {
            policy.effective_time = Some(now);
            policy.is_locked = false;
        }
        let owners = AclEntity::new(format!("project-owners-{project_id}"));
        let mut policy = Policy::default()
            .add(
                format!("projectOwner:{project_id}"),
                "roles/storage.legacyBucketOwner",
            )
            .add(
                format!("projectViewer:{project_id}"),
                "roles/storage.legacyBucketReader",
            )
            .set_etag(self.next_etag());
        policy.version = 1;
        let entry = BucketEntry {
            project_id: project_id.to_string(),
            attrs: attrs.clone(),
            acl: vec![AclRule::new(owners.clone(), AclRole::Owner)],
            default_object_acl: vec![AclRule::new(owners, AclRole::Owner)],
            policy,
            objects: BTreeMap::new(),
        };
        self.buckets.insert(attrs.name.clone(), entry);
        Ok(attrs)
    }

    pub(crate) fn list_buckets(
        &self,
        project_id: &str,
        prefix: &str,
        token: &str,
        page_size: usize,
    ) -> Result<ListBucketsResponse> {
        let items = self
            .buckets
            .iter()
            .filter(|(name, b)| b.project_id == project_id && name.starts_with(prefix))
            .map(|(name, b)| (name.clone(), b.attrs.clone()));
        let (buckets, next_page_token) = paginate(items, token, page_size)?;
        Ok(ListBucketsResponse {
            buckets,
            next_page_token,
        })
    }

    pub(crate) fn get_bucket(&self, name: &str, conds: Option<&BucketConditions>) -> Result<BucketAttrs> {
        let entry = self.bucket(name)?;
        check_bucket_conditions(conds, &entry.attrs)?;
        Ok(entry.attrs.clone())
    }

    pub(crate) fn delete_bucket(&mut self, name: &str, conds: Option<&BucketConditions>) -> Result<()> {
        let entry = self.bucket(name)?;
        check_bucket_conditions(conds, &entry.attrs)?;
        if !entry.objects.is_empty() {
            return Err(BackendError::BucketNotEmpty(name.to_string()));
        }
        self.buckets.remove(name);
        Ok(())
    }

    pub(crate) fn update_bucket(
        &mut self,
        name: &str,
        uattrs: &BucketAttrsToUpdate,
        conds: Option<&BucketConditions>,
    ) -> Result<BucketAttrs> {
        let etag = self.next_etag();
        let entry = self.bucket_mut(name)?;
        check_bucket_conditions(conds, &entry.attrs)?;
        let now = Utc::now();
        let attrs = &mut entry.attrs;
        if let Some(period) = uattrs.retention_period {
            let locked = attrs.retention_policy.as_ref().filter(|p| p.is_locked);
            if locked.is_some_and(|p| period < p.retention_period) {
                return Err(BackendError::FailedPrecondition(
                    "a locked retention policy cannot be reduced or removed",
                ));
            }
            attrs.retention_policy = if period.is_zero() {
                None
            } else {
                let mut policy = attrs.retention_policy.take().unwrap_or_default();
                policy.retention_period = period;
                policy.effective_time.get_or_insert(now);
                Some(policy)
            };
        }
        if let Some(v) = uattrs.versioning_enabled {
            attrs.versioning_enabled = v;
        }
        if let Some(v) = uattrs.requester_pays {
            attrs.requester_pays = v;
        }
        if let Some(v) = uattrs.default_event_based_hold {
            attrs.default_event_based_hold = v;
        }
        if let Some(v) = &uattrs.storage_class {
            attrs.storage_class = v.clone();
        }
        for (k, v) in &uattrs.set_labels {
            attrs.labels.insert(k.clone(), v.clone());
        }
        for k in &uattrs.delete_labels {
            attrs.labels.remove(k);
        }
        attrs.metageneration += 1;
        attrs.updated = Some(now);
        attrs.etag = etag;
        Ok(attrs.clone())
    }

    pub(crate) fn lock_retention_policy(&mut self, name: &str, conds: Option<&BucketConditions>) -> Result<()> {
        let etag = self.next_etag();
        let entry = self.bucket_mut(name)?;
        if conds.is_none_or(|c| c.metageneration_match.is_none()) {
            return Err(BackendError::InvalidArgument(
                "locking a retention policy requires a metageneration precondition".to_string(),
            ));
        }
        check_bucket_conditions(conds, &entry.attrs)?;
        let Some(policy) = entry.attrs.retention_policy.as_mut() else {
            return Err(BackendError::FailedPrecondition(
                "the bucket does not have a retention policy",
            ));
        };
        policy.is_locked = true;
        entry.attrs.metageneration += 1;
        entry.attrs.updated = Some(Utc::now());
        entry.attrs.etag = etag;
        Ok(())
    }

    pub(crate) fn list_objects(
        &self,
        bucket: &str,
        query: &Query,
        token: &str,
        page_size: usize,
    ) -> Result<ListObjectsResponse> {
        enum Listed {
            Object(ObjectAttrs),
            Prefix(String),
        }
        let entry = self.bucket(bucket)?;
        let mut listed = BTreeMap::new();
        for (name, versions) in &entry.objects {
            if !name.starts_with(&query.prefix)
                || (!query.start_offset.is_empty() && *name < query.start_offset)
                || (!query.end_offset.is_empty() && *name >= query.end_offset)
            {
                continue;
            }
            if !query.delimiter.is_empty() {
                let rest = &name[query.prefix.len()..];
                if let Some(i) = rest.find(&query.delimiter) {
                    let prefix = name[..query.prefix.len() + i + query.delimiter.len()].to_string();
                    listed.insert(prefix.clone(), Listed::Prefix(prefix));
                    continue;
                }
            }
            let mut found: Vec<&StoredObject> = if query.versions {
                versions.noncurrent.iter().chain(versions.live.iter()).collect()
            } else {
                versions.live.iter().collect()
            };
            found.sort_by_key(|o| o.attrs.generation);
            for o in found {
                let key = format!("{name}\u{0}{:020}", o.attrs.generation);
                listed.insert(key, Listed::Object(o.attrs.clone()));
            }
        }
        let (page, next_page_token) = paginate(listed, token, page_size)?;
        let mut response = ListObjectsResponse {
            next_page_token,
            ..Default::default()
        };
        for item in page {
            match item {
                Listed::Object(o) => response.objects.push(o),
                Listed::Prefix(p) => response.prefixes.push(p),
            }
        }
        Ok(response)
    }

    pub(crate) fn get_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        conds: Option<&Conditions>,
    ) -> Result<ObjectAttrs> {
        self.read_object(bucket, name, generation, conds)
            .map(|(attrs, _)| attrs)
    }

    pub(crate) fn read_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        conds: Option<&Conditions>,
    ) -> Result<(ObjectAttrs, Bytes)> {
        let object = self
            .bucket(bucket)?
            .object(name, generation)
            .ok_or_else(|| BackendError::object_not_found(bucket, name))?;
        check_conditions(conds, Some(&object.attrs))?;
        Ok((object.attrs.clone(), object.data.clone()))
    }

    pub(crate) fn update_object(
        &mut self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        uattrs: &ObjectAttrsToUpdate,
        conds: Option<&Conditions>,
    ) -> Result<ObjectAttrs> {
        let etag = self.next_etag();
        let object = self
            .bucket_mut(bucket)?
            .object_mut(name, generation)
            .ok_or_else(|| BackendError::object_not_found(bucket, name))?;
        check_conditions(conds, Some(&object.attrs))?;
        let attrs = &mut object.attrs;
        if let Some(v) = &uattrs.content_type {
            attrs.content_type = v.clone();
        }
        if let Some(v) = &uattrs.content_language {
            attrs.content_language = v.clone();
        }
        if let Some(v) = &uattrs.content_encoding {
            attrs.content_encoding = v.clone();
        }
        if let Some(v) = &uattrs.cache_control {
            attrs.cache_control = v.clone();
        }
        if let Some(v) = uattrs.event_based_hold {
            attrs.event_based_hold = v;
        }
        if let Some(v) = uattrs.temporary_hold {
            attrs.temporary_hold = v;
        }
        if let Some(v) = &uattrs.metadata {
            attrs.metadata = v.clone();
        }
        attrs.metageneration += 1;
        attrs.updated = Some(Utc::now());
        attrs.etag = etag;
        Ok(attrs.clone())
    }

    pub(crate) fn delete_object(
        &mut self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        conds: Option<&Conditions>,
    ) -> Result<()> {
        let now = Utc::now();
        let entry = self.bucket_mut(bucket)?;
        let versioning = entry.attrs.versioning_enabled;
        let object = entry
            .object(name, generation)
            .ok_or_else(|| BackendError::object_not_found(bucket, name))?;
        check_conditions(conds, Some(&object.attrs))?;
        check_retention(&object.attrs, entry.attrs.retention_policy.as_ref(), now)?;
        let target = object.attrs.generation;
        let Some(versions) = entry.objects.get_mut(name) else {
            return Err(BackendError::object_not_found(bucket, name));
        };
        match versions.live.take() {
            Some(mut live) if live.attrs.generation == target => {
                if versioning {
                    live.attrs.deleted = Some(now);
                    versions.noncurrent.push(live);
                }
            }
            live => {
                versions.live = live;
                versions.noncurrent.retain(|o| o.attrs.generation != target);
            }
        }
        if versions.live.is_none() && versions.noncurrent.is_empty() {
            entry.objects.remove(name);
        }
        Ok(())
    }

    /// Writes a new live version of an object.
    pub(crate) fn insert_object(
        &mut self,
        bucket: &str,
        attrs: ObjectAttrs,
        data: Bytes,
        conds: Option<&Conditions>,
        predefined_acl: &str,
        component_count: i32,
    ) -> Result<ObjectAttrs> {
        let generation = self.next_generation();
        let etag = self.next_etag();
        let now = Utc::now();
        let entry = self.bucket_mut(bucket)?;
        let live = entry
            .objects
            .get(&attrs.name)
            .and_then(|v| v.live.as_ref());
        check_conditions(conds, live.map(|o| &o.attrs))?;
        if let Some(live) = live {
            check_retention(&live.attrs, entry.attrs.retention_policy.as_ref(), now)?;
        }
        let acl = predefined_object_acl(predefined_acl, &entry.default_object_acl)?;

        let mut attrs = attrs;
        attrs.bucket = bucket.to_string();
        attrs.size = data.len() as i64;
        attrs.generation = generation;
        attrs.metageneration = 1;
        attrs.created = Some(now);
        attrs.updated = Some(now);
        attrs.deleted = None;
        attrs.prefix.clear();
        attrs.component_count = component_count;
        attrs.event_based_hold |= entry.attrs.default_event_based_hold;
        attrs.etag = etag;
        if attrs.storage_class.is_empty() {
            attrs.storage_class = entry.attrs.storage_class.clone();
        }

        let versioning = entry.attrs.versioning_enabled;
        let versions = entry.objects.entry(attrs.name.clone()).or_default();
        if let Some(mut previous) = versions.live.take() {
            if versioning {
                previous.attrs.deleted = Some(now);
                versions.noncurrent.push(previous);
            }
        }
        versions.live = Some(StoredObject {
            attrs: attrs.clone(),
            data,
            acl,
        });
        Ok(attrs)
    }

    pub(crate) fn compose_object(&mut self, req: &ComposeObjectRequest) -> Result<ObjectAttrs> {
        let bucket = req.destination.bucket.as_str();
        let entry = self.bucket(bucket)?;
        let mut data = BytesMut::new();
        let mut component_count = 0_i32;
        for source in &req.sources {
            let object = entry
                .object(&source.name, source.generation)
                .ok_or_else(|| BackendError::object_not_found(bucket, &source.name))?;
            if source
                .generation_match
                .is_some_and(|g| g != object.attrs.generation)
            {
                return Err(BackendError::ConditionNotMet("source generation_match"));
            }
            data.extend_from_slice(&object.data);
            component_count = component_count.saturating_add(object.attrs.component_count.max(1));
        }
        self.insert_object(
            bucket,
            req.destination.clone(),
            data.freeze(),
            req.conditions.as_ref(),
            &req.predefined_acl,
            component_count,
        )
    }

    /// Copies at most `chunk` bytes of a rewrite.
    ///
    /// The first step snapshots the source. The final step writes the
    /// destination. A token stays valid until the step that uses it
    /// succeeds, so a failed step can be retried with the same token.
    /// Rewrites idle for longer than [REWRITE_TTL] are discarded.
    pub(crate) fn rewrite_object(&mut self, req: &RewriteObjectRequest, chunk: i64) -> Result<RewriteObjectResponse> {
        let now = Utc::now();
        self.rewrites.retain(|_, p| now - p.updated < REWRITE_TTL);
        let destination = (req.destination.bucket.clone(), req.destination.name.clone());
        let (mut progress, previous) = if req.rewrite_token.is_empty() {
            self.check_bucket(&req.destination.bucket)?;
            let source = self
                .bucket(&req.source.bucket)?
                .object(&req.source.name, req.source.generation)
                .ok_or_else(|| BackendError::object_not_found(&req.source.bucket, &req.source.name))?;
            check_conditions(req.source.conditions.as_ref(), Some(&source.attrs))?;
            let progress = RewriteProgress {
                source: source.clone(),
                destination,
                written: 0,
                updated: now,
            };
            (progress, None)
        } else {
            match self.rewrites.get(&req.rewrite_token) {
                Some(p) if p.destination == destination => (p.clone(), Some(req.rewrite_token.as_str())),
                _ => {
                    return Err(BackendError::InvalidArgument(format!(
                        "invalid rewrite token {}",
                        req.rewrite_token
                    )));
                }
            }
        };

        let size = progress.source.attrs.size;
        progress.written = progress.written.saturating_add(chunk).min(size);
        progress.updated = now;
        if progress.written < size {
            let written = progress.written;
            let token = uuid::Uuid::new_v4().to_string();
            if let Some(previous) = previous {
                self.rewrites.remove(previous);
            }
            self.rewrites.insert(token.clone(), progress);
            return Ok(RewriteObjectResponse::default()
                .set_written(written)
                .set_size(size)
                .set_token(token));
        }

        let source = progress.source;
        let mut attrs = match &req.destination.attrs {
            Some(a) => a.clone(),
            None => {
                let mut a = source.attrs.clone();
                a.event_based_hold = false;
                a.temporary_hold = false;
                a.kms_key_name.clear();
                a
            }
        };
        attrs.name = req.destination.name.clone();
        if !req.destination.kms_key_name.is_empty() {
            attrs.kms_key_name = req.destination.kms_key_name.clone();
        }
        let resource = self.insert_object(
            &req.destination.bucket,
            attrs,
            source.data,
            req.destination.conditions.as_ref(),
            &req.predefined_acl,
            source.attrs.component_count,
        )?;
        if let Some(previous) = previous {
            self.rewrites.remove(previous);
        }
        Ok(RewriteObjectResponse::default()
            .set_done(true)
            .set_written(size)
            .set_size(size)
            .set_resource(resource))
    }

    pub(crate) fn acl_mut(&mut self, target: AclTarget<'_>) -> Result<&mut Vec<AclRule>> {
        match target {
            AclTarget::Bucket(bucket) => Ok(&mut self.bucket_mut(bucket)?.acl),
            AclTarget::DefaultObject(bucket) => Ok(&mut self.bucket_mut(bucket)?.default_object_acl),
            AclTarget::Object(bucket, object) => self
                .bucket_mut(bucket)?
                .object_mut(object, None)
                .map(|o| &mut o.acl)
                .ok_or_else(|| BackendError::object_not_found(bucket, object)),
        }
    }

    pub(crate) fn get_iam_policy(&self, resource: &str) -> Result<Policy> {
        Ok(self.bucket(bucket_name(resource))?.policy.clone())
    }

    pub(crate) fn set_iam_policy(&mut self, resource: &str, policy: Policy) -> Result<Policy> {
        let etag = self.next_etag();
        let entry = self.bucket_mut(bucket_name(resource))?;
        if !policy.etag.is_empty() && policy.etag != entry.policy.etag {
            return Err(BackendError::EtagMismatch);
        }
        let mut policy = policy.set_etag(etag);
        policy.version = policy.version.max(1);
        entry.policy = policy.clone();
        Ok(policy)
    }

    pub(crate) fn test_iam_permissions(&self, resource: &str, permissions: &[String]) -> Result<Vec<String>> {
        self.check_bucket(bucket_name(resource))?;
        Ok(permissions
            .iter()
            .filter(|p| p.starts_with("storage."))
            .cloned()
            .collect())
    }

    /// Creates a new HMAC key, the secret is only included in this response.
    pub(crate) fn create_hmac_key(&mut self, project_id: &str, service_account_email: &str) -> Result<HmacKey> {
        let access_id = format!(
            "GOOG1E{}",
            uuid::Uuid::new_v4().simple().to_string().to_uppercase()
        );
        let mut secret = [0_u8; 30];
        rand::rng().fill(&mut secret);
        let now = Utc::now();
        let key = HmacKey {
            id: format!("{project_id}/{access_id}"),
            access_id: access_id.clone(),
            project_id: project_id.to_string(),
            service_account_email: service_account_email.to_string(),
            state: HmacKeyState::Active,
            created: Some(now),
            updated: Some(now),
            etag: self.next_etag(),
            secret: String::new(),
        };
        self.hmac_keys.insert(access_id, key.clone());
        Ok(HmacKey {
            secret: BASE64_STANDARD.encode(secret),
            ..key
        })
    }

    pub(crate) fn get_hmac_key(&self, project_id: &str, access_id: &str) -> Result<HmacKey> {
        self.hmac_keys
            .get(access_id)
            .filter(|k| k.project_id == project_id)
            .cloned()
            .ok_or_else(|| BackendError::HmacKeyNotFound(access_id.to_string()))
    }

    pub(crate) fn list_hmac_keys(
        &self,
        project_id: &str,
        query: &HmacKeyQuery,
        token: &str,
        page_size: usize,
    ) -> Result<ListHmacKeysResponse> {
        let items = self
            .hmac_keys
            .iter()
            .filter(|(_, k)| k.project_id == project_id)
            .filter(|(_, k)| query.show_deleted || k.state != HmacKeyState::Deleted)
            .filter(|(_, k)| {
                query
                    .service_account_email
                    .as_ref()
                    .is_none_or(|e| *e == k.service_account_email)
            })
            .map(|(id, k)| (id.clone(), k.clone()));
        let (keys, next_page_token) = paginate(items, token, page_size)?;
        Ok(ListHmacKeysResponse {
            keys,
            next_page_token,
        })
    }

    pub(crate) fn update_hmac_key(
        &mut self,
        project_id: &str,
        access_id: &str,
        attrs: &HmacKeyAttrsToUpdate,
    ) -> Result<HmacKey> {
        if attrs.state == HmacKeyState::Deleted {
            return Err(BackendError::InvalidArgument(
                "the new state must be ACTIVE or INACTIVE".to_string(),
            ));
        }
        let etag = self.next_etag();
        let key = self.hmac_key_mut(project_id, access_id)?;
        if key.state == HmacKeyState::Deleted {
            return Err(BackendError::FailedPrecondition("a deleted key cannot be updated"));
        }
        if attrs.etag.as_ref().is_some_and(|e| *e != key.etag) {
            return Err(BackendError::EtagMismatch);
        }
        key.state = attrs.state;
        key.updated = Some(Utc::now());
        key.etag = etag;
        Ok(key.clone())
    }

    pub(crate) fn delete_hmac_key(&mut self, project_id: &str, access_id: &str) -> Result<()> {
        let etag = self.next_etag();
        let key = self.hmac_key_mut(project_id, access_id)?;
        if key.state != HmacKeyState::Inactive {
            return Err(BackendError::FailedPrecondition("only inactive keys can be deleted"));
        }
        key.state = HmacKeyState::Deleted;
        key.updated = Some(Utc::now());
        key.etag = etag;
        Ok(())
    }

    fn hmac_key_mut(&mut self, project_id: &str, access_id: &str) -> Result<&mut HmacKey> {
        self.hmac_keys
            .get_mut(access_id)
            .filter(|k| k.project_id == project_id)
            .ok_or_else(|| BackendError::HmacKeyNotFound(access_id.to_string()))
    }
}

pub(crate) fn upsert_acl(acl: &mut Vec<AclRule>, entity: AclEntity, role: AclRole) {
    match acl.iter_mut().find(|r| r.entity == entity) {
        Some(rule) => rule.role = role,
        None => acl.push(AclRule::new(entity, role)),
    }
}

pub(crate) fn delete_acl(acl: &mut Vec<AclRule>, entity: &AclEntity) -> Result<()> {
    let before = acl.len();
    acl.retain(|r| r.entity != *entity);
    if acl.len() == before {
        return Err(BackendError::AclNotFound(entity.clone()));
    }
    Ok(())
}

// IAM resources may use the bucket name or its full resource name.
fn bucket_name(resource: &str) -> &str {
    resource
        .strip_prefix("projects/_/buckets/")
        .unwrap_or(resource)
}

fn check_bucket_conditions(conds: Option<&BucketConditions>, attrs: &BucketAttrs) -> Result<()> {
    let Some(conds) = conds else {
        return Ok(());
    };
    if conds
        .metageneration_match
        .is_some_and(|m| m != attrs.metageneration)
    {
        return Err(BackendError::ConditionNotMet("metageneration_match"));
    }
    if conds
        .metageneration_not_match
        .is_some_and(|m| m == attrs.metageneration)
    {
        return Err(BackendError::ConditionNotMet("metageneration_not_match"));
    }
    Ok(())
}

// A generation of 0 represents a missing object.
fn check_conditions(conds: Option<&Conditions>, current: Option<&ObjectAttrs>) -> Result<()> {
    let Some(conds) = conds else {
        return Ok(());
    };
    let generation = current.map(|a| a.generation).unwrap_or(0);
    if conds.does_not_exist && current.is_some() {
        return Err(BackendError::ConditionNotMet("does_not_exist"));
    }
    if conds.generation_match.is_some_and(|g| g != generation) {
        return Err(BackendError::ConditionNotMet("generation_match"));
    }
    if conds.generation_not_match.is_some_and(|g| g == generation) {
        return Err(BackendError::ConditionNotMet("generation_not_match"));
    }
    if let Some(m) = conds.metageneration_match {
        if current.is_none_or(|a| a.metageneration != m) {
            return Err(BackendError::ConditionNotMet("metageneration_match"));
        }
    }
    if let Some(m) = conds.metageneration_not_match {
        if current.is_some_and(|a| a.metageneration == m) {
            return Err(BackendError::ConditionNotMet("metageneration_not_match"));
        }
    }
    Ok(())
}

fn check_retention(attrs: &ObjectAttrs, policy: Option<&RetentionPolicy>, now: DateTime<Utc>) -> Result<()> {
    if attrs.event_based_hold || attrs.temporary_hold {
        return Err(BackendError::Retained(attrs.name.clone()));
    }
    let (Some(policy), Some(created)) = (policy, attrs.created) else {
        return Ok(());
    };
    let until = TimeDelta::from_std(policy.retention_period)
        .ok()
        .and_then(|d| created.checked_add_signed(d));
    if until.is_none_or(|u| u > now) {
        return Err(BackendError::Retained(attrs.name.clone()));
    }
    Ok(())
}

fn predefined_object_acl(name: &str, default: &[AclRule]) -> Result<Vec<AclRule>> {
    let public = match name {
        "" | "projectPrivate" | "bucketOwnerRead" | "bucketOwnerFullControl" => None,
        "private" => return Ok(Vec::new()),
        "publicRead" => Some(AclEntity::ALL_USERS),
        "authenticatedRead" => Some(AclEntity::ALL_AUTHENTICATED_USERS),
        _ => {
            return Err(BackendError::InvalidArgument(format!(
                "unknown predefined ACL {name}"
            )));
        }
    };
    let mut acl = default.to_vec();
    if let Some(entity) = public {
        upsert_acl(&mut acl, AclEntity::new(entity), AclRole::Reader);
    }
    Ok(acl)
}

// Page tokens encode the key of the last item returned. The items must be
// sorted by key.
fn paginate<T, I>(items: I, token: &str, page_size: usize) -> Result<(Vec<T>, String)>
where
    I: IntoIterator<Item = (String, T)>,
{
    let after = decode_token(token)?;
    let mut items = items
        .into_iter()
        .filter(|(k, _)| after.as_deref().is_none_or(|a| k.as_str() > a))
        .peekable();
    let mut page = Vec::new();
    let mut last = None;
    while page.len() < page_size.max(1) {
        let Some((key, item)) = items.next() else {
            break;
        };
        page.push(item);
        last = Some(key);
    }
    let next = match (items.peek(), last) {
        (Some(_), Some(key)) => BASE64_URL_SAFE_NO_PAD.encode(key),
        _ => String::new(),
    };
    Ok((page, next))
}

fn decode_token(token: &str) -> Result<Option<String>> {
    if token.is_empty() {
        return Ok(None);
    }
    let invalid = || BackendError::InvalidArgument(format!("invalid page token {token}"));
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| invalid())?;
    String::from_utf8(bytes).map(Some).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::compose::SourceObject;
    use crate::model::rewrite::{RewriteDestination, RewriteSource};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    fn state_with_bucket(versioning: bool) -> anyhow::Result<State> {
        let mut state = State::default();
        state.create_bucket(
            "p",
            BucketAttrs::new("b").set_versioning_enabled(versioning),
        )?;
        Ok(state)
    }

    fn put(state: &mut State, name: &str, data: &'static str) -> anyhow::Result<ObjectAttrs> {
        let attrs = state.insert_object(
            "b",
            ObjectAttrs::new("b", name),
            Bytes::from_static(data.as_bytes()),
            None,
            "",
            0,
        )?;
        Ok(attrs)
    }

    #[test]
    fn error_conversion() {
        let error = Error::from(BackendError::BucketNotEmpty("b".into()));
        let status = error.status().expect("service error");
        assert_eq!(status.code, Code::FailedPrecondition);
        assert_eq!(error.http_status_code(), Some(409));
        let error = Error::from(BackendError::ConditionNotMet("generation_match"));
        assert_eq!(error.status().map(|s| s.code), Some(Code::FailedPrecondition));
        assert_eq!(error.http_status_code(), Some(412));
        let error = Error::from(BackendError::BucketNotFound("b".into()));
        assert_eq!(error.status().map(|s| s.code), Some(Code::NotFound));
        assert_eq!(error.http_status_code(), Some(404));
    }

    #[test]
    fn bucket_lifecycle() -> TestResult {
        let mut state = state_with_bucket(false)?;
        let got = state.get_bucket("b", None)?;
        assert_eq!(got.metageneration, 1);
        assert_eq!(got.location, "US");
        let err = state
            .create_bucket("p", BucketAttrs::new("b"))
            .unwrap_err();
        assert!(matches!(err, BackendError::BucketExists(_)), "{err:?}");

        let update = BucketAttrsToUpdate::default()
            .set_versioning_enabled(true)
            .set_label("env", "test");
        let conds = BucketConditions::default().set_metageneration_match(1);
        let got = state.update_bucket("b", &update, Some(&conds))?;
        assert_eq!(got.metageneration, 2);
        assert!(got.versioning_enabled);
        assert_eq!(got.labels.get("env").map(String::as_str), Some("test"));
        let err = state.update_bucket("b", &update, Some(&conds)).unwrap_err();
        assert!(matches!(err, BackendError::ConditionNotMet(_)), "{err:?}");

        put(&mut state, "o", "data")?;
        let err = state.delete_bucket("b", None).unwrap_err();
        assert!(matches!(err, BackendError::BucketNotEmpty(_)), "{err:?}");
        state.delete_object("b", "o", None, None)?;
        // The bucket keeps the noncurrent version.
        let err = state.delete_bucket("b", None).unwrap_err();
        assert!(matches!(err, BackendError::BucketNotEmpty(_)), "{err:?}");
        let noncurrent = state.list_objects("b", &Query::default().set_versions(true), "", 10)?;
        let generation = noncurrent.objects[0].generation;
        state.delete_object("b", "o", Some(generation), None)?;
        state.delete_bucket("b", None)?;
        let err = state.get_bucket("b", None).unwrap_err();
        assert!(matches!(err, BackendError::BucketNotFound(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn retention_lock() -> TestResult {
        let mut state = state_with_bucket(false)?;
        let conds = BucketConditions::default().set_metageneration_match(1);
        let err = state.lock_retention_policy("b", Some(&conds)).unwrap_err();
        assert!(matches!(err, BackendError::FailedPrecondition(_)), "{err:?}");

        let update = BucketAttrsToUpdate::default().set_retention_period(Duration::from_secs(3600));
        let got = state.update_bucket("b", &update, None)?;
        let err = state.lock_retention_policy("b", None).unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)), "{err:?}");
        let conds = BucketConditions::default().set_metageneration_match(got.metageneration);
        state.lock_retention_policy("b", Some(&conds))?;
        let got = state.get_bucket("b", None)?;
        assert!(got.retention_policy.as_ref().is_some_and(|p| p.is_locked), "{got:?}");

        let shorter = BucketAttrsToUpdate::default().set_retention_period(Duration::from_secs(60));
        let err = state.update_bucket("b", &shorter, None).unwrap_err();
        assert!(matches!(err, BackendError::FailedPrecondition(_)), "{err:?}");
        let remove = BucketAttrsToUpdate::default().set_retention_period(Duration::ZERO);
        let err = state.update_bucket("b", &remove, None).unwrap_err();
        assert!(matches!(err, BackendError::FailedPrecondition(_)), "{err:?}");
        let longer = BucketAttrsToUpdate::default().set_retention_period(Duration::from_secs(7200));
        let got = state.update_bucket("b", &longer, None)?;
        assert_eq!(
            got.retention_policy.map(|p| p.retention_period),
            Some(Duration::from_secs(7200))
        );

        put(&mut state, "o", "data")?;
        let err = state.delete_object("b", "o", None, None).unwrap_err();
        assert!(matches!(err, BackendError::Retained(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn generations_increase() -> TestResult {
        let mut state = state_with_bucket(true)?;
        let first = put(&mut state, "o", "one")?;
        let second = put(&mut state, "o", "two")?;
        assert!(second.generation > first.generation, "{first:?} {second:?}");
        let (_, data) = state.read_object("b", "o", Some(first.generation), None)?;
        assert_eq!(data, Bytes::from_static(b"one"));
        let (attrs, data) = state.read_object("b", "o", None, None)?;
        assert_eq!(data, Bytes::from_static(b"two"));
        assert_eq!(attrs.size, 3);
        Ok(())
    }

    #[test_case(Conditions::default().set_does_not_exist(true), false)]
    #[test_case(Conditions::default().set_generation_match(0), false)]
    #[test_case(Conditions::default().set_generation_match(42), false)]
    #[test_case(Conditions::default().set_generation_not_match(42), true)]
    #[test_case(Conditions::default().set_metageneration_match(1), true)]
    #[test_case(Conditions::default().set_metageneration_match(2), false)]
    #[test_case(Conditions::default().set_metageneration_not_match(1), false)]
    fn conditions_on_existing(conds: Conditions, ok: bool) -> TestResult {
        let mut state = state_with_bucket(false)?;
        put(&mut state, "o", "data")?;
        let got = state.get_object("b", "o", None, Some(&conds));
        assert_eq!(got.is_ok(), ok, "{got:?}");
        if let Err(e) = got {
            assert!(matches!(e, BackendError::ConditionNotMet(_)), "{e:?}");
        }
        Ok(())
    }

    #[test]
    fn write_preconditions() -> TestResult {
        let mut state = state_with_bucket(false)?;
        let create = Conditions::default().set_does_not_exist(true);
        let attrs = state.insert_object("b", ObjectAttrs::new("b", "o"), Bytes::new(), Some(&create), "", 0)?;
        let err = state
            .insert_object("b", ObjectAttrs::new("b", "o"), Bytes::new(), Some(&create), "", 0)
            .unwrap_err();
        assert!(matches!(err, BackendError::ConditionNotMet("does_not_exist")), "{err:?}");
        let replace = Conditions::default().set_generation_match(attrs.generation);
        let got = state.insert_object("b", ObjectAttrs::new("b", "o"), Bytes::new(), Some(&replace), "", 0)?;
        assert!(got.generation > attrs.generation);
        Ok(())
    }

    #[test]
    fn update_object() -> TestResult {
        let mut state = state_with_bucket(false)?;
        put(&mut state, "o", "data")?;
        let update = ObjectAttrsToUpdate::default()
            .set_content_type("text/plain")
            .set_temporary_hold(true);
        let got = state.update_object("b", "o", None, &update, None)?;
        assert_eq!(got.metageneration, 2);
        assert_eq!(got.content_type, "text/plain");
        let err = state.delete_object("b", "o", None, None).unwrap_err();
        assert!(matches!(err, BackendError::Retained(_)), "{err:?}");
        let release = ObjectAttrsToUpdate::default().set_temporary_hold(false);
        state.update_object("b", "o", None, &release, None)?;
        state.delete_object("b", "o", None, None)?;
        let err = state.get_object("b", "o", None, None).unwrap_err();
        assert!(matches!(err, BackendError::ObjectNotFound { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn list_with_delimiter() -> TestResult {
        let mut state = state_with_bucket(false)?;
        for name in ["a/1", "a/2", "b/1", "c", "d"] {
            put(&mut state, name, "x")?;
        }
        let query = Query::default().set_delimiter("/");
        let got = state.list_objects("b", &query, "", 10)?;
        let names: Vec<_> = got.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);
        assert_eq!(got.prefixes, vec!["a/", "b/"]);
        assert!(got.next_page_token.is_empty());

        let query = Query::default().set_prefix("a/").set_delimiter("/");
        let got = state.list_objects("b", &query, "", 10)?;
        let names: Vec<_> = got.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a/1", "a/2"]);

        let query = Query::default().set_start_offset("b").set_end_offset("d");
        let got = state.list_objects("b", &query, "", 10)?;
        let names: Vec<_> = got.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["b/1", "c"]);
        Ok(())
    }

    #[test]
    fn list_pages() -> TestResult {
        let mut state = state_with_bucket(false)?;
        for name in ["a", "b", "c", "d", "e"] {
            put(&mut state, name, "x")?;
        }
        let mut token = String::new();
        let mut names = Vec::new();
        let mut pages = 0;
        loop {
            let page = state.list_objects("b", &Query::default(), &token, 2)?;
            names.extend(page.objects.into_iter().map(|o| o.name));
            pages += 1;
            if page.next_page_token.is_empty() {
                break;
            }
            token = page.next_page_token;
        }
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(pages, 3);

        let err = state.list_objects("b", &Query::default(), "not base64!", 2).unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn acls() -> TestResult {
        let mut state = state_with_bucket(false)?;
        put(&mut state, "o", "x")?;
        let entity = AclEntity::user("a@example.com");
        for target in [
            AclTarget::Bucket("b"),
            AclTarget::DefaultObject("b"),
            AclTarget::Object("b", "o"),
        ] {
            let acl = state.acl_mut(target)?;
            upsert_acl(acl, entity.clone(), AclRole::Reader);
            upsert_acl(acl, entity.clone(), AclRole::Writer);
            let rules: Vec<_> = acl.iter().filter(|r| r.entity == entity).collect();
            assert_eq!(rules.len(), 1, "{target:?}");
            assert_eq!(rules[0].role, AclRole::Writer);
            assert_eq!(rules[0].email, "a@example.com");
            delete_acl(acl, &entity)?;
            let err = delete_acl(acl, &entity).unwrap_err();
            assert!(matches!(err, BackendError::AclNotFound(_)), "{err:?}");
        }
        let err = state.acl_mut(AclTarget::Object("b", "missing")).unwrap_err();
        assert!(matches!(err, BackendError::ObjectNotFound { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn public_read() -> TestResult {
        let mut state = state_with_bucket(false)?;
        state.insert_object("b", ObjectAttrs::new("b", "o"), Bytes::new(), None, "publicRead", 0)?;
        let acl = state.acl_mut(AclTarget::Object("b", "o"))?;
        assert!(
            acl.iter()
                .any(|r| r.entity.as_str() == AclEntity::ALL_USERS && r.role == AclRole::Reader),
            "{acl:?}"
        );
        let err = state
            .insert_object("b", ObjectAttrs::new("b", "o"), Bytes::new(), None, "bogus", 0)
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn compose() -> TestResult {
        let mut state = state_with_bucket(false)?;
        let a = put(&mut state, "a", "hello ")?;
        put(&mut state, "b", "world")?;
        let req = ComposeObjectRequest::new(ObjectAttrs::new("b", "ab"))
            .add_source(SourceObject::new("a").set_generation_match(a.generation))
            .add_source(SourceObject::new("b"));
        let got = state.compose_object(&req)?;
        assert_eq!(got.component_count, 2);
        assert_eq!(got.size, 11);
        let (_, data) = state.read_object("b", "ab", None, None)?;
        assert_eq!(data, Bytes::from_static(b"hello world"));

        let req = ComposeObjectRequest::new(ObjectAttrs::new("b", "ab"))
            .add_source(SourceObject::new("a").set_generation_match(a.generation + 1));
        let err = state.compose_object(&req).unwrap_err();
        assert!(matches!(err, BackendError::ConditionNotMet(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn rewrite_steps() -> TestResult {
        let mut state = state_with_bucket(false)?;
        let data = vec![7_u8; 5 * 1024 * 1024 / 2];
        state.insert_object("b", ObjectAttrs::new("b", "src"), Bytes::from(data), None, "", 0)?;
        let mut req = RewriteObjectRequest::new(
            RewriteSource::new("b", "src"),
            RewriteDestination::new("b", "dst"),
        );
        let chunk = 1024 * 1024;
        let mut progress = Vec::new();
        let response = loop {
            let response = state.rewrite_object(&req, chunk)?;
            if response.done {
                break response;
            }
            progress.push(response.written);
            req.rewrite_token = response.token;
        };
        assert_eq!(progress, vec![chunk, 2 * chunk]);
        let resource = response.resource.expect("resource on the final step");
        assert_eq!(resource.name, "dst");
        assert_eq!(resource.size, response.size);
        assert_eq!(response.written, response.size);

        req.rewrite_token = "unknown".to_string();
        let err = state.rewrite_object(&req, chunk).unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn rewrite_tokens_expire() -> TestResult {
        let mut state = state_with_bucket(false)?;
        state.insert_object("b", ObjectAttrs::new("b", "src"), Bytes::from_static(b"0123456789"), None, "", 0)?;
        let mut req = RewriteObjectRequest::new(
            RewriteSource::new("b", "src"),
            RewriteDestination::new("b", "dst"),
        );
        let response = state.rewrite_object(&req, 4)?;
        assert!(!response.done, "{response:?}");
        assert_eq!(state.rewrites.len(), 1);

        let stale = state
            .rewrites
            .get_mut(&response.token)
            .expect("progress for the token");
        stale.updated -= REWRITE_TTL;
        let fresh = state.rewrite_object(&req, 4)?;
        assert_eq!(state.rewrites.len(), 1);
        assert!(state.rewrites.contains_key(&fresh.token));

        req.rewrite_token = response.token;
        let err = state.rewrite_object(&req, 4).unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn iam() -> TestResult {
        let mut state = state_with_bucket(false)?;
        let policy = state.get_iam_policy("b")?;
        assert!(!policy.members("roles/storage.legacyBucketOwner").is_empty());
        let updated = state.set_iam_policy(
            "projects/_/buckets/b",
            policy.clone().add("user:a@example.com", "roles/storage.objectViewer"),
        )?;
        assert_ne!(updated.etag, policy.etag);
        let err = state.set_iam_policy("b", policy).unwrap_err();
        assert!(matches!(err, BackendError::EtagMismatch), "{err:?}");

        let permissions = vec!["storage.buckets.get".to_string(), "other.thing".to_string()];
        let got = state.test_iam_permissions("b", &permissions)?;
        assert_eq!(got, vec!["storage.buckets.get"]);
        Ok(())
    }

    #[test]
    fn hmac_keys() -> TestResult {
        let mut state = State::default();
        let key = state.create_hmac_key("p", "sa@example.com")?;
        assert!(!key.secret.is_empty());
        assert_eq!(key.state, HmacKeyState::Active);
        let got = state.get_hmac_key("p", &key.access_id)?;
        assert!(got.secret.is_empty(), "{got:?}");
        let err = state.get_hmac_key("other", &key.access_id).unwrap_err();
        assert!(matches!(err, BackendError::HmacKeyNotFound(_)), "{err:?}");

        let err = state.delete_hmac_key("p", &key.access_id).unwrap_err();
        assert!(matches!(err, BackendError::FailedPrecondition(_)), "{err:?}");
        let stale = HmacKeyAttrsToUpdate::new(HmacKeyState::Inactive).set_etag("stale");
        let err = state.update_hmac_key("p", &key.access_id, &stale).unwrap_err();
        assert!(matches!(err, BackendError::EtagMismatch), "{err:?}");
        let inactive = HmacKeyAttrsToUpdate::new(HmacKeyState::Inactive).set_etag(got.etag);
        state.update_hmac_key("p", &key.access_id, &inactive)?;
        state.delete_hmac_key("p", &key.access_id)?;

        let listed = state.list_hmac_keys("p", &HmacKeyQuery::default(), "", 10)?;
        assert!(listed.keys.is_empty(), "{listed:?}");
        let query = HmacKeyQuery::default().set_show_deleted(true);
        let listed = state.list_hmac_keys("p", &query, "", 10)?;
        assert_eq!(listed.keys.len(), 1);
        assert_eq!(listed.keys[0].state, HmacKeyState::Deleted);
        Ok(())
    }
}
