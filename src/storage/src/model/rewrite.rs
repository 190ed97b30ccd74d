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

//! The request and response for a single step of a rewrite.
//!
//! Rewriting large objects may need multiple round trips. Each response
//! carries a token, the caller sends the token back with the next request
//! until the response reports the rewrite as done.

use super::{Conditions, ObjectAttrs};

/// One step of a rewrite.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::model::rewrite::*;
/// let request = RewriteObjectRequest::new(
///     RewriteSource::new("source-bucket", "source.bin"),
///     RewriteDestination::new("dest-bucket", "dest.bin"),
/// )
/// .set_max_bytes_rewritten_per_call(1024 * 1024);
/// assert!(request.rewrite_token.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RewriteObjectRequest {
    pub source: RewriteSource,
    pub destination: RewriteDestination,
    /// Apply a predefined ACL to the destination, e.g. `publicRead`.
    pub predefined_acl: String,
    /// Limit the bytes copied in each step. The service rounds this to a
    /// multiple of 1 MiB.
    pub max_bytes_rewritten_per_call: Option<i64>,
    /// The token returned by the previous step, empty on the first step.
    pub rewrite_token: String,
}

impl RewriteObjectRequest {
    pub fn new(source: RewriteSource, destination: RewriteDestination) -> Self {
        Self {
            source,
            destination,
            ..Default::default()
        }
    }

    pub fn set_predefined_acl<T: Into<String>>(mut self, v: T) -> Self {
        self.predefined_acl = v.into();
        self
    }

    pub fn set_max_bytes_rewritten_per_call(mut self, v: i64) -> Self {
        self.max_bytes_rewritten_per_call = Some(v);
        self
    }

    pub fn set_rewrite_token<T: Into<String>>(mut self, v: T) -> Self {
        self.rewrite_token = v.into();
        self
    }
}

/// The object copied by a rewrite.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RewriteSource {
    pub bucket: String,
    pub name: String,
    /// Copy this generation instead of the live version.
    pub generation: Option<i64>,
    /// Preconditions on the source object.
    pub conditions: Option<Conditions>,
}

impl RewriteSource {
    pub fn new<B: Into<String>, N: Into<String>>(bucket: B, name: N) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_generation(mut self, v: i64) -> Self {
        self.generation = Some(v);
        self
    }

    pub fn set_conditions(mut self, v: Conditions) -> Self {
        self.conditions = Some(v);
        self
    }
}

/// The object created by a rewrite.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RewriteDestination {
    pub bucket: String,
    pub name: String,
    /// Replaces the source metadata, if set.
    pub attrs: Option<ObjectAttrs>,
    /// Encrypt the destination with this key.
    pub kms_key_name: String,
    /// Preconditions on the destination object.
    pub conditions: Option<Conditions>,
}

impl RewriteDestination {
    pub fn new<B: Into<String>, N: Into<String>>(bucket: B, name: N) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_attrs(mut self, v: ObjectAttrs) -> Self {
        self.attrs = Some(v);
        self
    }

    pub fn set_kms_key_name<T: Into<String>>(mut self, v: T) -> Self {
        self.kms_key_name = v.into();
        self
    }

    pub fn set_conditions(mut self, v: Conditions) -> Self {
        self.conditions = Some(v);
        self
    }
}

/// The result of one step of a rewrite.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RewriteObjectResponse {
    /// The destination object, only set when `done` is true.
    pub resource: Option<ObjectAttrs>,
    pub done: bool,
    /// The total bytes copied so far.
    pub written: i64,
    /// The total bytes to copy.
    pub size: i64,
    /// Send this token with the next step, empty when `done` is true.
    pub token: String,
}

impl RewriteObjectResponse {
    pub fn set_resource(mut self, v: ObjectAttrs) -> Self {
        self.resource = Some(v);
        self
    }

    pub fn set_done(mut self, v: bool) -> Self {
        self.done = v;
        self
    }

    pub fn set_written(mut self, v: i64) -> Self {
        self.written = v;
        self
    }

    pub fn set_size(mut self, v: i64) -> Self {
        self.size = v;
        self
    }

    pub fn set_token<T: Into<String>>(mut self, v: T) -> Self {
        self.token = v.into();
        self
    }
}
