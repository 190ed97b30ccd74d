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

//! The request to concatenate objects.

use super::{Conditions, ObjectAttrs};

/// The maximum number of source objects in a single compose request.
pub const MAX_COMPOSE_SOURCES: usize = 32;

/// Concatenates up to [MAX_COMPOSE_SOURCES] objects from a bucket into a new
/// object in the same bucket.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::model::ObjectAttrs;
/// # use google_cloud_storage_transport::model::compose::*;
/// let request = ComposeObjectRequest::new(ObjectAttrs::new("my-bucket", "combined.txt"))
///     .add_source(SourceObject::new("part-1.txt"))
///     .add_source(SourceObject::new("part-2.txt").set_generation(1234));
/// assert_eq!(request.sources.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ComposeObjectRequest {
    /// The destination bucket, name, and any metadata for the new object.
    pub destination: ObjectAttrs,
    /// The sources, in concatenation order.
    pub sources: Vec<SourceObject>,
    /// Preconditions on the destination object.
    pub conditions: Option<Conditions>,
    /// Apply a predefined ACL to the destination, e.g. `publicRead`.
    pub predefined_acl: String,
}

impl ComposeObjectRequest {
    pub fn new(destination: ObjectAttrs) -> Self {
        Self {
            destination,
            ..Default::default()
        }
    }

    pub fn add_source(mut self, v: SourceObject) -> Self {
        self.sources.push(v);
        self
    }

    pub fn set_sources<T: IntoIterator<Item = SourceObject>>(mut self, v: T) -> Self {
        self.sources = v.into_iter().collect();
        self
    }

    pub fn set_conditions(mut self, v: Conditions) -> Self {
        self.conditions = Some(v);
        self
    }

    pub fn set_predefined_acl<T: Into<String>>(mut self, v: T) -> Self {
        self.predefined_acl = v.into();
        self
    }
}

/// A source object in a compose request.
///
/// Sources are always in the destination bucket.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct SourceObject {
    pub name: String,
    /// Use this generation instead of the live version.
    pub generation: Option<i64>,
    /// Fail unless the live generation matches this value.
    pub generation_match: Option<i64>,
}

impl SourceObject {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_generation(mut self, v: i64) -> Self {
        self.generation = Some(v);
        self
    }

    pub fn set_generation_match(mut self, v: i64) -> Self {
        self.generation_match = Some(v);
        self
    }
}
