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

//! Types to set up streaming reads and writes.
//!
//! A transport opens a read or write session with
//! [open_reader][crate::stub::Storage::open_reader] and
//! [open_writer][crate::stub::Storage::open_writer]. The session then streams
//! the object data. Sessions observe the [CallContext] passed when they were
//! opened: once the context is cancelled, or its deadline expires, the next
//! read or write fails and no more data is transferred.
//!
//! [CallContext]: crate::context::CallContext

use crate::model::{Conditions, ObjectAttrs};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use pin_project::pin_project;
use std::pin::Pin;

/// The parameters to open a reader.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::streaming::ReadObjectRequest;
/// // Read the last 100 bytes of the object.
/// let request = ReadObjectRequest::new("my-bucket", "my-object").set_offset(-100);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ReadObjectRequest {
    pub bucket: String,
    pub object: String,
    /// Read this generation instead of the live version.
    pub generation: Option<i64>,
    pub conditions: Option<Conditions>,
    /// Start reading at this offset. A negative value reads the last
    /// `-offset` bytes of the object.
    pub offset: i64,
    /// Read at most this many bytes. `None` reads to the end of the object.
    pub length: Option<i64>,
}

impl ReadObjectRequest {
    pub fn new<B: Into<String>, O: Into<String>>(bucket: B, object: O) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
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

    pub fn set_offset(mut self, v: i64) -> Self {
        self.offset = v;
        self
    }

    pub fn set_length(mut self, v: i64) -> Self {
        self.length = Some(v);
        self
    }

    /// Computes the `[start, end)` range to read from an object of `size`
    /// bytes.
    pub(crate) fn range(&self, size: i64) -> Result<(i64, i64)> {
        if self.offset < 0 && self.length.is_some() {
            return Err(Error::binding(
                "a negative offset reads to the end of the object, the length must be unset",
            ));
        }
        if self.length.is_some_and(|l| l < 0) {
            return Err(Error::binding("the length must not be negative"));
        }
        let start = if self.offset < 0 {
            size.saturating_add(self.offset).max(0)
        } else {
            self.offset.min(size)
        };
        let end = match self.length {
            Some(l) => start.saturating_add(l).min(size),
            None => size,
        };
        Ok((start, end))
    }
}

/// Streams the data of an object.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::streaming::ObjectReader;
/// # use google_cloud_storage_transport::model::ObjectAttrs;
/// async fn sample(mut reader: ObjectReader) -> google_cloud_storage_transport::Result<()> {
///     println!("reading {} bytes", reader.remaining());
///     while let Some(chunk) = reader.next().await.transpose()? {
///         println!("got {} bytes", chunk.len());
///     }
///     Ok(())
/// }
/// ```
#[pin_project]
pub struct ObjectReader {
    attrs: ObjectAttrs,
    remaining: i64,
    #[pin]
    stream: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
}

impl ObjectReader {
    /// Creates a reader. Transports use this to return a reader.
    ///
    /// `remaining` is the number of bytes the stream will produce.
    pub fn new<S>(attrs: ObjectAttrs, remaining: i64, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            attrs,
            remaining,
            stream: Box::pin(stream),
        }
    }

    /// The metadata of the object, at the generation being read.
    pub fn attrs(&self) -> &ObjectAttrs {
        &self.attrs
    }

    /// The number of bytes not yet returned.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Returns the next chunk of data.
    pub async fn next(&mut self) -> Option<Result<Bytes>> {
        StreamExt::next(self).await
    }

    /// Reads all the remaining data.
    pub async fn all_bytes(mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::with_capacity(usize::try_from(self.remaining).unwrap_or(0));
        while let Some(chunk) = self.next().await.transpose()? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}

impl Stream for ObjectReader {
    type Item = Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.project();
        let poll = this.stream.poll_next(cx);
        if let std::task::Poll::Ready(Some(Ok(chunk))) = &poll {
            *this.remaining = this.remaining.saturating_sub(chunk.len() as i64);
        }
        poll
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("attrs", &self.attrs)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

/// The parameters to open a writer.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct WriteObjectRequest {
    /// The bucket, name, and metadata of the new object.
    pub attrs: ObjectAttrs,
    /// Preconditions checked when the object is committed.
    pub conditions: Option<Conditions>,
    /// Apply a predefined ACL to the object, e.g. `publicRead`.
    pub predefined_acl: String,
}

impl WriteObjectRequest {
    pub fn new(attrs: ObjectAttrs) -> Self {
        Self {
            attrs,
            ..Default::default()
        }
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

/// A transport-specific upload.
///
/// Transports implement this trait to return an [ObjectWriter].
#[async_trait::async_trait]
pub trait WriteSession: Send + std::fmt::Debug {
    /// Sends the next chunk of data.
    async fn write(&mut self, data: Bytes) -> Result<()>;

    /// Commits the object and returns its metadata.
    async fn close(self: Box<Self>) -> Result<ObjectAttrs>;
}

/// Uploads the data for a new object.
///
/// The object is only created when [close()][ObjectWriter::close] succeeds.
/// Dropping the writer abandons the upload.
#[derive(Debug)]
pub struct ObjectWriter {
    session: Box<dyn WriteSession>,
    written: i64,
}

impl ObjectWriter {
    pub fn new<S: WriteSession + 'static>(session: S) -> Self {
        Self {
            session: Box::new(session),
            written: 0,
        }
    }

    /// The number of bytes written so far.
    pub fn written(&self) -> i64 {
        self.written
    }

    pub async fn write<T: Into<Bytes>>(&mut self, data: T) -> Result<()> {
        let data = data.into();
        let len = data.len() as i64;
        self.session.write(data).await?;
        self.written += len;
        Ok(())
    }

    pub async fn close(self) -> Result<ObjectAttrs> {
        self.session.close().await
    }
}
