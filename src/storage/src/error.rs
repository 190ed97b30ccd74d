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

//! The error type returned by every storage transport.
//!
//! Transports report errors from multiple sources: the service may return an
//! error, the transport may be unable to complete the request, the caller may
//! cancel the request, the request may exceed its deadline, or the transport
//! may not support the operation at all. All of them are normalized into
//! [Error] before they cross the [stub::Storage][crate::stub::Storage]
//! boundary, so callers can inspect the same structured fields regardless of
//! which transport made the request.
//!
//! Errors produced by the service carry a [Status][rpc::Status] with a
//! numeric code, a message, and a list of structured details.

pub mod rpc;

use http::HeaderMap;
use rpc::{Code, Status};
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by all storage transports.
///
/// Most applications will just return the error or log it, without any further
/// action. However, some applications may need to interrogate the error
/// details. This type offers a series of predicates to determine the error
/// kind, and accessors to query the most common error details.
///
/// # Example
/// ```
/// use google_cloud_storage_transport::Error;
/// use google_cloud_storage_transport::error::rpc::{Code, Status};
/// fn handle(e: Error) {
///     match e {
///         e if e.is_unimplemented() => println!("pick another transport: {e}"),
///         e if e.status().is_some_and(|s| s.code == Code::NotFound) => println!("missing: {e}"),
///         e => println!("some other error {e}"),
///     }
/// }
/// handle(Error::service(Status::default().set_code(Code::NotFound)));
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error for an operation the transport does not support.
    ///
    /// # Example
    /// ```
    /// use google_cloud_storage_transport::Error;
    /// let error = Error::unimplemented("lock_bucket_retention_policy");
    /// assert!(error.is_unimplemented());
    /// assert_eq!(error.unimplemented_operation(), Some("lock_bucket_retention_policy"));
    /// ```
    pub fn unimplemented(operation: &'static str) -> Self {
        Self {
            kind: ErrorKind::Unimplemented(operation),
            source: None,
        }
    }

    /// The transport does not implement the requested operation.
    ///
    /// This error is always generated by the client library, before any
    /// request is sent. Retrying the operation with the same transport will
    /// fail in the same way.
    ///
    /// # Troubleshooting
    ///
    /// Not all transports support all operations. Use a transport that supports
    /// the operation, or, if you are using a test double, implement the
    /// missing method.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self.kind, ErrorKind::Unimplemented(_))
    }

    /// The name of the unimplemented operation, if this is an unimplemented
    /// error.
    pub fn unimplemented_operation(&self) -> Option<&'static str> {
        match &self.kind {
            ErrorKind::Unimplemented(op) => Some(op),
            _ => None,
        }
    }

    /// Creates an error with the information returned by the service.
    ///
    /// # Example
    /// ```
    /// use google_cloud_storage_transport::Error;
    /// use google_cloud_storage_transport::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self::service_with_http_metadata(status, None, None)
    }

    /// Creates a service error including the transport metadata.
    pub fn service_with_http_metadata(
        status: Status,
        status_code: Option<u16>,
        headers: Option<HeaderMap>,
    ) -> Self {
        let details = ServiceDetails {
            status,
            status_code,
            headers,
        };
        Self {
            kind: ErrorKind::Service(Box::new(details)),
            source: None,
        }
    }

    /// Normalizes an HTTP error response.
    ///
    /// Most services return errors as a JSON object with an `error` field
    /// containing a [Status]. If the payload has this format the function
    /// returns a service error, with the HTTP status code and headers as
    /// additional metadata. Otherwise the function returns a transport error
    /// preserving the raw payload.
    ///
    /// # Example
    /// ```
    /// use google_cloud_storage_transport::Error;
    /// use google_cloud_storage_transport::error::rpc::Code;
    /// let payload = r#"{"error": {"code": 404, "message": "No such object", "status": "NOT_FOUND"}}"#;
    /// let error = Error::from_http_response(404, http::HeaderMap::new(), bytes::Bytes::from_static(payload.as_bytes()));
    /// assert_eq!(error.status().map(|s| s.code), Some(Code::NotFound));
    /// assert_eq!(error.http_status_code(), Some(404));
    /// ```
    pub fn from_http_response(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        match Status::try_from_http_payload(status_code, &payload) {
            Some(status) => Self::service_with_http_metadata(status, Some(status_code), Some(headers)),
            None => Self::http(status_code, headers, payload),
        }
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use google_cloud_storage_transport::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The request could not be completed before its deadline.
    ///
    /// This is always a client-side generated error. Note that the request may
    /// or may not have started, and it may or may not complete in the service.
    /// If the request mutates any state in the service, it may or may not be
    /// safe to attempt the request again.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing a request cancelled by the caller.
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: Some(source.into()),
        }
    }

    /// The caller cancelled the request via its [CallContext].
    ///
    /// The request may or may not have reached the service. Cancellation never
    /// affects the client configuration, the client can be used for further
    /// requests.
    ///
    /// [CallContext]: crate::context::CallContext
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing an exhausted retry policy.
    ///
    /// The `source` is typically the last error returned by the service.
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The request could not complete before the retry policy expired.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing invalid request parameters.
    pub fn binding<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Binding,
            source: Some(source.into()),
        }
    }

    /// If true, the request was missing required parameters or the parameters
    /// were inconsistent.
    ///
    /// # Troubleshooting
    ///
    /// Typically this indicates a problem in the application. For example, a
    /// required bucket name was empty, or the request set conflicting
    /// preconditions.
    pub fn is_binding(&self) -> bool {
        matches!(self.kind, ErrorKind::Binding)
    }

    /// Creates an error representing a serialization problem.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// Creates an error representing a deserialization problem.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response could not be deserialized, or was inconsistent with the
    /// previous responses.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause for deserialization problems are bugs in the
    /// client library and (rarely) bugs in the service. The error
    /// [source][std::error::Error::source] often includes a [RewriteError]
    /// with more details.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// A problem reported by the transport layer, with a full HTTP response.
    pub fn http(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        let details = TransportDetails {
            status_code: Some(status_code),
            headers: Some(headers),
            payload: Some(payload),
        };
        Self {
            kind: ErrorKind::Transport(Box::new(details)),
            source: None,
        }
    }

    /// A problem in the transport layer without a full HTTP response.
    ///
    /// Examples include: a broken connection after the request is sent, or an
    /// interceptor rejecting the request before it is sent.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        let details = TransportDetails {
            status_code: None,
            headers: None,
            payload: None,
        };
        Self {
            kind: ErrorKind::Transport(Box::new(details)),
            source: Some(source.into()),
        }
    }

    /// If true, the transport could not complete the request and has no HTTP
    /// response to report.
    ///
    /// # Troubleshooting
    ///
    /// This type of error is rare, and most often transient. The solution is
    /// typically to use the right retry policy. This may involve marking the
    /// request as idempotent, or configuring the retry policy to retry
    /// non-idempotent failures.
    pub fn is_io(&self) -> bool {
        matches!(
            &self.kind,
            ErrorKind::Transport(d) if matches!(**d, TransportDetails {
                status_code: None,
                headers: None,
                payload: None,
            })
        )
    }

    /// A problem in the transport layer, the request may not have reached the
    /// service.
    pub fn is_transport(&self) -> bool {
        matches!(&self.kind, ErrorKind::Transport(_))
    }

    /// The [Status] payload associated with this error.
    ///
    /// Services return a detailed `Status` message including a numeric code for
    /// the error type, a human-readable message, and a sequence of details.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(d) => Some(&d.status),
            _ => None,
        }
    }

    /// The HTTP status code, if any, associated with this error.
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Transport(d) => d.status_code,
            ErrorKind::Service(d) => d.status_code,
            _ => None,
        }
    }

    /// The headers, if any, associated with this error.
    pub fn http_headers(&self) -> Option<&HeaderMap> {
        match &self.kind {
            ErrorKind::Transport(d) => d.headers.as_ref(),
            ErrorKind::Service(d) => d.headers.as_ref(),
            _ => None,
        }
    }

    /// The payload, if any, associated with this error.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        match &self.kind {
            ErrorKind::Transport(d) => d.payload.as_ref(),
            _ => None,
        }
    }

    /// The status code of a service error, or the code implied by a transport
    /// error with an HTTP status code.
    pub(crate) fn code(&self) -> Option<Code> {
        self.status()
            .map(|s| s.code)
            .or_else(|| self.http_status_code().map(Code::from_http_status))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Unimplemented(op), _) => {
                write!(f, "the `{op}` operation is not implemented by this transport")
            }
            (ErrorKind::Binding, Some(e)) => {
                write!(f, "the request parameters are invalid: {e}")
            }
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Cancelled, Some(e)) => write!(f, "the request was cancelled {e}"),
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "the retry policy is exhausted, last error: {e}")
            }
            (ErrorKind::Transport(details), _) => details.display(self.source.as_deref(), f),
            (ErrorKind::Service(d), _) => {
                write!(
                    f,
                    "the service reports an error with code {} described as: {}",
                    d.status.code, d.status.message
                )
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Unimplemented(&'static str),
    Binding,
    Serialization,
    Deserialization,
    Timeout,
    Cancelled,
    Exhausted,
    Transport(Box<TransportDetails>),
    Service(Box<ServiceDetails>),
}

#[derive(Debug)]
struct TransportDetails {
    status_code: Option<u16>,
    headers: Option<HeaderMap>,
    payload: Option<bytes::Bytes>,
}

impl TransportDetails {
    fn display(
        &self,
        source: Option<&(dyn StdError + Send + Sync + 'static)>,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match (source, self) {
            (
                _,
                TransportDetails {
                    status_code: Some(code),
                    payload: Some(p),
                    ..
                },
            ) => {
                if let Ok(message) = std::str::from_utf8(p.as_ref()) {
                    write!(f, "the HTTP transport reports a [{code}] error: {message}")
                } else {
                    write!(f, "the HTTP transport reports a [{code}] error: {p:?}")
                }
            }
            (Some(source), _) => write!(f, "the transport reports an error: {source}"),
            (None, _) => unreachable!("no Error constructor allows this"),
        }
    }
}

#[derive(Debug)]
struct ServiceDetails {
    status_code: Option<u16>,
    headers: Option<HeaderMap>,
    status: Status,
}

/// An unrecoverable problem in the rewrite protocol.
///
/// Rewrites are resumed by the caller, each step returns the number of bytes
/// copied so far. These errors indicate the service reported inconsistent
/// progress. They are returned as the [source][std::error::Error::source] of
/// an [Error] where [is_deserialization()][Error::is_deserialization] is true.
///
/// # Example
/// ```
/// use std::error::Error as _;
/// use google_cloud_storage_transport::{Error, RewriteError};
/// let error = Error::deser(RewriteError::UnexpectedRewind { previous: 100, reported: 50 });
/// let inner = error.source().and_then(|e| e.downcast_ref::<RewriteError>());
/// assert!(matches!(inner, Some(RewriteError::UnexpectedRewind { .. })));
/// ```
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RewriteError {
    #[error(
        "the service previously reported {previous} bytes rewritten, but now reports only {reported}"
    )]
    UnexpectedRewind { previous: i64, reported: i64 },

    #[error("the service reports the rewrite as done, but did not return the destination object")]
    MissingResource,

    #[error("the service reports the rewrite as in progress, but did not return a rewrite token")]
    MissingToken,
}
