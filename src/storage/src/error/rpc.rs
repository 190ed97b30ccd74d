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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The [Status] type defines a logical error model that is suitable for
/// different programming environments, including REST APIs and RPC APIs. Each
/// [Status] message contains three pieces of data: error code, error message,
/// and error details.
///
/// You can find out more about this error model and how to work with it in the
/// [API Design Guide](https://cloud.google.com/apis/design/errors).
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Status {
    /// The status code.
    pub code: Code,

    /// A developer-facing error message, which should be in English.
    pub message: String,

    /// A list of messages that carry the error details.
    pub details: Vec<StatusDetails>,
}

impl Status {
    /// Sets the value for [code][Status::code].
    pub fn set_code<T: Into<Code>>(mut self, v: T) -> Self {
        self.code = v.into();
        self
    }

    /// Sets the value for [message][Status::message].
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the value for [details][Status::details].
    pub fn set_details<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<StatusDetails>,
    {
        self.details = v.into_iter().map(|v| v.into()).collect();
        self
    }

    /// Parses the JSON error payload returned by HTTP services.
    ///
    /// Returns `None` if the payload is not a JSON object wrapping a status.
    /// The code is taken from the `status` field when present, and derived
    /// from the HTTP status code otherwise.
    pub(crate) fn try_from_http_payload(status_code: u16, payload: &[u8]) -> Option<Self> {
        let wrapper = serde_json::from_slice::<ErrorWrapper>(payload).ok()?;
        let status = wrapper.error;
        let code = match status.status.as_deref().map(Code::try_from) {
            Some(Ok(code)) => code,
            Some(Err(_)) | None => Code::from_http_status(status_code),
        };
        Some(Status {
            code,
            message: status.message,
            details: status.details,
        })
    }
}

/// The canonical error codes for APIs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Code {
    /// Not an error; returned on success.
    Ok = 0,
    /// The operation was cancelled, typically by the caller.
    Cancelled = 1,
    /// Unknown error.
    #[default]
    Unknown = 2,
    /// The client specified an invalid argument.
    InvalidArgument = 3,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4,
    /// Some requested entity (e.g., a bucket or object) was not found.
    NotFound = 5,
    /// The entity that a client attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to execute the specified operation.
    PermissionDenied = 7,
    /// Some resource has been exhausted, perhaps a per-user quota.
    ResourceExhausted = 8,
    /// The operation was rejected because the system is not in a state
    /// required for the operation's execution. For example, a precondition
    /// on the object generation did not hold.
    FailedPrecondition = 9,
    /// The operation was aborted, typically due to a concurrency issue such as
    /// a mismatched etag.
    Aborted = 10,
    /// The operation was attempted past the valid range.
    OutOfRange = 11,
    /// The operation is not implemented or is not supported/enabled in this
    /// service.
    Unimplemented = 12,
    /// Internal errors.
    Internal = 13,
    /// The service is currently unavailable. This is most likely a transient
    /// condition.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl Code {
    pub fn name(&self) -> &str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Maps an HTTP status code to the closest canonical code.
    pub fn from_http_status(status_code: u16) -> Self {
        match status_code {
            200..300 => Code::Ok,
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            408 => Code::DeadlineExceeded,
            409 => Code::Aborted,
            412 => Code::FailedPrecondition,
            416 => Code::OutOfRange,
            429 => Code::ResourceExhausted,
            499 => Code::Cancelled,
            501 => Code::Unimplemented,
            502 | 503 => Code::Unavailable,
            504 => Code::DeadlineExceeded,
            500..600 => Code::Internal,
            _ => Code::Unknown,
        }
    }

    /// The HTTP status code services typically use for this code.
    pub fn http_status(&self) -> u16 {
        match self {
            Code::Ok => 200,
            Code::Cancelled => 499,
            Code::Unknown | Code::Internal | Code::DataLoss => 500,
            Code::InvalidArgument | Code::OutOfRange => 400,
            Code::DeadlineExceeded => 504,
            Code::NotFound => 404,
            Code::AlreadyExists | Code::Aborted => 409,
            Code::PermissionDenied => 403,
            Code::ResourceExhausted => 429,
            Code::FailedPrecondition => 412,
            Code::Unimplemented => 501,
            Code::Unavailable => 503,
            Code::Unauthenticated => 401,
        }
    }
}

impl std::convert::From<i32> for Code {
    fn from(value: i32) -> Self {
        match value {
            0 => Code::Ok,
            1 => Code::Cancelled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::default(),
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::convert::TryFrom<&str> for Code {
    type Error = String;
    fn try_from(value: &str) -> std::result::Result<Code, Self::Error> {
        match value {
            "OK" => Ok(Code::Ok),
            "CANCELLED" => Ok(Code::Cancelled),
            "UNKNOWN" => Ok(Code::Unknown),
            "INVALID_ARGUMENT" => Ok(Code::InvalidArgument),
            "DEADLINE_EXCEEDED" => Ok(Code::DeadlineExceeded),
            "NOT_FOUND" => Ok(Code::NotFound),
            "ALREADY_EXISTS" => Ok(Code::AlreadyExists),
            "PERMISSION_DENIED" => Ok(Code::PermissionDenied),
            "RESOURCE_EXHAUSTED" => Ok(Code::ResourceExhausted),
            "FAILED_PRECONDITION" => Ok(Code::FailedPrecondition),
            "ABORTED" => Ok(Code::Aborted),
            "OUT_OF_RANGE" => Ok(Code::OutOfRange),
            "UNIMPLEMENTED" => Ok(Code::Unimplemented),
            "INTERNAL" => Ok(Code::Internal),
            "UNAVAILABLE" => Ok(Code::Unavailable),
            "DATA_LOSS" => Ok(Code::DataLoss),
            "UNAUTHENTICATED" => Ok(Code::Unauthenticated),
            _ => Err(format!("unknown status code value {value}")),
        }
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i32::deserialize(deserializer).map(Code::from)
    }
}

/// A helper class to deserialize wrapped Status messages.
#[derive(Clone, Debug, Deserialize)]
struct ErrorWrapper {
    error: WrapperStatus,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct WrapperStatus {
    message: String,
    status: Option<String>,
    details: Vec<StatusDetails>,
}

/// The type of details associated with [Status].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "@type")]
#[non_exhaustive]
pub enum StatusDetails {
    #[serde(rename = "type.googleapis.com/google.rpc.ErrorInfo")]
    ErrorInfo(ErrorInfo),
    #[serde(rename = "type.googleapis.com/google.rpc.DebugInfo")]
    DebugInfo(DebugInfo),
    #[serde(rename = "type.googleapis.com/google.rpc.PreconditionFailure")]
    PreconditionFailure(PreconditionFailure),
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// Describes the cause of the error with structured details.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorInfo {
    /// The reason of the error, in `UPPER_SNAKE_CASE`.
    pub reason: String,
    /// The logical grouping to which the reason belongs.
    pub domain: String,
    /// Additional structured details about this error.
    pub metadata: BTreeMap<String, String>,
}

impl ErrorInfo {
    pub fn new<R: Into<String>, D: Into<String>>(reason: R, domain: D) -> Self {
        Self {
            reason: reason.into(),
            domain: domain.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn set_metadata<K: Into<String>, V: Into<String>>(mut self, k: K, v: V) -> Self {
        self.metadata.insert(k.into(), v.into());
        self
    }
}

impl From<ErrorInfo> for StatusDetails {
    fn from(value: ErrorInfo) -> Self {
        StatusDetails::ErrorInfo(value)
    }
}

/// Describes additional debugging info.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct DebugInfo {
    pub stack_entries: Vec<String>,
    pub detail: String,
}

impl From<DebugInfo> for StatusDetails {
    fn from(value: DebugInfo) -> Self {
        StatusDetails::DebugInfo(value)
    }
}

/// Describes what preconditions have failed.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PreconditionFailure {
    pub violations: Vec<PreconditionViolation>,
}

impl PreconditionFailure {
    pub fn new<T: IntoIterator<Item = PreconditionViolation>>(violations: T) -> Self {
        Self {
            violations: violations.into_iter().collect(),
        }
    }
}

impl From<PreconditionFailure> for StatusDetails {
    fn from(value: PreconditionFailure) -> Self {
        StatusDetails::PreconditionFailure(value)
    }
}

/// A message type used to describe a single precondition failure.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PreconditionViolation {
    /// The type of the precondition, e.g. `ifGenerationMatch`.
    pub r#type: String,
    /// The subject, e.g. the object name.
    pub subject: String,
    pub description: String,
}

impl PreconditionViolation {
    pub fn new<T, S, D>(r#type: T, subject: S, description: D) -> Self
    where
        T: Into<String>,
        S: Into<String>,
        D: Into<String>,
    {
        Self {
            r#type: r#type.into(),
            subject: subject.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn status_setters() {
        let got = Status::default()
            .set_code(Code::Unimplemented)
            .set_message("test-message")
            .set_details([ErrorInfo::new("NOT_SUPPORTED", "storage.googleapis.com")]);
        assert_eq!(got.code, Code::Unimplemented);
        assert_eq!(got.message, "test-message");
        assert_eq!(
            got.details,
            vec![StatusDetails::ErrorInfo(ErrorInfo::new(
                "NOT_SUPPORTED",
                "storage.googleapis.com"
            ))]
        );

        let got = Status::default().set_code(Code::Unavailable as i32);
        assert_eq!(got.code, Code::Unavailable);
    }

    #[test]
    fn status_serde() -> anyhow::Result<()> {
        let input = Status::default()
            .set_code(Code::FailedPrecondition)
            .set_message("precondition failed")
            .set_details([PreconditionFailure::new([PreconditionViolation::new(
                "ifGenerationMatch",
                "my-object",
                "generation mismatch",
            )])]);
        let value = serde_json::to_value(&input)?;
        assert_eq!(
            value,
            json!({
                "code": 9,
                "message": "precondition failed",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.PreconditionFailure",
                    "violations": [{
                        "type": "ifGenerationMatch",
                        "subject": "my-object",
                        "description": "generation mismatch",
                    }],
                }],
            })
        );
        let got = serde_json::from_value::<Status>(value)?;
        assert_eq!(got, input);
        Ok(())
    }

    #[test]
    fn unknown_details() -> anyhow::Result<()> {
        let value = json!({
            "code": 14,
            "details": [{"@type": "type.googleapis.com/google.rpc.Help", "links": []}],
        });
        let got = serde_json::from_value::<Status>(value)?;
        assert_eq!(got.code, Code::Unavailable);
        assert!(
            matches!(got.details.first(), Some(StatusDetails::Other(_))),
            "{got:?}"
        );
        Ok(())
    }

    #[test]
    fn from_http_payload() {
        let payload = json!({"error": {"code": 404, "message": "No such object: b/o"}}).to_string();
        let got = Status::try_from_http_payload(404, payload.as_bytes()).expect("valid payload");
        assert_eq!(got.code, Code::NotFound);
        assert_eq!(got.message, "No such object: b/o");

        let payload = json!({"error": {"code": 400, "status": "FAILED_PRECONDITION"}}).to_string();
        let got = Status::try_from_http_payload(400, payload.as_bytes()).expect("valid payload");
        assert_eq!(got.code, Code::FailedPrecondition);

        assert!(Status::try_from_http_payload(500, b"not json").is_none());
        assert!(Status::try_from_http_payload(500, b"{\"no-error\": 1}").is_none());
    }

    #[test_case(Code::Ok)]
    #[test_case(Code::Cancelled)]
    #[test_case(Code::Unknown)]
    #[test_case(Code::InvalidArgument)]
    #[test_case(Code::DeadlineExceeded)]
    #[test_case(Code::NotFound)]
    #[test_case(Code::AlreadyExists)]
    #[test_case(Code::PermissionDenied)]
    #[test_case(Code::ResourceExhausted)]
    #[test_case(Code::FailedPrecondition)]
    #[test_case(Code::Aborted)]
    #[test_case(Code::OutOfRange)]
    #[test_case(Code::Unimplemented)]
    #[test_case(Code::Internal)]
    #[test_case(Code::Unavailable)]
    #[test_case(Code::DataLoss)]
    #[test_case(Code::Unauthenticated)]
    fn code_names(code: Code) {
        assert_eq!(Code::try_from(code.name()), Ok(code));
        assert_eq!(Code::from(code as i32), code);
        assert_eq!(code.to_string(), code.name());
    }

    #[test_case(404, Code::NotFound)]
    #[test_case(412, Code::FailedPrecondition)]
    #[test_case(429, Code::ResourceExhausted)]
    #[test_case(503, Code::Unavailable)]
    #[test_case(504, Code::DeadlineExceeded)]
    #[test_case(507, Code::Internal)]
    #[test_case(302, Code::Unknown)]
    fn http_mapping(status_code: u16, want: Code) {
        assert_eq!(Code::from_http_status(status_code), want);
    }

    #[test]
    fn unknown_code_name() {
        assert!(Code::try_from("NOT-A-CODE").is_err());
        assert_eq!(Code::from(1234), Code::Unknown);
    }
}
