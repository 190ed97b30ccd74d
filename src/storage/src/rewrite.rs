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

//! The rewrite state machine.
//!
//! Rewriting a large object may need several round trips. The transport is
//! stateless: each call to
//! [rewrite_object][crate::stub::Storage::rewrite_object] performs exactly
//! one step. The state travels with the caller, as the token in the request
//! and response. [Rewrite] tracks that state and validates each transition:
//!
//! ```text
//! Pending --> InProgress { token, written } --> ... --> Done(object)
//!    \______________________________________________/^
//! ```
//!
//! Looping and backoff between steps are left to the caller, or to
//! [Storage::rewrite_until_done][crate::client::Storage::rewrite_until_done].

use crate::context::CallContext;
use crate::model::ObjectAttrs;
use crate::model::rewrite::{RewriteObjectRequest, RewriteObjectResponse};
use crate::options::StorageOption;
use crate::{Error, Result, RewriteError};

/// The state of a rewrite.
#[derive(Clone, Debug, PartialEq)]
pub enum RewriteState {
    /// No step has completed.
    Pending,
    /// At least one step completed, more steps are needed.
    InProgress {
        /// Send this token with the next step.
        token: String,
        /// The total bytes copied so far.
        written: i64,
        /// The total bytes to copy.
        size: i64,
    },
    /// The rewrite completed and created this object.
    Done(ObjectAttrs),
}

impl RewriteState {
    /// The total bytes copied so far.
    pub fn written(&self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::InProgress { written, .. } => *written,
            Self::Done(o) => o.size,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Computes the next state given the response to a step.
    ///
    /// Fails if the response is inconsistent: it reports fewer bytes than a
    /// previous step, claims to be done without an object, or claims to be
    /// in progress without a token.
    pub fn transition(&self, response: RewriteObjectResponse) -> Result<RewriteState> {
        let previous = self.written();
        if response.written < previous {
            return Err(Error::deser(RewriteError::UnexpectedRewind {
                previous,
                reported: response.written,
            }));
        }
        if response.done {
            return response
                .resource
                .map(RewriteState::Done)
                .ok_or_else(|| Error::deser(RewriteError::MissingResource));
        }
        if response.token.is_empty() {
            return Err(Error::deser(RewriteError::MissingToken));
        }
        Ok(RewriteState::InProgress {
            token: response.token,
            written: response.written,
            size: response.size,
        })
    }
}

/// A rewrite in progress.
///
/// # Example
/// ```
/// # use google_cloud_storage_transport::rewrite::Rewrite;
/// # use google_cloud_storage_transport::context::CallContext;
/// # use google_cloud_storage_transport::model::rewrite::*;
/// # use google_cloud_storage_transport::stub::Storage;
/// async fn sample<S: Storage>(stub: &S) -> google_cloud_storage_transport::Result<()> {
///     let request = RewriteObjectRequest::new(
///         RewriteSource::new("source-bucket", "source.bin"),
///         RewriteDestination::new("dest-bucket", "dest.bin"),
///     );
///     let mut rewrite = Rewrite::new(request);
///     while !rewrite.state().is_done() {
///         let state = rewrite.advance(stub, &CallContext::new(), &[]).await?;
///         println!("copied {} bytes", state.written());
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Rewrite {
    request: RewriteObjectRequest,
    state: RewriteState,
}

impl Rewrite {
    /// Starts a rewrite.
    ///
    /// If the request already has a token the rewrite resumes from it.
    pub fn new(request: RewriteObjectRequest) -> Self {
        let state = if request.rewrite_token.is_empty() {
            RewriteState::Pending
        } else {
            RewriteState::InProgress {
                token: request.rewrite_token.clone(),
                written: 0,
                size: 0,
            }
        };
        Self { request, state }
    }

    pub fn state(&self) -> &RewriteState {
        &self.state
    }

    /// The request for the next step.
    pub fn next_request(&self) -> RewriteObjectRequest {
        let token = match &self.state {
            RewriteState::InProgress { token, .. } => token.clone(),
            RewriteState::Pending | RewriteState::Done(_) => String::new(),
        };
        self.request.clone().set_rewrite_token(token)
    }

    /// Performs one step of the rewrite.
    ///
    /// Once the rewrite is done this returns the final state without making
    /// any more calls. On error the state is unchanged, and the step can be
    /// retried.
    pub async fn advance<S>(
        &mut self,
        stub: &S,
        ctx: &CallContext,
        opts: &[StorageOption],
    ) -> Result<&RewriteState>
    where
        S: crate::stub::Storage + ?Sized,
    {
        if self.state.is_done() {
            return Ok(&self.state);
        }
        let response = stub
            .rewrite_object(ctx.clone(), self.next_request(), opts.to_vec())
            .await?;
        self.state = self.state.transition(response)?;
        Ok(&self.state)
    }

    /// Consumes the rewrite, returning the new object if it is done.
    pub fn into_result(self) -> Option<ObjectAttrs> {
        match self.state {
            RewriteState::Done(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rewrite::{RewriteDestination, RewriteSource};
    use crate::stub::Storage;
    use std::error::Error as _;
    use std::sync::Mutex;

    fn request() -> RewriteObjectRequest {
        RewriteObjectRequest::new(
            RewriteSource::new("src-bucket", "src"),
            RewriteDestination::new("dst-bucket", "dst"),
        )
    }

    fn in_progress(token: &str, written: i64) -> RewriteObjectResponse {
        RewriteObjectResponse::default()
            .set_token(token)
            .set_written(written)
            .set_size(100)
    }

    fn done(written: i64) -> RewriteObjectResponse {
        let mut object = ObjectAttrs::new("dst-bucket", "dst");
        object.size = written;
        RewriteObjectResponse::default()
            .set_done(true)
            .set_written(written)
            .set_size(written)
            .set_resource(object)
    }

    fn rewrite_error(err: &Error) -> Option<&RewriteError> {
        err.source().and_then(|e| e.downcast_ref::<RewriteError>())
    }

    #[test]
    fn transitions() -> anyhow::Result<()> {
        let state = RewriteState::Pending.transition(in_progress("t1", 10))?;
        assert_eq!(
            state,
            RewriteState::InProgress {
                token: "t1".to_string(),
                written: 10,
                size: 100
            }
        );
        let state = state.transition(in_progress("t2", 10))?;
        assert_eq!(state.written(), 10);
        let state = state.transition(done(100))?;
        assert!(state.is_done(), "{state:?}");
        assert_eq!(state.written(), 100);
        Ok(())
    }

    #[test]
    fn rewind() {
        let state = RewriteState::InProgress {
            token: "t1".to_string(),
            written: 50,
            size: 100,
        };
        let err = state.transition(in_progress("t2", 40)).unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        assert!(
            matches!(
                rewrite_error(&err),
                Some(RewriteError::UnexpectedRewind {
                    previous: 50,
                    reported: 40
                })
            ),
            "{err:?}"
        );
    }

    #[test]
    fn missing_fields() {
        let err = RewriteState::Pending
            .transition(RewriteObjectResponse::default().set_done(true))
            .unwrap_err();
        assert!(
            matches!(rewrite_error(&err), Some(RewriteError::MissingResource)),
            "{err:?}"
        );
        let err = RewriteState::Pending
            .transition(RewriteObjectResponse::default().set_written(10))
            .unwrap_err();
        assert!(
            matches!(rewrite_error(&err), Some(RewriteError::MissingToken)),
            "{err:?}"
        );
    }

    #[test]
    fn resume_from_token() {
        let rewrite = Rewrite::new(request().set_rewrite_token("saved"));
        assert!(matches!(rewrite.state(), RewriteState::InProgress { token, .. } if token == "saved"));
        assert_eq!(rewrite.next_request().rewrite_token, "saved");
    }

    // A stub returning canned responses, recording the tokens it receives.
    #[derive(Debug, Default)]
    struct Canned {
        responses: Mutex<Vec<Result<RewriteObjectResponse>>>,
        tokens: Mutex<Vec<String>>,
    }

    impl Storage for Canned {
        async fn rewrite_object(
            &self,
            _ctx: CallContext,
            req: RewriteObjectRequest,
            _opts: Vec<StorageOption>,
        ) -> Result<RewriteObjectResponse> {
            self.tokens
                .lock()
                .expect("lock is not poisoned")
                .push(req.rewrite_token);
            self.responses
                .lock()
                .expect("lock is not poisoned")
                .remove(0)
        }
    }

    #[tokio::test]
    async fn advance() -> anyhow::Result<()> {
        let stub = Canned {
            responses: Mutex::new(vec![
                Ok(in_progress("t1", 30)),
                Err(Error::io("connection reset")),
                Ok(in_progress("t2", 60)),
                Ok(done(100)),
            ]),
            ..Default::default()
        };
        let ctx = CallContext::new();
        let mut rewrite = Rewrite::new(request());
        assert_eq!(rewrite.advance(&stub, &ctx, &[]).await?.written(), 30);
        let err = rewrite.advance(&stub, &ctx, &[]).await.unwrap_err();
        assert!(err.is_io(), "{err:?}");
        assert_eq!(rewrite.state().written(), 30);
        assert_eq!(rewrite.advance(&stub, &ctx, &[]).await?.written(), 60);
        assert!(rewrite.advance(&stub, &ctx, &[]).await?.is_done());
        // Once done, no more calls are made.
        assert!(rewrite.advance(&stub, &ctx, &[]).await?.is_done());
        assert_eq!(
            *stub.tokens.lock().expect("lock is not poisoned"),
            vec!["", "t1", "t1", "t2"]
        );
        let object = rewrite.into_result().expect("rewrite is done");
        assert_eq!(object.size, 100);
        Ok(())
    }
}
