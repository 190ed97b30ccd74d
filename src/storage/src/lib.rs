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

//! Google Cloud Client Libraries for Rust - Storage transport abstraction
//!
//! This crate defines the contract between the Cloud Storage client and its
//! transports, and how per-call options are resolved into the settings each
//! transport uses:
//!
//! * [stub::Storage] is the operation contract every transport implements.
//!   Operations the transport does not support return an error where
//!   [Error::is_unimplemented] is true.
//! * [options::StorageOption] values configure a call, or the defaults of a
//!   transport. [settings::init_settings] and [settings::call_settings]
//!   resolve them into [settings::Settings], the last option wins.
//! * [transport::memory::InMemoryStorage] is a complete transport, keeping
//!   all the data in memory.
//! * [client::Storage] wraps a transport for applications.
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases.

/// The result type returned by the transports.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::{Error, RewriteError};

pub mod backoff_policy;
pub mod call_option;
pub mod client;
pub mod client_option;
pub mod context;
pub mod error;
pub mod exponential_backoff;
pub mod model;
pub mod options;
pub mod paginator;
pub mod retry_config;
pub(crate) mod retry_loop;
pub mod retry_policy;
pub mod rewrite;
pub mod settings;
pub mod streaming;
pub mod stub;
pub mod transport;
