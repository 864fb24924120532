// Copyright 2025 fanrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! fanrpc Common Types
//!
//! This crate provides the protocol definitions shared by the fanrpc
//! dispatcher, its client and the CLI.
//!
//! # Overview
//!
//! fanrpc fans a batch of requests out to a pool of remote executors and
//! hands the batch back once every request has a response. This crate holds
//! the pieces both sides of that exchange agree on:
//!
//! - **Protocol**: `Request`, `Response`, `RequestBatch`, `ExecutorAddr`
//! - **Errors**: the `FanrpcError` enum and `Result` alias
//! - **Auth**: the admission token executors present when registering
//!
//! # Wire format
//!
//! Everything is JSON over HTTP:
//! - `POST /requests` on the dispatcher takes `{"requests": [...]}`
//! - `POST /request` on an executor takes one serialized `Request`
//!
//! # Example
//!
//! ```
//! use fanrpc_common::{Request, RequestBatch};
//!
//! let batch = RequestBatch::new(vec![
//!     Request::new("1", "thumbnail").with_parameter("size", "64"),
//!     Request::new("2", "thumbnail").with_parameter("size", "128"),
//! ]);
//! assert_eq!(batch.len(), 2);
//! ```

pub mod auth;
pub mod protocol;

pub use protocol::*;
