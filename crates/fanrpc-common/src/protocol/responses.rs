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

//! fanrpc Response Types
//!
//! This module defines the response attached to a request once an executor
//! has answered it.

use serde::{Deserialize, Serialize};
use super::RequestId;

/// Result payload returned by an executor.
///
/// The dispatcher never interprets it; any JSON value is accepted.
pub type RpcResult = serde_json::Value;

/// A response produced for one request of a batch.
///
/// # Example
///
/// ```
/// use fanrpc_common::protocol::responses::Response;
/// use serde_json::json;
///
/// let response = Response::new("req-1", json!({"sum": 3}));
/// assert_eq!(response.request_id, "req-1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Id of the request this response answers
    pub request_id: RequestId,
    /// Whatever JSON the executor returned
    pub result: RpcResult,
}

impl Response {
    pub fn new(request_id: impl Into<RequestId>, result: RpcResult) -> Self {
        Response {
            request_id: request_id.into(),
            result,
        }
    }
}
