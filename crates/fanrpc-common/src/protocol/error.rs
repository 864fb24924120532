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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FanrpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Remote call to {addr} failed: {reason}")]
    RemoteCallFailed { addr: String, reason: String },

    #[error("Executor not found: {0}")]
    ExecutorNotFound(String),

    #[error("Authorization error")]
    Unauthorized,

    #[error("Health check error: {0}")]
    HealthCheckFailed(String),

    #[error("Invalid executor address: {0}")]
    InvalidAddress(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Duplicate request id in batch: {0}")]
    DuplicateRequestId(String),

    #[error("Batch deadline of {0}ms exceeded")]
    DeadlineExceeded(u64),

    #[error("Request {request_id} gave up after {attempts} attempts")]
    RetriesExhausted { request_id: String, attempts: u32 },

    #[error("Dispatch task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FanrpcError {
    /// Errors that belong to a single remote attempt.
    ///
    /// The dispatcher retries these on a fresh executor. Any other error
    /// returned by a remote call ends the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FanrpcError::Transport(_)
                | FanrpcError::JsonSerialization(_)
                | FanrpcError::Timeout(_)
                | FanrpcError::RemoteCallFailed { .. }
                | FanrpcError::ExecutorNotFound(_)
        )
    }
}

impl From<std::net::AddrParseError> for FanrpcError {
    fn from(err: std::net::AddrParseError) -> Self {
        FanrpcError::InvalidAddress(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FanrpcError>;
