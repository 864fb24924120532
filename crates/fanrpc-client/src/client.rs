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

use fanrpc_common::{ExecutorAddr, FanrpcError, RequestBatch, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tracing::debug;

/// Client for a fanrpc dispatcher.
///
/// Uses a pooled hyper client, so clones share connections and concurrent
/// calls do not serialize.
#[derive(Clone)]
pub struct DispatcherClient {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl DispatcherClient {
    /// Creates a client for the dispatcher at `addr`.
    ///
    /// Accepts `host:port` or `http://host:port`.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr.trim_end_matches('/'))
        };

        base_url
            .parse::<Uri>()
            .map_err(|e| FanrpcError::InvalidAddress(format!("'{}': {}", addr, e)))?;

        Ok(Self {
            base_url,
            client: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits a batch and waits until every request has a response.
    pub async fn submit(&self, batch: &RequestBatch) -> Result<RequestBatch> {
        let body = serde_json::to_vec(batch)?;
        let (status, bytes) = self.send(Method::POST, "/requests", None, body).await?;

        if !status.is_success() {
            return Err(self.remote_error(status, &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Asks the dispatcher to admit an executor.
    pub async fn register(&self, token: &str, executor: &ExecutorAddr) -> Result<()> {
        let body = serde_json::to_vec(executor)?;
        let authorization = format!("Bearer {}", token);
        let (status, bytes) = self
            .send(Method::POST, "/register-executor", Some(&authorization), body)
            .await?;

        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(FanrpcError::Unauthorized),
            StatusCode::BAD_REQUEST => Err(FanrpcError::HealthCheckFailed(
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
            _ => Err(self.remote_error(status, &bytes)),
        }
    }

    /// Fetches the dispatcher's status report.
    pub async fn status(&self) -> Result<Value> {
        let (status, bytes) = self.send(Method::GET, "/", None, Vec::new()).await?;

        if !status.is_success() {
            return Err(self.remote_error(status, &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        authorization: Option<&str>,
        body: Vec<u8>,
    ) -> Result<(StatusCode, Bytes)> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(&url)
            .header("Content-Type", "application/json");
        if let Some(authorization) = authorization {
            builder = builder.header("Authorization", authorization);
        }

        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| FanrpcError::Transport(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| FanrpcError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FanrpcError::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        Ok((status, bytes))
    }

    fn remote_error(&self, status: StatusCode, body: &[u8]) -> FanrpcError {
        FanrpcError::RemoteCallFailed {
            addr: self.base_url.clone(),
            reason: format!("HTTP {}: {}", status, String::from_utf8_lossy(body)),
        }
    }
}
