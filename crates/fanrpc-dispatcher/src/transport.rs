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

//! Executor Transport
//!
//! How the dispatcher talks to executors. The dispatcher only depends on the
//! [`ExecutorTransport`] trait; [`HttpExecutorTransport`] is the production
//! implementation.
//!
//! # Executor protocol
//!
//! - `POST http://{host}:{port}/request` with one serialized `Request` as the
//!   JSON body. Any JSON body in a 2xx reply is the result.
//! - `GET http://{host}:{port}/_health` must answer 2xx with the body `OK`.

use fanrpc_common::{ExecutorAddr, FanrpcError, Request, Result, RpcResult};
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default timeout for the admission health probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound calls to executors.
pub trait ExecutorTransport: Send + Sync + 'static {
    /// Sends one request to an executor and returns its result.
    ///
    /// # Returns
    /// - `Ok(result)` - The executor's JSON result
    /// - `Err(e)` - A failed attempt. Retryable errors (transport failure,
    ///   non-2xx status, a body that is not JSON) send the request to another
    ///   executor; anything else ends it.
    fn call(
        &self,
        addr: &ExecutorAddr,
        request: &Request,
    ) -> impl Future<Output = Result<RpcResult>> + Send;

    /// Checks that an executor answers its health endpoint with `OK`.
    fn probe_health(&self, addr: &ExecutorAddr) -> impl Future<Output = Result<()>> + Send;
}

/// JSON over HTTP/1.1 using a pooled hyper client.
#[derive(Clone)]
pub struct HttpExecutorTransport {
    call_client: Client<HttpConnector, Full<Bytes>>,
    probe_client: Client<HttpConnector, Empty<Bytes>>,
    probe_timeout: Duration,
}

impl HttpExecutorTransport {
    pub fn new() -> Self {
        Self::with_probe_timeout(DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(probe_timeout: Duration) -> Self {
        Self {
            call_client: Client::builder(TokioExecutor::new()).build_http(),
            probe_client: Client::builder(TokioExecutor::new()).build_http(),
            probe_timeout,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}

impl Default for HttpExecutorTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorTransport for HttpExecutorTransport {
    async fn call(&self, addr: &ExecutorAddr, request: &Request) -> Result<RpcResult> {
        let url = format!("{}/request", addr.base_url());
        let body = serde_json::to_vec(request)?;

        let http_request = hyper::Request::builder()
            .method("POST")
            .uri(&url)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| FanrpcError::Transport(format!("Failed to build request: {}", e)))?;

        let response = self
            .call_client
            .request(http_request)
            .await
            .map_err(|e| FanrpcError::Transport(format!("HTTP request to {} failed: {}", addr, e)))?;

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FanrpcError::Transport(format!("Failed to read response from {}: {}", addr, e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(FanrpcError::RemoteCallFailed {
                addr: addr.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        debug!("Executor {} answered request {} ({} bytes)", addr, request.id, body_bytes.len());

        serde_json::from_slice(&body_bytes).map_err(|e| FanrpcError::RemoteCallFailed {
            addr: addr.to_string(),
            reason: format!("malformed result: {}", e),
        })
    }

    async fn probe_health(&self, addr: &ExecutorAddr) -> Result<()> {
        let url = format!("{}/_health", addr.base_url());

        let http_request = hyper::Request::builder()
            .method("GET")
            .uri(&url)
            .body(Empty::new())
            .map_err(|e| FanrpcError::HealthCheckFailed(format!("Failed to build probe: {}", e)))?;

        let probe = async {
            let response = self
                .probe_client
                .request(http_request)
                .await
                .map_err(|e| FanrpcError::HealthCheckFailed(format!("{} unreachable: {}", addr, e)))?;

            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| FanrpcError::HealthCheckFailed(format!("{}: {}", addr, e)))?
                .to_bytes();

            if !status.is_success() {
                return Err(FanrpcError::HealthCheckFailed(format!(
                    "{} answered HTTP {}",
                    addr, status
                )));
            }

            if body.as_ref() != b"OK" {
                return Err(FanrpcError::HealthCheckFailed(format!(
                    "{} answered {:?}",
                    addr,
                    String::from_utf8_lossy(&body)
                )));
            }

            Ok(())
        };

        tokio::time::timeout(self.probe_timeout, probe)
            .await
            .map_err(|_| {
                FanrpcError::HealthCheckFailed(format!(
                    "{} did not answer within {}ms",
                    addr,
                    self.probe_timeout.as_millis()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
    use tokio::net::TcpListener;

    async fn spawn_executor(app: Router) -> ExecutorAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ExecutorAddr::from(addr)
    }

    #[test]
    fn test_ipv6_executor_url_is_valid_uri() {
        let socket: std::net::SocketAddr = "[::1]:9000".parse().unwrap();
        let addr = ExecutorAddr::from(socket);

        let uri: hyper::Uri = format!("{}/request", addr.base_url()).parse().unwrap();
        assert_eq!(uri.authority().map(|a| a.as_str()), Some("[::1]:9000"));
        assert_eq!(uri.port_u16(), Some(9000));
    }

    #[tokio::test]
    async fn test_call_returns_json_body() {
        let app = Router::new().route(
            "/request",
            post(|Json(req): Json<Request>| async move {
                Json(serde_json::json!({ "echo": req.id, "method": req.method }))
            }),
        );
        let addr = spawn_executor(app).await;

        let transport = HttpExecutorTransport::new();
        let result = transport.call(&addr, &Request::new("r1", "resize")).await.unwrap();
        assert_eq!(result, serde_json::json!({ "echo": "r1", "method": "resize" }));
    }

    #[tokio::test]
    async fn test_call_non_2xx_is_failure() {
        let app = Router::new().route(
            "/request",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let addr = spawn_executor(app).await;

        let err = HttpExecutorTransport::new()
            .call(&addr, &Request::new("r1", "resize"))
            .await
            .unwrap_err();
        assert!(matches!(err, FanrpcError::RemoteCallFailed { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_call_malformed_body_is_failure() {
        let app = Router::new().route("/request", post(|| async { "not json" }));
        let addr = spawn_executor(app).await;

        let err = HttpExecutorTransport::new()
            .call(&addr, &Request::new("r1", "resize"))
            .await
            .unwrap_err();
        assert!(matches!(err, FanrpcError::RemoteCallFailed { .. }));
    }

    #[tokio::test]
    async fn test_call_unreachable_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = ExecutorAddr::from(listener.local_addr().unwrap());
        drop(listener);

        let err = HttpExecutorTransport::new()
            .call(&addr, &Request::new("r1", "resize"))
            .await
            .unwrap_err();
        assert!(matches!(err, FanrpcError::Transport(_)));
    }

    #[tokio::test]
    async fn test_probe_ok() {
        let app = Router::new().route("/_health", get(|| async { "OK" }));
        let addr = spawn_executor(app).await;
        assert!(HttpExecutorTransport::new().probe_health(&addr).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_wrong_body() {
        let app = Router::new().route("/_health", get(|| async { "FAIL" }));
        let addr = spawn_executor(app).await;

        let err = HttpExecutorTransport::new().probe_health(&addr).await.unwrap_err();
        assert!(matches!(err, FanrpcError::HealthCheckFailed(_)));
    }

    #[tokio::test]
    async fn test_probe_error_status() {
        let app = Router::new().route(
            "/_health",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "OK") }),
        );
        let addr = spawn_executor(app).await;

        let err = HttpExecutorTransport::new().probe_health(&addr).await.unwrap_err();
        assert!(matches!(err, FanrpcError::HealthCheckFailed(_)));
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let app = Router::new().route(
            "/_health",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "OK"
            }),
        );
        let addr = spawn_executor(app).await;

        let transport = HttpExecutorTransport::with_probe_timeout(Duration::from_millis(50));
        let err = transport.probe_health(&addr).await.unwrap_err();
        assert!(matches!(err, FanrpcError::HealthCheckFailed(_)));
    }
}
