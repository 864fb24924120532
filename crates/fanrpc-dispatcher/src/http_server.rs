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

//! HTTP Server for the Dispatcher
//!
//! This module exposes the dispatcher over HTTP using axum.
//!
//! # Routes
//!
//! - `POST /requests`: execute a `{"requests": [...]}` batch
//! - `POST /register-executor`: admit an executor (token + health probe)
//! - `GET /` and `POST /`: status report
//! - `GET /__health`: liveness of the dispatcher itself

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
};
use fanrpc_common::auth::AdmissionToken;
use fanrpc_common::{ExecutorAddr, FanrpcError, RequestBatch, Result};
use hyper::body::Bytes;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admission::Admission;
use crate::dispatcher::Dispatcher;
use crate::report::StatusReport;
use crate::transport::ExecutorTransport;

/// HTTP front end of a [`Dispatcher`].
pub struct HttpServer<T: ExecutorTransport> {
    admission: Admission<T>,
}

impl<T: ExecutorTransport> HttpServer<T> {
    /// Creates a new HTTP server.
    ///
    /// # Arguments
    /// * `dispatcher` - Dispatcher handling batches and admissions
    /// * `token` - Token executors must present on `/register-executor`
    pub fn new(dispatcher: Dispatcher<T>, token: AdmissionToken) -> Self {
        Self {
            admission: Admission::new(dispatcher, token),
        }
    }

    /// Builds the axum router.
    ///
    /// # Routes
    /// - `POST /requests` - dispatch a batch
    /// - `POST /register-executor` - admit an executor
    /// - `GET /`, `POST /` - status report
    /// - `GET /__health` - always `OK`
    pub fn router(&self) -> axum::Router {
        axum::Router::new()
            .route("/requests", post(handle_batch::<T>))
            .route("/register-executor", post(handle_register::<T>))
            .route("/", get(handle_status::<T>).post(handle_status::<T>))
            .route("/__health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.admission.clone())
    }

    /// Runs the HTTP server.
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "0.0.0.0:8000")
    ///
    /// # Returns
    /// - `Ok(())` - Server ran successfully
    /// - `Err(FanrpcError::Transport)` - Bind failed or the server stopped with an error
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FanrpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;

        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    ///
    /// # Arguments
    /// * `listener` - Bound TCP listener, e.g. on `127.0.0.1:0` in tests
    ///
    /// # Behavior
    /// - Logs the listening address
    /// - Runs indefinitely until the listener fails
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| FanrpcError::Transport(format!("Failed to get local addr: {}", e)))?;
        info!("Dispatcher HTTP server listening on {}", local_addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| FanrpcError::Transport(format!("Server error: {}", e)))
    }
}

/// Error wrapper that renders as an HTTP status plus a readable reason.
#[derive(Debug)]
pub struct ApiError(pub FanrpcError);

impl From<FanrpcError> for ApiError {
    fn from(err: FanrpcError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (error_status(&self.0), self.0.to_string()).into_response()
    }
}

/// Maps an error to the status code returned to HTTP callers.
pub fn error_status(err: &FanrpcError) -> StatusCode {
    match err {
        FanrpcError::Unauthorized => StatusCode::UNAUTHORIZED,
        FanrpcError::HealthCheckFailed(_)
        | FanrpcError::InvalidAddress(_)
        | FanrpcError::InvalidRequest(_)
        | FanrpcError::JsonSerialization(_)
        | FanrpcError::DuplicateRequestId(_) => StatusCode::BAD_REQUEST,
        FanrpcError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
        FanrpcError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn handle_batch<T: ExecutorTransport>(
    State(admission): State<Admission<T>>,
    body: Bytes,
) -> std::result::Result<Json<RequestBatch>, ApiError> {
    let batch: RequestBatch = serde_json::from_slice(&body)
        .map_err(|e| FanrpcError::InvalidRequest(format!("Invalid batch: {}", e)))?;

    let batch = admission.dispatcher().dispatch(batch).await?;
    Ok(Json(batch))
}

async fn handle_register<T: ExecutorTransport>(
    State(admission): State<Admission<T>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<&'static str, ApiError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    // Token first, so an unauthorized caller learns nothing about the body
    admission.authorize(header)?;

    let addr: ExecutorAddr = serde_json::from_slice(&body)
        .map_err(|e| FanrpcError::InvalidAddress(format!("Invalid executor: {}", e)))?;

    admission.admit(header, addr).await?;
    Ok("OK")
}

async fn handle_status<T: ExecutorTransport>(
    State(admission): State<Admission<T>>,
) -> Json<StatusReport> {
    Json(admission.dispatcher().status().await)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
