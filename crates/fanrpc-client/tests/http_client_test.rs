//! HTTP Client Integration Tests
//!
//! These tests verify the dispatcher client's ability to:
//! - Submit a batch and read back the populated batch
//! - Register an executor and map rejections to typed errors
//! - Read the status report
//!
//! The dispatcher is replaced by a small hyper server bound to
//! `127.0.0.1:0`, so every test gets its own port.

use fanrpc_client::DispatcherClient;
use fanrpc_common::{ExecutorAddr, FanrpcError, Request as RpcRequest, RequestBatch, Response as RpcResponse};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;

/// Test dispatcher server that runs on a separate task
struct TestDispatcherServer {
    addr: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestDispatcherServer {
    /// Starts a new test server on a random port
    async fn new() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let io = TokioIo::new(stream);
                            tokio::spawn(async move {
                                let _ = http1::Builder::new()
                                    .serve_connection(io, service_fn(Self::route))
                                    .await;
                            });
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    async fn route(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let authorization = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = req.into_body().collect().await?.to_bytes();

        let response = match (method, path.as_str()) {
            (Method::POST, "/requests") => {
                let mut batch: RequestBatch = serde_json::from_slice(&body).unwrap();
                for request in batch.requests.iter_mut() {
                    let result = json!({ "echo": request.method });
                    request.response = Some(RpcResponse::new(request.id.clone(), result));
                }
                reply(StatusCode::OK, serde_json::to_vec(&batch).unwrap())
            }
            (Method::POST, "/register-executor") => {
                if authorization.as_deref() != Some("Bearer good-token") {
                    reply(StatusCode::UNAUTHORIZED, "Authorization error")
                } else {
                    let executor: ExecutorAddr = serde_json::from_slice(&body).unwrap();
                    if executor.port == 1 {
                        reply(StatusCode::BAD_REQUEST, "Health check error: FAIL")
                    } else {
                        reply(StatusCode::OK, "OK")
                    }
                }
            }
            (Method::GET, "/") => reply(
                StatusCode::OK,
                serde_json::to_vec(&json!({
                    "processed_requests_count": 7,
                    "executor_list": []
                }))
                .unwrap(),
            ),
            _ => reply(StatusCode::NOT_FOUND, "not found"),
        };

        Ok(response)
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestDispatcherServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn reply(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(body.into()))
        .unwrap()
}

// ============================================================================
// Submit Tests
// ============================================================================

#[tokio::test]
async fn test_submit_batch() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.base_url()).unwrap();

    let batch = RequestBatch::new(vec![
        RpcRequest::new("1", "resize").with_parameter("w", "64"),
        RpcRequest::new("2", "crop"),
    ]);
    let out = client.submit(&batch).await.unwrap();

    assert!(out.is_complete());
    assert_eq!(out.requests[0].parameters.get("w").map(String::as_str), Some("64"));
    assert_eq!(out.requests[1].response.as_ref().unwrap().result["echo"], "crop");
}

#[tokio::test]
async fn test_submit_without_scheme() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.addr.clone()).unwrap();

    let out = client.submit(&RequestBatch::default()).await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_concurrent_submits() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.base_url()).unwrap();
    let client2 = client.clone();

    let a = RequestBatch::new(vec![RpcRequest::new("a", "left")]);
    let b = RequestBatch::new(vec![RpcRequest::new("b", "right")]);
    let (ra, rb) = tokio::join!(client.submit(&a), client2.submit(&b));

    assert_eq!(ra.unwrap().requests[0].response.as_ref().unwrap().result["echo"], "left");
    assert_eq!(rb.unwrap().requests[0].response.as_ref().unwrap().result["echo"], "right");
}

#[tokio::test]
async fn test_unreachable_dispatcher() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = DispatcherClient::new(addr).unwrap();
    let err = client.submit(&RequestBatch::default()).await.unwrap_err();
    assert!(matches!(err, FanrpcError::Transport(_)));
}

// ============================================================================
// Register Tests
// ============================================================================

#[tokio::test]
async fn test_register_ok() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.base_url()).unwrap();

    client
        .register("good-token", &ExecutorAddr::new("127.0.0.1", 7001))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_bad_token() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.base_url()).unwrap();

    let err = client
        .register("bad-token", &ExecutorAddr::new("127.0.0.1", 7001))
        .await
        .unwrap_err();
    assert!(matches!(err, FanrpcError::Unauthorized));
}

#[tokio::test]
async fn test_register_failed_probe() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.base_url()).unwrap();

    let err = client
        .register("good-token", &ExecutorAddr::new("127.0.0.1", 1))
        .await
        .unwrap_err();
    match err {
        FanrpcError::HealthCheckFailed(reason) => assert!(reason.contains("FAIL")),
        other => panic!("expected HealthCheckFailed, got {:?}", other),
    }
}

// ============================================================================
// Status Tests
// ============================================================================

#[tokio::test]
async fn test_status() {
    let server = TestDispatcherServer::new().await;
    let client = DispatcherClient::new(server.base_url()).unwrap();

    let status = client.status().await.unwrap();
    assert_eq!(status["processed_requests_count"], 7);
    assert!(status["executor_list"].as_array().unwrap().is_empty());
}
