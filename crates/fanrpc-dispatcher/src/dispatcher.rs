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

use fanrpc_common::{ExecutorAddr, FanrpcError, Request, RequestBatch, Response, Result, RpcResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DispatcherConfig, DuplicateIdPolicy};
use crate::executor::ExecutorSnapshot;
use crate::registry::Registry;
use crate::report::{StatusReport, VERSION};
use crate::retry::{self, AttemptBudget};
use crate::transport::ExecutorTransport;

/// fanrpc Dispatcher - fans a batch out to executors and collects the results.
///
/// Every request of a batch runs as its own tokio task. Each task acquires an
/// executor through the selection policy (waiting out backpressure when
/// nothing is eligible), sends the request, and retries on a fresh executor
/// if the call fails. The batch is returned once every task has a result,
/// with each result written back to the slot carrying its request id.
///
/// # Failure handling
///
/// With the default configuration a request never fails: remote errors are
/// counted against the executor and the request is retried indefinitely.
/// `RetryConfig` can bound this with a per-call timeout, a maximum number of
/// attempts per request, and a deadline for the whole batch.
///
/// # Sharing
///
/// `Dispatcher` is a cheap handle around shared state; clone it freely into
/// HTTP handlers.
pub struct Dispatcher<T: ExecutorTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: ExecutorTransport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    registry: RwLock<Registry>,
    transport: T,
    config: DispatcherConfig,
    /// Wakes requests sleeping in the backpressure loop
    admitted: Notify,
    processed: AtomicU64,
    failed: AtomicU64,
    started_at: Instant,
}

impl<T: ExecutorTransport> Dispatcher<T> {
    /// Creates a dispatcher with an initial executor list.
    ///
    /// Initial executors are trusted as configured and are not probed.
    ///
    /// # Example
    /// ```no_run
    /// # use fanrpc_dispatcher::{Dispatcher, DispatcherConfig, HttpExecutorTransport};
    /// # use fanrpc_common::ExecutorAddr;
    /// let dispatcher = Dispatcher::new(
    ///     HttpExecutorTransport::new(),
    ///     DispatcherConfig::default(),
    ///     vec![ExecutorAddr::new("127.0.0.1", 9001)],
    /// );
    /// ```
    pub fn new(
        transport: T,
        config: DispatcherConfig,
        executors: impl IntoIterator<Item = ExecutorAddr>,
    ) -> Self {
        let registry = Registry::with_executors(executors, config.stats_window);
        info!(
            "Dispatcher initialized with {} executor(s), cooldown {}ms",
            registry.len(),
            config.selection.cooldown.as_millis()
        );

        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(registry),
                transport,
                config,
                admitted: Notify::new(),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    /// Executes every request of a batch and returns it with all responses set.
    ///
    /// # Errors
    /// Only configured bounds surface errors:
    /// - `DuplicateRequestId` when ids repeat and `DuplicateIdPolicy::Reject`
    /// - `RetriesExhausted` when a request runs out of attempts
    /// - `DeadlineExceeded` when the batch deadline elapses
    ///
    /// On any error the remaining in-flight requests are cancelled.
    pub async fn dispatch(&self, mut batch: RequestBatch) -> Result<RequestBatch> {
        if batch.is_empty() {
            return Ok(batch);
        }

        if let Some(id) = batch.duplicate_id() {
            match self.inner.config.duplicate_ids {
                DuplicateIdPolicy::Reject => {
                    return Err(FanrpcError::DuplicateRequestId(id.to_string()));
                }
                DuplicateIdPolicy::LastWriteWins => {
                    debug!("Batch repeats request id {}, last result wins", id);
                }
            }
        }

        debug!("Dispatching batch of {} request(s)", batch.len());

        // Dropping the set aborts whatever is still running
        let mut tasks = JoinSet::new();
        for request in batch.requests.iter().cloned() {
            let dispatcher = self.clone();
            tasks.spawn(async move {
                let result = dispatcher.execute(&request).await;
                (request.id, result)
            });
        }

        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                let (id, result) = joined.map_err(|e| FanrpcError::TaskFailed(e.to_string()))?;
                let result = result?;

                for slot in batch.requests.iter_mut().filter(|r| r.id == id) {
                    slot.response = Some(Response::new(id.clone(), result.clone()));
                }
            }
            Ok::<_, FanrpcError>(())
        };

        match self.inner.config.retry.batch_deadline {
            Some(deadline) => tokio::time::timeout(deadline, collect).await.map_err(|_| {
                warn!("Batch deadline of {}ms exceeded", deadline.as_millis());
                FanrpcError::DeadlineExceeded(deadline.as_millis() as u64)
            })??,
            None => collect.await?,
        }

        Ok(batch)
    }

    /// Runs one request until it succeeds or a configured bound is hit.
    ///
    /// # Behavior
    ///
    /// Retryable failures (see [`FanrpcError::is_retryable`]) are counted
    /// against the executor and the request moves on to a fresh one. Any
    /// other error ends the request at once and is not counted against the
    /// executor.
    ///
    /// # Errors
    /// - `RetriesExhausted` once `max_attempts` calls have failed
    /// - a non-retryable error returned by the transport
    pub async fn execute(&self, request: &Request) -> Result<RpcResult> {
        let inner = &self.inner;
        let config = &inner.config;
        let mut budget = AttemptBudget::new(config.retry.max_attempts);

        loop {
            let attempt = budget.next_attempt(&request.id)?;
            let addr = retry::acquire(
                &inner.registry,
                &inner.admitted,
                config.selection.cooldown,
                config.retry.min_wait,
            )
            .await;

            let started = Instant::now();
            let outcome = match config.retry.call_timeout {
                Some(limit) => tokio::time::timeout(limit, inner.transport.call(&addr, request))
                    .await
                    .unwrap_or_else(|_| Err(FanrpcError::Timeout(limit.as_millis() as u64))),
                None => inner.transport.call(&addr, request).await,
            };

            let failure = match outcome {
                Ok(result) => match self.record_success(&addr, started.elapsed()).await {
                    Ok(()) => return Ok(result),
                    Err(e) => e,
                },
                Err(e) => e,
            };

            // Not the executor's fault, so another executor would fail too
            if !failure.is_retryable() {
                warn!("Request {} failed on {}: {}", request.id, addr, failure);
                return Err(failure);
            }

            warn!(
                "Request {} failed on {} (attempt {}): {}",
                request.id, addr, attempt, failure
            );
            self.record_failure(&addr).await;
        }
    }

    async fn record_success(&self, addr: &ExecutorAddr, latency: std::time::Duration) -> Result<()> {
        let average = self.inner.registry.write().await.record_success(addr, latency)?;
        self.inner.processed.fetch_add(1, Ordering::Relaxed);

        if let Some(average) = average {
            debug!("Executor {} average response time {:.3}s", addr, average);
        }

        Ok(())
    }

    async fn record_failure(&self, addr: &ExecutorAddr) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);

        let policy = &self.inner.config.block;
        let mut registry = self.inner.registry.write().await;
        let errors = match registry.record_failure(addr) {
            Ok(errors) => errors,
            Err(e) => {
                warn!("Could not record failure: {}", e);
                return;
            }
        };

        if errors < policy.error_threshold {
            return;
        }

        if policy.auto_block {
            if registry.lookup(addr).map(|e| !e.blocked).unwrap_or(false) {
                registry.block(addr, format!("{} errors", errors));
                warn!("Blocked executor {} after {} errors", addr, errors);
            }
        } else if errors == policy.error_threshold {
            warn!(
                "Executor {} reached {} errors; keeping it in rotation",
                addr, errors
            );
        }
    }

    /// Adds an executor to the pool without probing it.
    ///
    /// # Arguments
    /// * `addr` - Executor address
    ///
    /// # Returns
    /// - `true` - The executor is new
    /// - `false` - It was already known; nothing changes
    ///
    /// # Behavior
    /// Requests waiting for an eligible executor are woken up when the
    /// executor is new.
    pub async fn admit(&self, addr: ExecutorAddr) -> bool {
        let added = self.inner.registry.write().await.admit(addr.clone());

        if added {
            info!("Admitted executor {}", addr);
            self.inner.admitted.notify_waiters();
        } else {
            debug!("Executor {} already registered", addr);
        }

        added
    }

    /// Blocks an executor so it is never selected again.
    ///
    /// Returns `false` if the executor is unknown.
    pub async fn block_executor(&self, addr: &ExecutorAddr, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let blocked = self.inner.registry.write().await.block(addr, reason.clone());
        if blocked {
            info!("Blocked executor {}: {}", addr, reason);
        }
        blocked
    }

    /// Copies every executor's state under one read lock.
    ///
    /// # Returns
    /// Snapshots in admission order, so index 0 is the first executor
    pub async fn snapshot(&self) -> Vec<ExecutorSnapshot> {
        self.inner.registry.read().await.snapshot(Instant::now())
    }

    /// Builds the report served on the status endpoint.
    ///
    /// # Returns
    /// Counters, uptime, crate version and an executor snapshot
    pub async fn status(&self) -> StatusReport {
        StatusReport {
            processed_requests_count: self.processed_count(),
            failed_attempts_count: self.failed_count(),
            uptime_ms: self.inner.started_at.elapsed().as_millis() as u64,
            version: VERSION.to_string(),
            executor_list: self.snapshot().await,
        }
    }

    /// Successful remote calls since startup.
    pub fn processed_count(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    /// Failed remote calls since startup.
    pub fn failed_count(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}
