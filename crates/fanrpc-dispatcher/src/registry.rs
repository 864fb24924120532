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

use fanrpc_common::{ExecutorAddr, FanrpcError, Result};
use std::time::Duration;
use tokio::time::Instant;

use crate::executor::{Executor, ExecutorSnapshot};
use crate::selection;
use crate::statistics::DEFAULT_STATS_WINDOW;

/// Known executors, in admission order.
///
/// The registry is not internally synchronized. The dispatcher wraps it in a
/// single `tokio::sync::RwLock` and takes the write lock for anything that
/// mutates an executor, so selection's scan-and-mark is atomic with respect
/// to every other selection.
#[derive(Debug)]
pub struct Registry {
    executors: Vec<Executor>,
    stats_window: usize,
}

impl Registry {
    /// Creates an empty registry whose executors use `stats_window` samples.
    pub fn new(stats_window: usize) -> Self {
        Self {
            executors: Vec::new(),
            stats_window,
        }
    }

    /// Creates a registry from a static executor list. Duplicates are dropped.
    pub fn with_executors(addrs: impl IntoIterator<Item = ExecutorAddr>, stats_window: usize) -> Self {
        let mut registry = Self::new(stats_window);
        for addr in addrs {
            registry.admit(addr);
        }
        registry
    }

    /// Appends an executor unless one with the same address exists.
    ///
    /// Returns `true` if the executor is new.
    pub fn admit(&mut self, addr: ExecutorAddr) -> bool {
        if self.executors.iter().any(|e| e.addr == addr) {
            return false;
        }

        self.executors.push(Executor::new(addr, self.stats_window));
        true
    }

    /// Finds an executor by address.
    ///
    /// # Arguments
    /// * `addr` - Address the executor was admitted under
    ///
    /// # Returns
    /// - `Ok(&Executor)` - The executor's current state
    /// - `Err(FanrpcError::ExecutorNotFound)` - No executor has that address
    pub fn lookup(&self, addr: &ExecutorAddr) -> Result<&Executor> {
        self.executors
            .iter()
            .find(|e| &e.addr == addr)
            .ok_or_else(|| FanrpcError::ExecutorNotFound(addr.to_string()))
    }

    /// Mutable counterpart of [`Registry::lookup`].
    pub fn lookup_mut(&mut self, addr: &ExecutorAddr) -> Result<&mut Executor> {
        self.executors
            .iter_mut()
            .find(|e| &e.addr == addr)
            .ok_or_else(|| FanrpcError::ExecutorNotFound(addr.to_string()))
    }

    /// Blocks an executor so it is never selected again.
    ///
    /// Returns `false` if no such executor exists. Blocking twice is a no-op.
    pub fn block(&mut self, addr: &ExecutorAddr, reason: impl Into<String>) -> bool {
        match self.lookup_mut(addr) {
            Ok(executor) => {
                executor.block(reason);
                true
            }
            Err(_) => false,
        }
    }

    /// Consistent copy of every executor.
    pub fn snapshot(&self, now: Instant) -> Vec<ExecutorSnapshot> {
        self.executors.iter().map(|e| e.snapshot(now)).collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    pub fn addrs(&self) -> Vec<ExecutorAddr> {
        self.executors.iter().map(|e| e.addr.clone()).collect()
    }

    /// Selects the longest-idle eligible executor and marks it used.
    ///
    /// # Arguments
    /// * `now` - Current time, also recorded as the winner's last use
    /// * `cooldown` - Minimum idle time before an executor is reused
    ///
    /// # Returns
    /// - `Some(addr)` - The chosen executor, already marked used
    /// - `None` - Nothing is eligible; see [`Registry::backpressure_wait`]
    ///
    /// # Behavior
    /// - Blocked executors are skipped
    /// - A never-used executor beats any used one
    /// - Ties go to the executor admitted first
    pub fn select(&mut self, now: Instant, cooldown: Duration) -> Option<ExecutorAddr> {
        selection::select_executor(&mut self.executors, now, cooldown)
    }

    /// How long a caller that found nothing eligible should sleep.
    pub fn backpressure_wait(&self, now: Instant, cooldown: Duration) -> Duration {
        selection::backpressure_wait(&self.executors, now, cooldown)
    }

    /// Records a successful call. Returns the new average if a window closed.
    pub fn record_success(&mut self, addr: &ExecutorAddr, latency: Duration) -> Result<Option<f64>> {
        Ok(self.lookup_mut(addr)?.record_latency(latency))
    }

    /// Records a failed call.
    ///
    /// # Returns
    /// - `Ok(n)` - The executor's error count after this failure
    /// - `Err(FanrpcError::ExecutorNotFound)` - Unknown executor
    pub fn record_failure(&mut self, addr: &ExecutorAddr) -> Result<u32> {
        Ok(self.lookup_mut(addr)?.record_error())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_WINDOW)
    }
}
