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

use fanrpc_common::ExecutorAddr;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use crate::statistics::{LatencyWindow, StatisticsSample};

/// One remote worker and its mutable health/usage state.
#[derive(Debug, Clone)]
pub struct Executor {
    pub addr: ExecutorAddr,
    /// When the executor was last handed out; `None` means never used
    pub last_usage: Option<Instant>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    /// Failed remote calls. Only ever grows.
    pub errors_count: u32,
    pub statistics: LatencyWindow,
}

impl Executor {
    pub fn new(addr: ExecutorAddr, stats_window: usize) -> Self {
        Self {
            addr,
            last_usage: None,
            blocked: false,
            block_reason: None,
            errors_count: 0,
            statistics: LatencyWindow::new(stats_window),
        }
    }

    /// Not blocked, and either never used or idle for longer than `cooldown`.
    pub fn is_eligible(&self, now: Instant, cooldown: Duration) -> bool {
        if self.blocked {
            return false;
        }

        match self.last_usage {
            None => true,
            Some(at) => now.saturating_duration_since(at) > cooldown,
        }
    }

    /// Time since last use; `None` for an executor that was never used.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.last_usage.map(|at| now.saturating_duration_since(at))
    }

    /// Time left until the cooldown expires, zero if it already has.
    pub fn cooldown_remaining(&self, now: Instant, cooldown: Duration) -> Duration {
        match self.idle_for(now) {
            Some(idle) => cooldown.saturating_sub(idle),
            None => Duration::ZERO,
        }
    }

    pub fn mark_used(&mut self, now: Instant) {
        self.last_usage = Some(now);
    }

    /// Blocks the executor. Blocking again keeps the first reason.
    pub fn block(&mut self, reason: impl Into<String>) {
        if !self.blocked {
            self.blocked = true;
            self.block_reason = Some(reason.into());
        }
    }

    /// Returns the new error count.
    pub fn record_error(&mut self) -> u32 {
        self.errors_count = self.errors_count.saturating_add(1);
        self.errors_count
    }

    /// Returns the new average when this sample completed a window.
    pub fn record_latency(&mut self, latency: Duration) -> Option<f64> {
        self.statistics.record(latency.as_secs_f64())
    }

    pub fn average_response_time(&self) -> f64 {
        self.statistics.average()
    }

    pub fn snapshot(&self, now: Instant) -> ExecutorSnapshot {
        ExecutorSnapshot {
            host: self.addr.host.clone(),
            port: self.addr.port,
            last_usage: self.idle_for(now).and_then(|idle| {
                let at = SystemTime::now().checked_sub(idle)?;
                at.duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis() as u64)
            }),
            idle_ms: self.idle_for(now).map(|d| d.as_millis() as u64),
            blocked: self.blocked,
            block_reason: self.block_reason.clone(),
            errors_count: self.errors_count,
            statistics: self.statistics.samples().to_vec(),
            average_response_time: self.statistics.average(),
        }
    }
}

/// Point-in-time copy of an executor, as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorSnapshot {
    pub host: String,
    pub port: u16,
    /// Unix time of the last use in milliseconds, `null` if never used
    pub last_usage: Option<u64>,
    /// Milliseconds since last use, `null` if never used
    pub idle_ms: Option<u64>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub errors_count: u32,
    pub statistics: Vec<StatisticsSample>,
    pub average_response_time: f64,
}
