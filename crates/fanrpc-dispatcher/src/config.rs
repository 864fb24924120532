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

//! Dispatcher configuration.
//!
//! Every default reproduces the unbounded behaviour: infinite retries, no
//! per-call timeout, no batch deadline, no automatic blocking.

use std::time::Duration;

use crate::statistics::DEFAULT_STATS_WINDOW;

/// Executor selection parameters.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Minimum idle time before an executor can be selected again.
    ///
    /// Default: 1s
    pub cooldown: Duration,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(1),
        }
    }
}

/// Configuration for the retry and backpressure loops.
///
/// A request that fails on one executor is retried on a freshly selected
/// executor. When nothing is eligible the request sleeps for the
/// backpressure wait and tries again.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of remote calls per request
    ///
    /// `None` retries forever.
    /// Default: None
    pub max_attempts: Option<u32>,
    /// Timeout for a single remote call
    ///
    /// A timed-out call counts as a failed call.
    /// Default: None
    pub call_timeout: Option<Duration>,
    /// Upper bound on the whole batch
    ///
    /// When it elapses every in-flight request of the batch is cancelled.
    /// Default: None
    pub batch_deadline: Option<Duration>,
    /// Lower bound on a single backpressure sleep
    ///
    /// Default: 1ms
    pub min_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            call_timeout: None,
            batch_deadline: None,
            min_wait: Duration::from_millis(1),
        }
    }
}

/// What happens when an executor keeps failing.
#[derive(Debug, Clone)]
pub struct BlockPolicy {
    /// Error count at which an executor is considered broken
    ///
    /// Default: 100
    pub error_threshold: u32,
    /// Block the executor once the threshold is reached
    ///
    /// When off, reaching the threshold is only logged.
    /// Default: false
    pub auto_block: bool,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            error_threshold: 100,
            auto_block: false,
        }
    }
}

/// How a batch with repeated request ids is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateIdPolicy {
    /// Every request is dispatched; each result is written to every batch
    /// slot carrying its id, so the result that completes last wins.
    #[default]
    LastWriteWins,
    /// The batch is rejected before anything is dispatched.
    Reject,
}

/// Complete dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub selection: SelectionConfig,
    pub retry: RetryConfig,
    pub block: BlockPolicy,
    pub duplicate_ids: DuplicateIdPolicy,
    /// Samples per statistics window. Default: 10
    pub stats_window: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            selection: SelectionConfig::default(),
            retry: RetryConfig::default(),
            block: BlockPolicy::default(),
            duplicate_ids: DuplicateIdPolicy::default(),
            stats_window: DEFAULT_STATS_WINDOW,
        }
    }
}
