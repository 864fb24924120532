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

//! Retry and backpressure.
//!
//! Two loops keep a request alive until it has a result:
//!
//! - **No executor eligible**: [`acquire`] sleeps for the backpressure wait
//!   and selects again. Admission of a new executor cuts the sleep short.
//! - **Remote call failed**: the dispatcher counts the error and calls
//!   [`acquire`] again for a fresh executor. [`AttemptBudget`] bounds this
//!   loop when `max_attempts` is configured.
//!
//! Neither loop has a bound of its own; the batch deadline cancels both.

use fanrpc_common::{ExecutorAddr, FanrpcError, Result};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::registry::Registry;

/// Waits until an executor is eligible, selects it and marks it used.
///
/// `admitted` is notified whenever a new executor joins the registry.
pub async fn acquire(
    registry: &RwLock<Registry>,
    admitted: &Notify,
    cooldown: Duration,
    min_wait: Duration,
) -> ExecutorAddr {
    loop {
        // Register for admission wake-ups before looking, so an executor
        // admitted between the scan and the sleep is not missed
        let notified = admitted.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let wait = {
            let mut registry = registry.write().await;
            let now = Instant::now();

            if let Some(addr) = registry.select(now, cooldown) {
                debug!("Selected executor {}", addr);
                return addr;
            }

            registry.backpressure_wait(now, cooldown).max(min_wait)
        };

        debug!("No eligible executor, waiting {}ms", wait.as_millis());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut notified => {
                debug!("Executor admitted, selecting again");
            }
        }
    }
}

/// Counts remote calls made on behalf of one request.
#[derive(Debug, Clone)]
pub struct AttemptBudget {
    max_attempts: Option<u32>,
    used: u32,
}

impl AttemptBudget {
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            used: 0,
        }
    }

    /// Claims the next attempt, or fails once the budget is spent.
    pub fn next_attempt(&mut self, request_id: &str) -> Result<u32> {
        if let Some(max) = self.max_attempts {
            if self.used >= max {
                return Err(FanrpcError::RetriesExhausted {
                    request_id: request_id.to_string(),
                    attempts: self.used,
                });
            }
        }

        self.used = self.used.saturating_add(1);
        Ok(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}
