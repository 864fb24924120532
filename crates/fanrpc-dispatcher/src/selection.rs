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

//! Executor selection policy.
//!
//! These functions operate on the registry's executor slice and are only
//! ever called with the registry's write lock held, so the eligibility scan
//! and the `last_usage` mark below form one atomic step.

use fanrpc_common::ExecutorAddr;
use std::time::Duration;
use tokio::time::Instant;

use crate::executor::Executor;

/// Picks the longest-idle eligible executor and marks it used at `now`.
///
/// Never-used executors count as infinitely idle; among equals the one
/// admitted first wins. Returns `None` when nothing is eligible.
pub fn select_executor(
    executors: &mut [Executor],
    now: Instant,
    cooldown: Duration,
) -> Option<ExecutorAddr> {
    let mut best: Option<(usize, Option<Duration>)> = None;

    for (index, executor) in executors.iter().enumerate() {
        if !executor.is_eligible(now, cooldown) {
            continue;
        }

        let idle = executor.idle_for(now);
        let replace = match best {
            None => true,
            Some((_, best_idle)) => idles_longer(idle, best_idle),
        };

        if replace {
            best = Some((index, idle));
        }
    }

    let (index, _) = best?;
    let chosen = &mut executors[index];
    chosen.mark_used(now);
    Some(chosen.addr.clone())
}

/// How long to sleep before the next selection attempt can succeed.
///
/// The minimum remaining cooldown over all non-blocked executors, capped at
/// `cooldown`. With no candidates at all (empty pool or everything blocked)
/// the full cooldown is returned, so a newly admitted executor is picked up
/// within one cooldown period.
pub fn backpressure_wait(executors: &[Executor], now: Instant, cooldown: Duration) -> Duration {
    executors
        .iter()
        .filter(|e| !e.blocked)
        .map(|e| e.cooldown_remaining(now, cooldown))
        .min()
        .unwrap_or(cooldown)
        .min(cooldown)
}

fn idles_longer(candidate: Option<Duration>, current: Option<Duration>) -> bool {
    match (candidate, current) {
        (None, Some(_)) => true,
        (Some(c), Some(b)) => c > b,
        _ => false,
    }
}
