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

use serde::Serialize;

use crate::executor::ExecutorSnapshot;

/// Dispatcher version, reported on the status endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Body of the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Successful remote calls since startup
    pub processed_requests_count: u64,
    /// Failed remote calls since startup
    pub failed_attempts_count: u64,
    pub uptime_ms: u64,
    pub version: String,
    pub executor_list: Vec<ExecutorSnapshot>,
}
