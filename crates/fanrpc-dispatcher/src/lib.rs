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

//! fanrpc Dispatcher
//!
//! Fans batches of requests out to a pool of remote executors.
//!
//! - [`statistics`]: bounded latency window per executor
//! - [`executor`] / [`registry`]: executor state and the pool that owns it
//! - [`selection`]: longest-idle selection with a per-executor cooldown
//! - [`retry`]: backpressure wait and attempt budget
//! - [`dispatcher`]: fan-out/fan-in over tokio tasks
//! - [`admission`]: token check and health probe for joining executors
//! - [`http_server`]: the axum front end

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod http_server;
pub mod registry;
pub mod report;
pub mod retry;
pub mod selection;
pub mod statistics;
pub mod transport;

pub use admission::{Admission, AdmissionOutcome};
pub use config::{BlockPolicy, DispatcherConfig, DuplicateIdPolicy, RetryConfig, SelectionConfig};
pub use dispatcher::Dispatcher;
pub use executor::{Executor, ExecutorSnapshot};
pub use http_server::HttpServer;
pub use registry::Registry;
pub use report::StatusReport;
pub use statistics::{LatencyWindow, StatisticsSample};
pub use transport::{ExecutorTransport, HttpExecutorTransport};
