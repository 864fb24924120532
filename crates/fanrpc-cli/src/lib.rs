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

//! # fanrpc CLI
//!
//! Command-line interface for the fanrpc batch dispatcher.
//!
//! ## Key Commands
//!
//! - `fanrpc serve`: run a dispatcher
//! - `fanrpc submit`: send a batch file and print the answered batch
//! - `fanrpc register`: ask a dispatcher to admit an executor
//! - `fanrpc status`: print a dispatcher's status report
//!
//! This library half holds the helpers the binary uses for reading its
//! inputs, so they can be tested without spawning a process.

use anyhow::{Context, Result};
use fanrpc_common::{ExecutorAddr, RequestBatch};
use std::io::Read;

/// Environment variable holding the initial executor list.
pub const EXECUTORS_ENV: &str = "EXECUTORS";

/// Environment variable holding the admission token.
pub const TOKEN_ENV: &str = "FANRPC_TOKEN";

/// Parses a comma-separated `host:port` list. Empty entries are skipped.
pub fn parse_executor_list(list: &str) -> Result<Vec<ExecutorAddr>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<ExecutorAddr>()
                .with_context(|| format!("Invalid executor address '{}'", entry))
        })
        .collect()
}

/// Resolves the initial executors.
///
/// `--executor` flags win; the environment list is only consulted when no
/// flag was given.
pub fn resolve_executors(flags: &[String], env: Option<&str>) -> Result<Vec<ExecutorAddr>> {
    if !flags.is_empty() {
        let mut executors = Vec::with_capacity(flags.len());
        for flag in flags {
            executors.extend(parse_executor_list(flag)?);
        }
        return Ok(executors);
    }

    match env {
        Some(list) => parse_executor_list(list),
        None => Ok(Vec::new()),
    }
}

/// Reads a batch from a file, or from stdin when `path` is `-`.
///
/// Accepts either the `{"requests": [...]}` envelope or a bare array.
pub fn read_batch(path: &str) -> Result<RequestBatch> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read batch from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read batch file {}", path))?
    };

    parse_batch(&raw)
}

pub fn parse_batch(raw: &str) -> Result<RequestBatch> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Batch is not valid JSON")?;

    if value.is_array() {
        let requests = serde_json::from_value(value).context("Invalid request list")?;
        return Ok(RequestBatch::new(requests));
    }

    serde_json::from_value(value).context("Invalid batch")
}
