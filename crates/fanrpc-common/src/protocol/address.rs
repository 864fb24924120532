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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::FanrpcError;

/// Network identity of an executor. Immutable once admitted.
///
/// IPv6 hosts are stored without brackets and bracketed again whenever the
/// address is rendered, so `base_url` is always a valid URI authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutorAddr {
    pub host: String,
    pub port: u16,
}

impl ExecutorAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `http://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for ExecutorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ExecutorAddr {
    type Err = FanrpcError;

    /// Parses `host:port`, tolerating an `http://` prefix and a trailing slash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix("http://").unwrap_or(trimmed);
        let trimmed = trimmed.trim_end_matches('/');

        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| FanrpcError::InvalidAddress(format!("'{}' has no port", s)))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(FanrpcError::InvalidAddress(format!("'{}' has no host", s)));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| FanrpcError::InvalidAddress(format!("'{}': {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}

impl From<std::net::SocketAddr> for ExecutorAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}
