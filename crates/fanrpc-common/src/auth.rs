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

//! Admission Token
//!
//! Executors that want to join the pool at runtime must present the
//! dispatcher's admission token in the `Authorization` header. The token is
//! either supplied by the operator or generated once at startup and logged.
//!
//! # Security Model
//!
//! - The token is a shared secret between the dispatcher and its executors
//! - Comparison is constant-time
//! - A missing or wrong token results in HTTP 401 Unauthorized
//! - The token never appears in `Display` or `Debug` output
//!
//! # Example
//!
//! ```
//! use fanrpc_common::auth::{extract_token, AdmissionToken};
//!
//! let token = AdmissionToken::new("s3cret");
//! assert!(token.validate(extract_token(Some("Bearer s3cret")).unwrap()));
//! assert!(token.validate(extract_token(Some("s3cret")).unwrap()));
//! assert!(!token.validate("nope"));
//! ```

use std::fmt;

/// Shared secret required to register an executor.
#[derive(Clone)]
pub struct AdmissionToken {
    token: String,
}

impl AdmissionToken {
    /// Wraps an operator-supplied token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Generates a random 32-character hex token.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The raw token, for logging once at startup.
    pub fn expose(&self) -> &str {
        &self.token
    }

    /// Checks a provided token using constant-time comparison.
    pub fn validate(&self, provided: &str) -> bool {
        constant_time_eq(&self.token, provided)
    }
}

impl fmt::Display for AdmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdmissionToken(*****)")
    }
}

impl fmt::Debug for AdmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Performs constant-time string comparison.
///
/// Always walks the full length of both strings once their lengths match, so
/// timing does not reveal where the first differing byte is.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}

/// Extracts the token from an `Authorization` header value.
///
/// Executors written against the first dispatcher send the bare token; newer
/// ones send `Bearer <token>`. Both are accepted.
pub fn extract_token(header_value: Option<&str>) -> Option<&str> {
    let value = header_value?.trim_start();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
