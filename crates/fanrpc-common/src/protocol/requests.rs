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
use std::collections::{BTreeMap, HashSet};

use super::responses::Response;

pub type RequestId = String;
pub type MethodName = String;
pub type Parameters = BTreeMap<String, String>;

/// One entry of a batch. The same struct is posted verbatim to the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: MethodName,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<MethodName>) -> Self {
        Request {
            id: id.into(),
            method: method.into(),
            parameters: Parameters::new(),
            response: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Requests submitted together. The dispatcher hands the same batch back
/// with every `response` populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestBatch {
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl RequestBatch {
    pub fn new(requests: Vec<Request>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// First id that appears more than once, if any.
    pub fn duplicate_id(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.requests.len());
        self.requests
            .iter()
            .map(|r| r.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    /// True once every request carries a response.
    pub fn is_complete(&self) -> bool {
        self.requests.iter().all(|r| r.response.is_some())
    }
}
