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

//! Executor admission.
//!
//! An executor joins the pool at runtime by presenting the admission token.
//! The dispatcher then probes the executor's health endpoint once; only an
//! executor that answers `OK` is added.

use fanrpc_common::auth::{extract_token, AdmissionToken};
use fanrpc_common::{ExecutorAddr, FanrpcError, Result};
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::transport::ExecutorTransport;

/// Result of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionOutcome {
    pub addr: ExecutorAddr,
    /// `false` when the executor was already registered
    pub is_new: bool,
}

/// Token check and health probe in front of [`Dispatcher::admit`].
pub struct Admission<T: ExecutorTransport> {
    dispatcher: Dispatcher<T>,
    token: AdmissionToken,
}

impl<T: ExecutorTransport> Clone for Admission<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: ExecutorTransport> Admission<T> {
    pub fn new(dispatcher: Dispatcher<T>, token: AdmissionToken) -> Self {
        Self { dispatcher, token }
    }

    /// Checks an `Authorization` header value against the admission token.
    pub fn authorize(&self, header: Option<&str>) -> Result<()> {
        match extract_token(header) {
            Some(provided) if self.token.validate(provided) => Ok(()),
            _ => Err(FanrpcError::Unauthorized),
        }
    }

    /// Authorizes, probes and admits an executor.
    ///
    /// The probe only runs for an authorized caller, so a wrong token is
    /// rejected regardless of the executor's health.
    ///
    /// # Arguments
    /// * `header` - Raw `Authorization` header value, if any
    /// * `addr` - Executor asking to join
    ///
    /// # Returns
    /// - `Ok(outcome)` - Admitted; `outcome.is_new` is `false` for a repeat
    /// - `Err(FanrpcError::Unauthorized)` - Missing or wrong token
    /// - `Err(FanrpcError::HealthCheckFailed)` - Probe failed; nothing is added
    pub async fn admit(&self, header: Option<&str>, addr: ExecutorAddr) -> Result<AdmissionOutcome> {
        if let Err(e) = self.authorize(header) {
            warn!("Rejected registration of {}: bad token", addr);
            return Err(e);
        }

        if let Err(e) = self.dispatcher.transport().probe_health(&addr).await {
            warn!("Rejected registration of {}: {}", addr, e);
            return Err(e);
        }

        let is_new = self.dispatcher.admit(addr.clone()).await;
        if is_new {
            info!("Executor {} registered", addr);
        }

        Ok(AdmissionOutcome { addr, is_new })
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use fanrpc_common::{Request, RpcResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport whose probe answers a fixed verdict.
    struct ProbeTransport {
        healthy: bool,
        probes: AtomicU32,
    }

    impl ProbeTransport {
        fn new(healthy: bool) -> Self {
            Self {
                healthy,
                probes: AtomicU32::new(0),
            }
        }
    }

    impl ExecutorTransport for ProbeTransport {
        async fn call(&self, _addr: &ExecutorAddr, _request: &Request) -> Result<RpcResult> {
            Ok(serde_json::Value::Null)
        }

        async fn probe_health(&self, addr: &ExecutorAddr) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                Err(FanrpcError::HealthCheckFailed(format!("{} answered \"FAIL\"", addr)))
            }
        }
    }

    fn admission(healthy: bool) -> Admission<ProbeTransport> {
        let dispatcher = Dispatcher::new(ProbeTransport::new(healthy), DispatcherConfig::default(), vec![]);
        Admission::new(dispatcher, AdmissionToken::new("s3cret"))
    }

    fn executor() -> ExecutorAddr {
        ExecutorAddr::new("10.1.2.3", 7000)
    }

    #[test]
    fn test_authorize() {
        let admission = admission(true);
        assert!(admission.authorize(Some("s3cret")).is_ok());
        assert!(admission.authorize(Some("Bearer s3cret")).is_ok());
        assert!(matches!(admission.authorize(Some("nope")), Err(FanrpcError::Unauthorized)));
        assert!(matches!(admission.authorize(None), Err(FanrpcError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_admit_healthy() {
        let admission = admission(true);

        let outcome = admission.admit(Some("s3cret"), executor()).await.unwrap();
        assert_eq!(outcome, AdmissionOutcome { addr: executor(), is_new: true });

        let again = admission.admit(Some("s3cret"), executor()).await.unwrap();
        assert!(!again.is_new);
        assert_eq!(admission.dispatcher().snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_is_not_admitted() {
        let admission = admission(false);

        let err = admission.admit(Some("s3cret"), executor()).await.unwrap_err();
        assert!(matches!(err, FanrpcError::HealthCheckFailed(_)));
        assert!(admission.dispatcher().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_token_skips_probe() {
        let admission = admission(true);

        let err = admission.admit(Some("guess"), executor()).await.unwrap_err();
        assert!(matches!(err, FanrpcError::Unauthorized));
        assert_eq!(admission.dispatcher().transport().probes.load(Ordering::SeqCst), 0);
        assert!(admission.dispatcher().snapshot().await.is_empty());
    }
}
