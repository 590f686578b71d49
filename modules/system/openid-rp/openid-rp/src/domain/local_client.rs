//! Local (in-process) client for the `OpenID` relying party.

use std::sync::Arc;

use async_trait::async_trait;
use openid_rp_sdk::{
    AuthenticationRequest, ContextKind, DeliveryOutcome, DiscoveryResult, OpenIdRpClient,
    OpenIdRpError, ResolvedResponse, RoundState,
};
use url::Url;

use super::{DomainError, Service};

/// Local client wrapping the service.
///
/// Handed to the host by the module during `init()`.
pub struct OpenIdRpLocalClient {
    svc: Arc<Service>,
}

impl OpenIdRpLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> OpenIdRpError {
    tracing::error!(operation = op, error = ?e, "openid_rp call failed");
    e.into()
}

#[async_trait]
impl OpenIdRpClient for OpenIdRpLocalClient {
    async fn discover(
        &self,
        identifier: &str,
        round: &mut RoundState,
    ) -> Result<DiscoveryResult, OpenIdRpError> {
        self.svc
            .discover(identifier, round)
            .await
            .map_err(|e| log_and_convert("discover", e))
    }

    async fn create_requests(
        &self,
        identifier: &str,
        immediate: bool,
        round: &mut RoundState,
    ) -> Result<Vec<AuthenticationRequest>, OpenIdRpError> {
        self.svc
            .create_requests(identifier, immediate, round)
            .await
            .map_err(|e| log_and_convert("create_requests", e))
    }

    async fn deliver_result(
        &self,
        callback_url: &Url,
        source: ContextKind,
        round: &mut RoundState,
    ) -> Result<DeliveryOutcome, OpenIdRpError> {
        self.svc
            .deliver_result(callback_url, source, round)
            .await
            .map_err(|e| log_and_convert("deliver_result", e))
    }

    async fn authentication_response(
        &self,
        round: &mut RoundState,
        auth_data: Option<&str>,
    ) -> Result<Option<ResolvedResponse>, OpenIdRpError> {
        self.svc
            .authentication_response(round, auth_data)
            .await
            .map_err(|e| log_and_convert("authentication_response", e))
    }
}
