//! Client implementation for the static `OpenID` relying party plugin.
//!
//! Implements `OpenIdRpPluginClient` using the domain service.

use async_trait::async_trait;
use openid_rp_sdk::{
    Association, CandidateEndpoint, OpenIdRpError, OpenIdRpPluginClient, Parameters,
    PositiveAssertion, VerificationFailure, VerificationStage,
};
use url::Url;

use super::service::Service;

#[async_trait]
impl OpenIdRpPluginClient for Service {
    async fn discover(&self, identifier: &str) -> Result<Vec<CandidateEndpoint>, OpenIdRpError> {
        self.discover(identifier)
            .map(<[CandidateEndpoint]>::to_vec)
            .ok_or_else(|| {
                OpenIdRpError::Discovery(format!("no discovery information for '{identifier}'"))
            })
    }

    async fn associate(&self, endpoint: &CandidateEndpoint) -> Result<Association, OpenIdRpError> {
        self.association_for(&endpoint.provider_uri).ok_or_else(|| {
            OpenIdRpError::ServiceUnavailable(format!(
                "no association configured for '{}'",
                endpoint.provider_uri
            ))
        })
    }

    async fn verify_assertion(
        &self,
        assertion: &PositiveAssertion,
        raw: &Parameters,
        provider: &Url,
        stage: VerificationStage,
    ) -> Result<(), VerificationFailure> {
        self.verify(assertion, raw, provider, stage)
    }
}
