//! Plugin API trait for `OpenID` relying party collaborators.
//!
//! Plugins own the parts of the protocol the orchestrator only sequences:
//! identifier discovery, association negotiation and cryptographic checks of
//! positive assertions.

use async_trait::async_trait;
use url::Url;

use crate::error::{OpenIdRpError, VerificationFailure};
use crate::models::{
    Association, CandidateEndpoint, Parameters, PositiveAssertion, VerificationStage,
};

/// Plugin API trait for `OpenID` relying party collaborators.
#[async_trait]
pub trait OpenIdRpPluginClient: Send + Sync {
    /// Resolve a user-supplied identifier to candidate endpoints, most
    /// preferred first.
    ///
    /// # Errors
    ///
    /// - `Discovery` if the identifier is malformed or its discovery
    ///   document is unreachable. An identifier without endpoints is `Ok(vec![])`.
    async fn discover(&self, identifier: &str) -> Result<Vec<CandidateEndpoint>, OpenIdRpError>;

    /// Negotiate a new shared-secret association with a provider.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` if the provider cannot be reached
    /// - `Internal` for unexpected errors
    async fn associate(&self, endpoint: &CandidateEndpoint) -> Result<Association, OpenIdRpError>;

    /// Check signature, nonce and association of a structurally valid assertion.
    ///
    /// `provider` is the endpoint the request was sent to; the association
    /// that signed the assertion must belong to it.
    ///
    /// A nonce is only recorded as used at [`VerificationStage::Final`]; both
    /// stages reject a nonce that was already recorded.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationFailure`] found.
    async fn verify_assertion(
        &self,
        assertion: &PositiveAssertion,
        raw: &Parameters,
        provider: &Url,
        stage: VerificationStage,
    ) -> Result<(), VerificationFailure>;
}
