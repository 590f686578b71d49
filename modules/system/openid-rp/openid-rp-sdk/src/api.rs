//! Public API trait for the `OpenID` relying party.
//!
//! This trait defines what the hosting UI calls in response to its two
//! triggering events: a discovery callback carrying a user-supplied identifier
//! and a result-delivery callback carrying a provider reply.

use async_trait::async_trait;
use url::Url;

use crate::error::OpenIdRpError;
use crate::messages::{ContextKind, DeliveryOutcome};
use crate::models::{AuthenticationRequest, DiscoveryResult, ResolvedResponse};
use crate::round::RoundState;

/// Public API trait for the `OpenID` relying party.
///
/// Everything the host should show or do as a side effect arrives as
/// [`crate::HostMessage`]s on the channel handed out at module initialization:
///
/// ```ignore
/// let (rp, mut messages) = OpenIdRpModule::new().init(&cfg, plugin)?;
///
/// let discovery = rp.discover(&identifier, &mut round).await?;
/// // ... host dispatches `discovery.requests` in frames or popups ...
///
/// rp.deliver_result(&callback_url, ContextKind::Frame, &mut round).await?;
/// while let Ok(msg) = messages.try_recv() {
///     host.apply(msg);
/// }
/// ```
#[async_trait]
pub trait OpenIdRpClient: Send + Sync {
    /// Answer the discovery callback for a user-supplied identifier.
    ///
    /// Starts a new round. Discovery problems and an empty endpoint list are
    /// reported inside the result, not as errors.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the identifier is empty
    /// - `Internal` for unexpected errors
    async fn discover(
        &self,
        identifier: &str,
        round: &mut RoundState,
    ) -> Result<DiscoveryResult, OpenIdRpError>;

    /// Build one configurable request per distinct provider host.
    ///
    /// Starts a new round and tracks every built request in it. The returned
    /// requests may still be adjusted by the caller before they are dispatched.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the identifier is empty
    /// - `Discovery` if the identifier cannot be resolved
    async fn create_requests(
        &self,
        identifier: &str,
        immediate: bool,
        round: &mut RoundState,
    ) -> Result<Vec<AuthenticationRequest>, OpenIdRpError>;

    /// Handle a provider reply received by a background context.
    ///
    /// # Errors
    ///
    /// - `Protocol` if the reply is structurally unparseable
    async fn deliver_result(
        &self,
        callback_url: &Url,
        source: ContextKind,
        round: &mut RoundState,
    ) -> Result<DeliveryOutcome, OpenIdRpError>;

    /// Resolve the response for the round on the page side.
    ///
    /// `auth_data` is the callback URL the page posted back. A payload the
    /// round has not seen yet is verified and returned live; otherwise the
    /// stored snapshot is returned.
    ///
    /// # Errors
    ///
    /// - `Protocol` if a fresh payload is structurally unparseable
    async fn authentication_response(
        &self,
        round: &mut RoundState,
        auth_data: Option<&str>,
    ) -> Result<Option<ResolvedResponse>, OpenIdRpError>;
}
