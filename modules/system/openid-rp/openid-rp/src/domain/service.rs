//! Orchestration of one interaction round.
//!
//! The service sequences discovery, request building, verification and
//! delivery. Round state is owned by the caller; the only state kept here is
//! the association cache inside the request builder and the extension
//! bindings.

use std::sync::Arc;
use std::time::Duration;

use openid_rp_sdk::protocol::{Phase, callback};
use openid_rp_sdk::{
    AuthenticationRequest, AuthenticationStatus, ClientScriptExtension, ContextKind,
    DeliveryOutcome, DiscoveredRequest, DiscoveryResult, HostMessage, IgnoreReason,
    OpenIdRpPluginClient, Parameters, PendingRequest, RequestMode, ResolvedResponse, RoundState,
    VerificationStage,
};
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::correlator::Correlator;
use super::error::DomainError;
use super::extensions::ExtensionBindings;
use super::realm::ReturnContext;
use super::request_builder::RequestBuilder;
use super::verifier::{Verifier, parse_indirect_response};
use crate::config::OpenIdRpConfig;

/// Reported to the page when discovery yields no usable endpoint.
pub const NO_ENDPOINT_FOUND: &str = "No OpenID endpoint found.";

/// `OpenID` relying party service.
pub struct Service {
    builder: RequestBuilder,
    verifier: Verifier,
    correlator: Correlator,
    bindings: RwLock<ExtensionBindings>,
    timeout: Duration,
}

impl Service {
    /// Create a service from validated configuration.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Config`] if the configuration is invalid, including a
    ///   return-to URL outside the realm
    /// - [`DomainError::RegistrationConflict`] if configured extensions clash
    pub fn new(
        cfg: &OpenIdRpConfig,
        plugin: Arc<dyn OpenIdRpPluginClient>,
        sender: UnboundedSender<HostMessage>,
    ) -> Result<Self, DomainError> {
        cfg.validate()?;
        let context = ReturnContext::new(&cfg.site_url, &cfg.realm, &cfg.return_to)?;
        let bindings = ExtensionBindings::from_config(&cfg.extensions)?;

        Ok(Self {
            builder: RequestBuilder::new(plugin.clone(), context),
            verifier: Verifier::new(plugin),
            correlator: Correlator::new(sender, cfg.handle_name.clone()),
            bindings: RwLock::new(bindings),
            timeout: cfg.timeout,
        })
    }

    /// How long the host should wait on a silent attempt.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn return_context(&self) -> &ReturnContext {
        self.builder.context()
    }

    /// Bind an extension reader to a result property.
    ///
    /// # Errors
    ///
    /// See [`ExtensionBindings::register`].
    pub fn register_extension(
        &self,
        extension: Arc<dyn ClientScriptExtension>,
        property: &str,
    ) -> Result<(), DomainError> {
        let kind = extension.kind();
        self.bindings.write().register(extension, property)?;
        debug!(%kind, property, "Registered extension binding");
        Ok(())
    }

    /// Answer the discovery callback.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidArgument`] for a blank identifier.
    /// Discovery failures are reported inside the result.
    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    pub async fn discover(
        &self,
        identifier: &str,
        round: &mut RoundState,
    ) -> Result<DiscoveryResult, DomainError> {
        let requests = match self.create_requests(identifier, true, round).await {
            Ok(requests) => requests,
            Err(DomainError::Discovery { reason, .. }) => {
                warn!(%reason, "Discovery failed");
                return Ok(DiscoveryResult::failed(reason));
            }
            Err(e) => return Err(e),
        };

        let Some(claimed_identifier) = requests
            .first()
            .map(|r| r.endpoint().claimed_identity.clone())
        else {
            info!("No OpenID endpoint discovered");
            return Ok(DiscoveryResult::failed(NO_ENDPOINT_FOUND));
        };

        let requests: Vec<DiscoveredRequest> = requests
            .into_iter()
            .map(|request| self.announce(request))
            .collect();
        info!(requests = requests.len(), "Discovery complete");

        Ok(DiscoveryResult {
            claimed_identifier: Some(claimed_identifier),
            requests,
            error: None,
        })
    }

    fn announce(&self, mut request: AuthenticationRequest) -> DiscoveredRequest {
        self.correlator.notify(HostMessage::LoggingIn {
            index: request.index(),
            endpoint: request.endpoint().provider_uri.clone(),
            claimed_identity: request.endpoint().claimed_identity.clone(),
        });

        request.set_mode(RequestMode::Immediate);
        let immediate = request.redirect_url();
        request.set_mode(RequestMode::Setup);
        let setup = request.dispatch();

        DiscoveredRequest {
            endpoint: setup.endpoint().provider_uri.clone(),
            immediate,
            setup: setup.url().clone(),
        }
    }

    /// Start a new round and build its requests.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidArgument`] for a blank identifier
    /// - [`DomainError::Discovery`] if the identifier cannot be resolved
    #[tracing::instrument(skip_all, fields(immediate = immediate, round_id = tracing::field::Empty))]
    pub async fn create_requests(
        &self,
        identifier: &str,
        immediate: bool,
        round: &mut RoundState,
    ) -> Result<Vec<AuthenticationRequest>, DomainError> {
        let round_id = Uuid::new_v4();
        tracing::Span::current().record("round_id", tracing::field::display(round_id));

        let requests = self.builder.build(identifier, immediate, round_id).await?;

        round.begin(round_id);
        for request in &requests {
            round.track(PendingRequest::from(request));
        }
        info!(requests = requests.len(), "Started round");
        Ok(requests)
    }

    /// Handle a provider reply received by a background context.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Protocol`] if the callback is not a result
    /// delivery or the reply is structurally unparseable.
    #[tracing::instrument(skip_all, fields(source = ?source))]
    pub async fn deliver_result(
        &self,
        callback_url: &Url,
        source: ContextKind,
        round: &mut RoundState,
    ) -> Result<DeliveryOutcome, DomainError> {
        let params = query_parameters(callback_url);
        if params
            .get(callback::PHASE)
            .map(String::as_str)
            .and_then(Phase::parse)
            != Some(Phase::ResultDelivery)
        {
            return Err(DomainError::Protocol(format!(
                "'{}' does not mark a result delivery",
                callback::PHASE
            )));
        }

        let parsed = parse_indirect_response(&params)?;
        let index = parsed.index;

        if round.round_id() != Some(parsed.round) {
            warn!(index, round = %parsed.round, "Ignoring reply for a previous round");
            self.correlator.close_if_transient(source);
            return Ok(DeliveryOutcome::Ignored(IgnoreReason::StaleRound));
        }
        if let Some(winner) = round.settled_by() {
            info!(index, winner, "Ignoring reply for a settled round");
            self.correlator.close_if_transient(source);
            return Ok(DeliveryOutcome::Ignored(IgnoreReason::AlreadySettled));
        }

        let response = self
            .verifier
            .verify_parsed(parsed, &params, round, VerificationStage::Preliminary)
            .await;
        {
            let bindings = self.bindings.read();
            self.correlator
                .deliver(&response, &bindings, source, callback_url.as_str());
        }

        let status = response.status();
        if status == AuthenticationStatus::Authenticated {
            round.settle(index);
        }
        info!(index, ?status, "Delivered provider reply");
        Ok(DeliveryOutcome::Delivered { index, status })
    }

    /// Resolve the round's response on the page side.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Protocol`] if a fresh payload is not a URL or
    /// is structurally unparseable.
    #[tracing::instrument(skip_all)]
    pub async fn authentication_response(
        &self,
        round: &mut RoundState,
        auth_data: Option<&str>,
    ) -> Result<Option<ResolvedResponse>, DomainError> {
        let Some(token) = auth_data.filter(|t| round.cache().is_fresh(t)) else {
            let snapshot = round.cache().load(auth_data).cloned();
            debug!(found = snapshot.is_some(), "Serving stored response");
            return Ok(snapshot.map(ResolvedResponse::Snapshot));
        };

        let url = Url::parse(token)
            .map_err(|e| DomainError::Protocol(format!("auth data is not a callback URL: {e}")))?;
        let params = query_parameters(&url);
        let response = self
            .verifier
            .verify(&params, round, VerificationStage::Final)
            .await?;
        round.cache_mut().store(token, &response);

        if response.status() == AuthenticationStatus::Authenticated {
            info!(claimed_identity = ?response.claimed_identity(), "Logged in");
            self.correlator.notify(HostMessage::LoggedIn {
                claimed_identity: response.claimed_identity().map(str::to_owned),
                endpoint: response.endpoint().cloned(),
            });
        }
        Ok(Some(ResolvedResponse::Live(response)))
    }
}

fn query_parameters(url: &Url) -> Parameters {
    url.query_pairs().into_owned().collect()
}
