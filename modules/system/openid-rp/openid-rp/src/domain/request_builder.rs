//! Builds one authentication request per distinct provider host.

use std::sync::Arc;

use openid_rp_sdk::protocol::{Phase, callback};
use openid_rp_sdk::{
    AssociationPolicy, AuthenticationRequest, CandidateEndpoint, OpenIdRpPluginClient,
    RequestMode,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::associations::AssociationCache;
use super::dedup::remove_duplicate_endpoints;
use super::error::DomainError;
use super::realm::ReturnContext;

pub struct RequestBuilder {
    plugin: Arc<dyn OpenIdRpPluginClient>,
    associations: AssociationCache,
    context: ReturnContext,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(plugin: Arc<dyn OpenIdRpPluginClient>, context: ReturnContext) -> Self {
        Self {
            plugin,
            associations: AssociationCache::new(),
            context,
        }
    }

    #[must_use]
    pub fn context(&self) -> &ReturnContext {
        &self.context
    }

    /// Resolve `identifier` through the plugin and keep one endpoint per host.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Discovery`] if the plugin cannot resolve the
    /// identifier. No endpoints is `Ok(vec![])`.
    pub async fn resolve(&self, identifier: &str) -> Result<Vec<CandidateEndpoint>, DomainError> {
        let candidates =
            self.plugin
                .discover(identifier)
                .await
                .map_err(|e| DomainError::Discovery {
                    identifier: identifier.to_owned(),
                    reason: e.to_string(),
                })?;
        let discovered = candidates.len();
        let endpoints = remove_duplicate_endpoints(candidates);
        debug!(
            discovered,
            kept = endpoints.len(),
            "Deduplicated discovered endpoints"
        );
        Ok(endpoints)
    }

    /// Build the requests of one round, in discovery order.
    ///
    /// Immediate requests only reuse an association that already exists;
    /// setup requests may negotiate a new one.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidArgument`] if `identifier` is blank
    /// - [`DomainError::Discovery`] if the identifier cannot be resolved
    pub async fn build(
        &self,
        identifier: &str,
        immediate: bool,
        round_id: Uuid,
    ) -> Result<Vec<AuthenticationRequest>, DomainError> {
        if identifier.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "user-supplied identifier must not be empty".to_owned(),
            ));
        }

        let endpoints = self.resolve(identifier).await?;
        let realm = self.context.realm().to_string();
        let return_to = self.context.return_to();
        let return_to_has_identifier = return_to
            .query_pairs()
            .any(|(key, _)| key == callback::USER_SUPPLIED_IDENTIFIER);

        let mut requests = Vec::with_capacity(endpoints.len());
        for (index, endpoint) in endpoints.into_iter().enumerate() {
            let mut request =
                AuthenticationRequest::new(index, endpoint, realm.clone(), return_to.clone());

            request.add_callback_argument(callback::INDEX, index.to_string());
            request.add_callback_argument(callback::ROUND, round_id.to_string());
            if !return_to_has_identifier {
                request.add_callback_argument(callback::USER_SUPPLIED_IDENTIFIER, identifier);
            }
            let provider = request.endpoint().provider_uri.to_string();
            let claimed_id = request.endpoint().claimed_identity.clone();
            request.add_callback_argument(callback::OP_ENDPOINT, provider);
            request.add_callback_argument(callback::CLAIMED_ID, claimed_id);
            request.add_callback_argument(callback::PHASE, Phase::ResultDelivery.as_str());

            if immediate {
                request.set_mode(RequestMode::Immediate);
                request.set_association_policy(AssociationPolicy::ReuseOnly);
            }
            let handle = self.association_for(&request).await;
            request.set_association(handle);

            debug!(
                index,
                provider = %request.endpoint().provider_uri,
                mode = ?request.mode(),
                associated = request.association_handle().is_some(),
                "Built authentication request"
            );
            requests.push(request);
        }

        Ok(requests)
    }

    async fn association_for(&self, request: &AuthenticationRequest) -> Option<String> {
        let endpoint = request.endpoint();
        if let Some(handle) = self.associations.get(&endpoint.provider_uri) {
            return Some(handle);
        }
        match request.association_policy() {
            AssociationPolicy::ReuseOnly => None,
            AssociationPolicy::Establish => match self.plugin.associate(endpoint).await {
                Ok(association) => {
                    self.associations
                        .insert(&endpoint.provider_uri, &association);
                    Some(association.handle)
                }
                Err(e) => {
                    warn!(
                        provider = %endpoint.provider_uri,
                        error = %e,
                        "Association failed, continuing in stateless mode"
                    );
                    None
                }
            },
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use openid_rp_sdk::{
        Association, OpenIdRpError, Parameters, PositiveAssertion, VerificationFailure,
        VerificationStage,
    };
    use url::Url;

    use super::*;

    struct FakePlugin {
        endpoints: Vec<CandidateEndpoint>,
        associate_calls: AtomicUsize,
    }

    impl FakePlugin {
        fn with(uris: &[&str]) -> Self {
            Self {
                endpoints: uris
                    .iter()
                    .map(|u| {
                        CandidateEndpoint::new(Url::parse(u).unwrap(), format!("{u}#claimed"))
                    })
                    .collect(),
                associate_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OpenIdRpPluginClient for FakePlugin {
        async fn discover(
            &self,
            identifier: &str,
        ) -> Result<Vec<CandidateEndpoint>, OpenIdRpError> {
            if identifier == "broken" {
                return Err(OpenIdRpError::Discovery("unreachable".to_owned()));
            }
            Ok(self.endpoints.clone())
        }

        async fn associate(
            &self,
            endpoint: &CandidateEndpoint,
        ) -> Result<Association, OpenIdRpError> {
            self.associate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Association {
                handle: format!("assoc-{}", endpoint.provider_uri.host_str().unwrap()),
                lifetime: Duration::from_secs(300),
            })
        }

        async fn verify_assertion(
            &self,
            _assertion: &PositiveAssertion,
            _raw: &Parameters,
            _provider: &Url,
            _stage: VerificationStage,
        ) -> Result<(), VerificationFailure> {
            Ok(())
        }
    }

    fn builder(plugin: Arc<FakePlugin>) -> RequestBuilder {
        let context = ReturnContext::new("https://rp.example.net/", "~/", "~/login").unwrap();
        RequestBuilder::new(plugin, context)
    }

    #[tokio::test]
    async fn shared_hosts_collapse_and_indices_follow_discovery_order() {
        let plugin = Arc::new(FakePlugin::with(&[
            "https://a.example.com/server",
            "https://b.example.com/server",
            "http://A.example.com/other",
            "https://c.example.com/server",
        ]));
        let requests = builder(plugin)
            .build("alice", false, Uuid::nil())
            .await
            .unwrap();

        let hosts: Vec<_> = requests
            .iter()
            .map(|r| r.endpoint().provider_uri.host_str().unwrap().to_owned())
            .collect();
        assert_eq!(hosts, ["a.example.com", "b.example.com", "c.example.com"]);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.index(), i);
            assert_eq!(request.callback_argument(callback::INDEX), Some(i.to_string().as_str()));
        }
    }

    #[tokio::test]
    async fn callback_arguments_are_attached_in_order() {
        let plugin = Arc::new(FakePlugin::with(&["https://a.example.com/server"]));
        let requests = builder(plugin)
            .build("alice", false, Uuid::nil())
            .await
            .unwrap();

        let keys: Vec<&str> = requests[0]
            .callback_arguments()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(
            keys,
            [
                callback::INDEX,
                callback::ROUND,
                callback::USER_SUPPLIED_IDENTIFIER,
                callback::OP_ENDPOINT,
                callback::CLAIMED_ID,
                callback::PHASE
            ]
        );
        assert_eq!(requests[0].callback_argument(callback::PHASE), Some("2"));
        assert_eq!(
            requests[0].callback_argument(callback::OP_ENDPOINT),
            Some("https://a.example.com/server")
        );
    }

    #[tokio::test]
    async fn identifier_is_not_reattached_when_return_to_embeds_it() {
        let plugin = Arc::new(FakePlugin::with(&["https://a.example.com/server"]));
        let context = ReturnContext::new(
            "https://rp.example.net/",
            "~/",
            "~/login?rp.user_supplied_identifier=alice",
        )
        .unwrap();
        let requests = RequestBuilder::new(plugin, context)
            .build("alice", false, Uuid::nil())
            .await
            .unwrap();

        assert!(
            requests[0]
                .callback_argument(callback::USER_SUPPLIED_IDENTIFIER)
                .is_none()
        );
    }

    #[tokio::test]
    async fn immediate_requests_never_negotiate_associations() {
        let plugin = Arc::new(FakePlugin::with(&[
            "https://a.example.com/server",
            "https://b.example.com/server",
        ]));
        let builder = builder(plugin.clone());

        let immediate = builder.build("alice", true, Uuid::nil()).await.unwrap();
        assert_eq!(plugin.associate_calls.load(Ordering::SeqCst), 0);
        for request in &immediate {
            assert_eq!(request.mode(), RequestMode::Immediate);
            assert_eq!(request.association_policy(), AssociationPolicy::ReuseOnly);
            assert!(request.association_handle().is_none());
        }

        let setup = builder.build("alice", false, Uuid::nil()).await.unwrap();
        assert_eq!(plugin.associate_calls.load(Ordering::SeqCst), 2);
        assert_eq!(setup[0].association_handle(), Some("assoc-a.example.com"));

        // established associations may be reused by later immediate requests
        let again = builder.build("alice", true, Uuid::nil()).await.unwrap();
        assert_eq!(plugin.associate_calls.load(Ordering::SeqCst), 2);
        assert_eq!(again[1].association_handle(), Some("assoc-b.example.com"));
    }

    #[tokio::test]
    async fn zero_endpoints_is_not_an_error() {
        let plugin = Arc::new(FakePlugin::with(&[]));
        let requests = builder(plugin)
            .build("nobody", true, Uuid::nil())
            .await
            .unwrap();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn discovery_failure_and_blank_identifier_are_errors() {
        let plugin = Arc::new(FakePlugin::with(&[]));
        let builder = builder(plugin);

        assert!(matches!(
            builder.build("broken", true, Uuid::nil()).await,
            Err(DomainError::Discovery { .. })
        ));
        assert!(matches!(
            builder.build("  ", true, Uuid::nil()).await,
            Err(DomainError::InvalidArgument(_))
        ));
    }
}
