//! Domain models for the `OpenID` relying party module.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::extension::ClientScriptExtension;
use crate::protocol::{OPENID2_NS, keys, modes};

/// Raw key/value parameters of an indirect message.
pub type Parameters = BTreeMap<String, String>;

/// `OpenID` protocol generation spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    V1,
    #[default]
    V2,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V1 => "OpenID 1.x",
            Self::V2 => "OpenID 2.0",
        })
    }
}

impl ProtocolVersion {
    /// Infer the version from the shape of an inbound message.
    #[must_use]
    pub fn from_parameters(params: &Parameters) -> Self {
        if params.get(keys::NS).is_some_and(|ns| ns == OPENID2_NS) {
            Self::V2
        } else {
            Self::V1
        }
    }
}

/// A provider endpoint discovered for a user-supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEndpoint {
    pub provider_uri: Url,
    pub claimed_identity: String,
    /// Identity the provider knows the user by, when it differs from the claimed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_identity: Option<String>,
    #[serde(default)]
    pub version: ProtocolVersion,
}

impl CandidateEndpoint {
    #[must_use]
    pub fn new(provider_uri: Url, claimed_identity: impl Into<String>) -> Self {
        Self {
            provider_uri,
            claimed_identity: claimed_identity.into(),
            local_identity: None,
            version: ProtocolVersion::default(),
        }
    }

    #[must_use]
    pub fn with_local_identity(mut self, local_identity: impl Into<String>) -> Self {
        self.local_identity = Some(local_identity.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    /// Value sent as `openid.identity`.
    #[must_use]
    pub fn provider_local_identity(&self) -> &str {
        self.local_identity
            .as_deref()
            .unwrap_or(&self.claimed_identity)
    }
}

/// Whether the provider may interact with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Silent attempt; the provider answers at once or declines.
    Immediate,
    /// Interactive attempt; the provider may prompt the user.
    Setup,
}

impl RequestMode {
    #[must_use]
    pub const fn openid_mode(self) -> &'static str {
        match self {
            Self::Immediate => modes::CHECKID_IMMEDIATE,
            Self::Setup => modes::CHECKID_SETUP,
        }
    }
}

/// How a request may obtain a shared-secret association with its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationPolicy {
    /// Reuse a cached association or negotiate a new one.
    Establish,
    /// Only reuse an association that is already established.
    ReuseOnly,
}

/// Shared-secret association handed out by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub handle: String,
    pub lifetime: Duration,
}

/// An outbound authentication request, still open for configuration.
///
/// Built by the orchestrator, adjusted by the host if needed, then consumed by
/// [`AuthenticationRequest::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    index: usize,
    endpoint: CandidateEndpoint,
    mode: RequestMode,
    association_policy: AssociationPolicy,
    association: Option<String>,
    realm: String,
    return_to: Url,
    callback_args: Vec<(String, String)>,
}

impl AuthenticationRequest {
    #[must_use]
    pub fn new(
        index: usize,
        endpoint: CandidateEndpoint,
        realm: impl Into<String>,
        return_to: Url,
    ) -> Self {
        Self {
            index,
            endpoint,
            mode: RequestMode::Setup,
            association_policy: AssociationPolicy::Establish,
            association: None,
            realm: realm.into(),
            return_to,
            callback_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn endpoint(&self) -> &CandidateEndpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    #[must_use]
    pub fn association_policy(&self) -> AssociationPolicy {
        self.association_policy
    }

    #[must_use]
    pub fn association_handle(&self) -> Option<&str> {
        self.association.as_deref()
    }

    /// Realm in wire form; may carry a `*.` wildcard.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Return-to URL as configured, without callback arguments.
    #[must_use]
    pub fn return_to(&self) -> &Url {
        &self.return_to
    }

    #[must_use]
    pub fn callback_arguments(&self) -> &[(String, String)] {
        &self.callback_args
    }

    #[must_use]
    pub fn callback_argument(&self, key: &str) -> Option<&str> {
        self.callback_args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_mode(&mut self, mode: RequestMode) {
        self.mode = mode;
    }

    pub fn set_association_policy(&mut self, policy: AssociationPolicy) {
        self.association_policy = policy;
    }

    pub fn set_association(&mut self, handle: Option<String>) {
        self.association = handle;
    }

    /// Add an argument that the provider must hand back untouched.
    ///
    /// Re-adding an existing key replaces its value in place.
    pub fn add_callback_argument(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.callback_args.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.callback_args.push((key, value));
        }
    }

    /// Return-to URL with every callback argument appended to its query.
    #[must_use]
    pub fn return_to_with_arguments(&self) -> Url {
        let mut url = self.return_to.clone();
        if !self.callback_args.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.callback_args {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Provider URL carrying this request as an indirect message.
    #[must_use]
    pub fn redirect_url(&self) -> Url {
        let return_to = self.return_to_with_arguments();
        let mut url = self.endpoint.provider_uri.clone();
        {
            let mut query = url.query_pairs_mut();
            match self.endpoint.version {
                ProtocolVersion::V2 => {
                    query
                        .append_pair(keys::NS, OPENID2_NS)
                        .append_pair(keys::MODE, self.mode.openid_mode())
                        .append_pair(keys::CLAIMED_ID, &self.endpoint.claimed_identity)
                        .append_pair(keys::IDENTITY, self.endpoint.provider_local_identity())
                        .append_pair(keys::RETURN_TO, return_to.as_str())
                        .append_pair(keys::REALM, &self.realm);
                }
                ProtocolVersion::V1 => {
                    query
                        .append_pair(keys::MODE, self.mode.openid_mode())
                        .append_pair(keys::IDENTITY, self.endpoint.provider_local_identity())
                        .append_pair(keys::RETURN_TO, return_to.as_str())
                        .append_pair(keys::TRUST_ROOT, &self.realm);
                }
            }
            if let Some(handle) = &self.association {
                query.append_pair(keys::ASSOC_HANDLE, handle);
            }
        }
        url
    }

    /// Freeze the request into the URL the host sends the user agent to.
    #[must_use]
    pub fn dispatch(self) -> DispatchedRequest {
        let url = self.redirect_url();
        DispatchedRequest {
            index: self.index,
            mode: self.mode,
            endpoint: self.endpoint,
            url,
        }
    }
}

/// A request that has left the relying party; no longer mutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedRequest {
    index: usize,
    mode: RequestMode,
    endpoint: CandidateEndpoint,
    url: Url,
}

impl DispatchedRequest {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    #[must_use]
    pub fn endpoint(&self) -> &CandidateEndpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// A parsed positive assertion, as handed to the plugin for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositiveAssertion {
    pub version: ProtocolVersion,
    pub op_endpoint: Option<Url>,
    pub claimed_id: Option<String>,
    pub identity: String,
    pub return_to: Url,
    pub assoc_handle: String,
    pub response_nonce: Option<String>,
    /// Field names (without the `openid.` prefix) covered by the signature.
    pub signed: Vec<String>,
    pub sig: String,
}

/// How far verification of a positive assertion goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStage {
    /// Check done by the background context before the result is shown.
    /// The response nonce is checked but not consumed.
    Preliminary,
    /// Check done by the page before the identity is trusted. Consumes the
    /// response nonce.
    Final,
}

/// Final classification of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationStatus {
    Authenticated,
    Canceled,
    Failed,
    /// An immediate request was declined because the provider needs to interact.
    SetupRequired,
}

/// A freshly verified response.
///
/// The status is fixed at construction. Extension data is only readable from
/// this live form, and only once the assertion has been verified.
#[derive(Debug, Clone)]
pub struct AuthenticationResponse {
    status: AuthenticationStatus,
    claimed_identity: Option<String>,
    endpoint: Option<Url>,
    raw: Parameters,
    message: Option<String>,
}

impl AuthenticationResponse {
    #[must_use]
    pub fn new(
        status: AuthenticationStatus,
        claimed_identity: Option<String>,
        endpoint: Option<Url>,
        raw: Parameters,
    ) -> Self {
        Self {
            status,
            claimed_identity,
            endpoint,
            raw,
            message: None,
        }
    }

    /// Shorthand for a `Failed` response carrying a human-readable reason.
    #[must_use]
    pub fn failed(
        message: impl Into<String>,
        claimed_identity: Option<String>,
        endpoint: Option<Url>,
        raw: Parameters,
    ) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(AuthenticationStatus::Failed, claimed_identity, endpoint, raw)
        }
    }

    #[must_use]
    pub fn status(&self) -> AuthenticationStatus {
        self.status
    }

    #[must_use]
    pub fn claimed_identity(&self) -> Option<&str> {
        self.claimed_identity.as_deref()
    }

    /// Provider endpoint that produced this response.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    #[must_use]
    pub fn raw_parameters(&self) -> &Parameters {
        &self.raw
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Script-safe representation of one extension's data.
    ///
    /// `Value::Null` stands for "absent": the extension is missing from the
    /// assertion or the response is not `Authenticated`.
    #[must_use]
    pub fn extension_script(&self, extension: &dyn ClientScriptExtension) -> serde_json::Value {
        if self.status != AuthenticationStatus::Authenticated {
            return serde_json::Value::Null;
        }
        extension
            .extract(&self.raw)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Value-only copy of a response, persisted across re-renders.
///
/// Extension accessors are deliberately not carried over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    status: AuthenticationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claimed_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<Url>,
    raw: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ResponseSnapshot {
    #[must_use]
    pub fn status(&self) -> AuthenticationStatus {
        self.status
    }

    #[must_use]
    pub fn claimed_identity(&self) -> Option<&str> {
        self.claimed_identity.as_deref()
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    #[must_use]
    pub fn raw_parameters(&self) -> &Parameters {
        &self.raw
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<&AuthenticationResponse> for ResponseSnapshot {
    fn from(response: &AuthenticationResponse) -> Self {
        Self {
            status: response.status,
            claimed_identity: response.claimed_identity.clone(),
            endpoint: response.endpoint.clone(),
            raw: response.raw.clone(),
            message: response.message.clone(),
        }
    }
}

/// Either a response verified during this call or one restored from the round.
#[derive(Debug, Clone)]
pub enum ResolvedResponse {
    Live(AuthenticationResponse),
    Snapshot(ResponseSnapshot),
}

impl ResolvedResponse {
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    #[must_use]
    pub fn status(&self) -> AuthenticationStatus {
        match self {
            Self::Live(r) => r.status(),
            Self::Snapshot(s) => s.status(),
        }
    }

    #[must_use]
    pub fn claimed_identity(&self) -> Option<&str> {
        match self {
            Self::Live(r) => r.claimed_identity(),
            Self::Snapshot(s) => s.claimed_identity(),
        }
    }

    #[must_use]
    pub fn raw_parameters(&self) -> &Parameters {
        match self {
            Self::Live(r) => r.raw_parameters(),
            Self::Snapshot(s) => s.raw_parameters(),
        }
    }
}

/// Result of the discovery callback, shaped for the script host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_identifier: Option<String>,
    /// Never absent; empty when nothing usable was discovered.
    pub requests: Vec<DiscoveredRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiscoveryResult {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            claimed_identifier: None,
            requests: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// One endpoint entry of a [`DiscoveryResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredRequest {
    pub endpoint: Url,
    /// URL starting a silent attempt.
    pub immediate: Url,
    /// URL starting an interactive attempt.
    pub setup: Url,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::extension::ExtensionKind;
    use crate::protocol::callback;

    fn endpoint() -> CandidateEndpoint {
        CandidateEndpoint::new(
            Url::parse("https://op.example.com/server").unwrap(),
            "https://alice.example.org/",
        )
    }

    fn request() -> AuthenticationRequest {
        AuthenticationRequest::new(
            0,
            endpoint(),
            "https://rp.example.net/",
            Url::parse("https://rp.example.net/login").unwrap(),
        )
    }

    fn query(url: &Url) -> Parameters {
        url.query_pairs().into_owned().collect()
    }

    struct Nickname;

    impl ClientScriptExtension for Nickname {
        fn kind(&self) -> ExtensionKind {
            ExtensionKind::new("nickname")
        }

        fn extract(&self, raw: &Parameters) -> Option<serde_json::Value> {
            raw.get("openid.sreg.nickname")
                .map(|n| serde_json::Value::String(n.clone()))
        }
    }

    #[test]
    fn callback_argument_readd_replaces_value_in_place() {
        let mut req = request();
        req.add_callback_argument("a", "1");
        req.add_callback_argument("b", "2");
        req.add_callback_argument("a", "3");

        assert_eq!(
            req.callback_arguments(),
            &[
                ("a".to_owned(), "3".to_owned()),
                ("b".to_owned(), "2".to_owned())
            ]
        );
    }

    #[test]
    fn return_to_without_arguments_is_unchanged() {
        let req = request();
        assert_eq!(req.return_to_with_arguments().as_str(), "https://rp.example.net/login");
    }

    #[test]
    fn v2_redirect_carries_namespace_realm_and_callback_arguments() {
        let mut req = request();
        req.set_mode(RequestMode::Immediate);
        req.add_callback_argument(callback::INDEX, "0");
        req.set_association(Some("h1".to_owned()));

        let dispatched = req.dispatch();
        let q = query(dispatched.url());

        assert_eq!(q.get(keys::NS).map(String::as_str), Some(OPENID2_NS));
        assert_eq!(q.get(keys::MODE).map(String::as_str), Some("checkid_immediate"));
        assert_eq!(q.get(keys::REALM).map(String::as_str), Some("https://rp.example.net/"));
        assert_eq!(q.get(keys::ASSOC_HANDLE).map(String::as_str), Some("h1"));
        assert_eq!(
            q.get(keys::RETURN_TO).map(String::as_str),
            Some("https://rp.example.net/login?index=0")
        );
        assert!(!q.contains_key(keys::TRUST_ROOT));
    }

    #[test]
    fn v1_redirect_uses_trust_root_and_local_identity() {
        let ep = endpoint()
            .with_version(ProtocolVersion::V1)
            .with_local_identity("https://op.example.com/u/alice");
        let req = AuthenticationRequest::new(
            0,
            ep,
            "https://rp.example.net/",
            Url::parse("https://rp.example.net/login").unwrap(),
        );

        let q = query(&req.redirect_url());

        assert_eq!(q.get(keys::MODE).map(String::as_str), Some("checkid_setup"));
        assert_eq!(
            q.get(keys::IDENTITY).map(String::as_str),
            Some("https://op.example.com/u/alice")
        );
        assert_eq!(q.get(keys::TRUST_ROOT).map(String::as_str), Some("https://rp.example.net/"));
        assert!(!q.contains_key(keys::NS));
        assert!(!q.contains_key(keys::CLAIMED_ID));
        assert!(!q.contains_key(keys::ASSOC_HANDLE));
    }

    #[test]
    fn protocol_version_follows_namespace() {
        let mut params = Parameters::new();
        assert_eq!(ProtocolVersion::from_parameters(&params), ProtocolVersion::V1);
        params.insert(keys::NS.to_owned(), OPENID2_NS.to_owned());
        assert_eq!(ProtocolVersion::from_parameters(&params), ProtocolVersion::V2);
    }

    #[test]
    fn extension_data_is_absent_unless_authenticated() {
        let mut raw = Parameters::new();
        raw.insert("openid.sreg.nickname".to_owned(), "alice".to_owned());

        let ok = AuthenticationResponse::new(
            AuthenticationStatus::Authenticated,
            Some("https://alice.example.org/".to_owned()),
            None,
            raw.clone(),
        );
        let failed = AuthenticationResponse::failed("bad signature", None, None, raw);

        assert_eq!(ok.extension_script(&Nickname), serde_json::json!("alice"));
        assert_eq!(failed.extension_script(&Nickname), serde_json::Value::Null);
        assert_eq!(failed.message(), Some("bad signature"));
    }

    #[test]
    fn snapshot_keeps_values_and_survives_serialization() {
        let mut raw = Parameters::new();
        raw.insert(keys::MODE.to_owned(), "id_res".to_owned());
        let live = AuthenticationResponse::new(
            AuthenticationStatus::Authenticated,
            Some("https://alice.example.org/".to_owned()),
            Some(Url::parse("https://op.example.com/server").unwrap()),
            raw,
        );

        let snapshot = ResponseSnapshot::from(&live);
        let persisted = serde_json::to_string(&snapshot).unwrap();
        let restored: ResponseSnapshot = serde_json::from_str(&persisted).unwrap();

        assert_eq!(restored, snapshot);
        assert_eq!(restored.status(), live.status());
        assert_eq!(restored.claimed_identity(), live.claimed_identity());
        assert_eq!(restored.raw_parameters(), live.raw_parameters());
    }

    #[test]
    fn discovery_result_serializes_camel_case_and_always_has_requests() {
        let json = serde_json::to_value(DiscoveryResult::failed("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "requests": [], "error": "nope" }));

        let ok = DiscoveryResult {
            claimed_identifier: Some("https://alice.example.org/".to_owned()),
            ..DiscoveryResult::default()
        };
        let json = serde_json::to_value(ok).unwrap();
        assert_eq!(json["claimedIdentifier"], "https://alice.example.org/");
    }
}
