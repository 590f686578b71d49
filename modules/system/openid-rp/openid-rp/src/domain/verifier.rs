//! Parsing and classification of provider replies.
//!
//! Structurally unparseable input is rejected with [`DomainError::Protocol`]
//! before anything is verified. Everything after parsing ends in a response
//! whose status says what happened; verification problems become `Failed`.

use std::sync::Arc;

use openid_rp_sdk::protocol::{IDENTIFIER_SELECT, callback, keys, modes};
use openid_rp_sdk::{
    AuthenticationResponse, AuthenticationStatus, OpenIdRpPluginClient, Parameters,
    PendingRequest, PositiveAssertion, ProtocolVersion, RoundState, VerificationStage,
};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::error::DomainError;

/// Typed form of an inbound indirect response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    Positive(PositiveAssertion),
    Cancel,
    SetupNeeded,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub index: usize,
    pub round: Uuid,
    pub version: ProtocolVersion,
    pub assertion: Assertion,
}

fn required<'a>(params: &'a Parameters, key: &str) -> Result<&'a str, DomainError> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::Protocol(format!("missing '{key}'")))
}

fn parse_url(key: &str, value: &str) -> Result<Url, DomainError> {
    Url::parse(value).map_err(|e| DomainError::Protocol(format!("'{key}' is not a URL: {e}")))
}

/// Parse the parameters of a provider reply.
///
/// # Errors
///
/// Returns [`DomainError::Protocol`] for a missing or unknown mode, missing
/// correlation arguments, or a positive assertion lacking a required field.
pub fn parse_indirect_response(params: &Parameters) -> Result<ParsedResponse, DomainError> {
    let mode = required(params, keys::MODE)?;
    let index = required(params, callback::INDEX)?
        .parse::<usize>()
        .map_err(|e| DomainError::Protocol(format!("'{}' is not an index: {e}", callback::INDEX)))?;
    let round = Uuid::parse_str(required(params, callback::ROUND)?)
        .map_err(|e| DomainError::Protocol(format!("'{}' is not a round id: {e}", callback::ROUND)))?;
    let version = ProtocolVersion::from_parameters(params);

    let assertion = match mode {
        modes::CANCEL => Assertion::Cancel,
        modes::SETUP_NEEDED => Assertion::SetupNeeded,
        modes::ERROR => Assertion::Error(
            params
                .get(keys::ERROR)
                .cloned()
                .unwrap_or_else(|| "provider reported an unspecified error".to_owned()),
        ),
        modes::ID_RES if params.contains_key(keys::USER_SETUP_URL) => Assertion::SetupNeeded,
        modes::ID_RES => Assertion::Positive(PositiveAssertion {
            version,
            op_endpoint: params
                .get(keys::OP_ENDPOINT)
                .map(|v| parse_url(keys::OP_ENDPOINT, v))
                .transpose()?,
            claimed_id: params.get(keys::CLAIMED_ID).cloned(),
            identity: required(params, keys::IDENTITY)?.to_owned(),
            return_to: parse_url(keys::RETURN_TO, required(params, keys::RETURN_TO)?)?,
            assoc_handle: required(params, keys::ASSOC_HANDLE)?.to_owned(),
            response_nonce: params.get(keys::RESPONSE_NONCE).cloned(),
            signed: required(params, keys::SIGNED)?
                .split(',')
                .map(str::to_owned)
                .collect(),
            sig: required(params, keys::SIG)?.to_owned(),
        }),
        other => {
            return Err(DomainError::Protocol(format!(
                "unsupported mode '{other}'"
            )));
        }
    };

    Ok(ParsedResponse {
        index,
        round,
        version,
        assertion,
    })
}

/// Verifies provider replies against the requests of a round.
pub struct Verifier {
    plugin: Arc<dyn OpenIdRpPluginClient>,
}

impl Verifier {
    #[must_use]
    pub fn new(plugin: Arc<dyn OpenIdRpPluginClient>) -> Self {
        Self { plugin }
    }

    /// Parse, correlate and verify one reply.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Protocol`] only for structurally unparseable
    /// input. Every other problem yields a `Failed` response.
    pub async fn verify(
        &self,
        params: &Parameters,
        round: &RoundState,
        stage: VerificationStage,
    ) -> Result<AuthenticationResponse, DomainError> {
        let parsed = parse_indirect_response(params)?;
        Ok(self.verify_parsed(parsed, params, round, stage).await)
    }

    /// Correlate and verify a reply already parsed by [`parse_indirect_response`].
    pub async fn verify_parsed(
        &self,
        parsed: ParsedResponse,
        params: &Parameters,
        round: &RoundState,
        stage: VerificationStage,
    ) -> AuthenticationResponse {
        let raw = params.clone();

        let pending = match round.pending(parsed.index) {
            Some(p) if round.round_id() == Some(parsed.round) => p,
            _ => {
                warn!(index = parsed.index, round = %parsed.round, "Reply matches no pending request");
                return AuthenticationResponse::failed(
                    "response does not match any pending request",
                    None,
                    None,
                    raw,
                );
            }
        };
        let claimed = Some(pending.claimed_identity.clone());
        let endpoint = Some(pending.endpoint.clone());

        let response = match parsed.assertion {
            Assertion::Cancel => {
                AuthenticationResponse::new(AuthenticationStatus::Canceled, claimed, endpoint, raw)
            }
            Assertion::SetupNeeded => AuthenticationResponse::new(
                AuthenticationStatus::SetupRequired,
                claimed,
                endpoint,
                raw,
            ),
            Assertion::Error(message) => {
                AuthenticationResponse::failed(message, claimed, endpoint, raw)
            }
            Assertion::Positive(assertion) => {
                if let Err(reason) = check_against_pending(&assertion, pending, params) {
                    warn!(index = parsed.index, %reason, "Assertion rejected");
                    return AuthenticationResponse::failed(reason, claimed, endpoint, raw);
                }
                if let Err(failure) = self
                    .plugin
                    .verify_assertion(&assertion, params, &pending.endpoint, stage)
                    .await
                {
                    warn!(index = parsed.index, ?stage, error = %failure, "Assertion failed verification");
                    return AuthenticationResponse::failed(
                        failure.to_string(),
                        claimed,
                        endpoint,
                        raw,
                    );
                }
                let identity = match assertion.version {
                    ProtocolVersion::V2 => assertion.claimed_id.or(claimed),
                    ProtocolVersion::V1 => claimed,
                };
                AuthenticationResponse::new(
                    AuthenticationStatus::Authenticated,
                    identity,
                    endpoint,
                    raw,
                )
            }
        };

        debug!(index = parsed.index, ?stage, status = ?response.status(), "Classified reply");
        response
    }
}

/// Checks that only need the pending request, not the association secret.
fn check_against_pending(
    assertion: &PositiveAssertion,
    pending: &PendingRequest,
    params: &Parameters,
) -> Result<(), String> {
    if assertion.version != pending.version {
        return Err(format!(
            "reply is shaped as {} but the request was sent as {}",
            assertion.version, pending.version
        ));
    }

    let sent = &pending.return_to;
    let got = &assertion.return_to;
    if sent.scheme() != got.scheme()
        || sent.host_str() != got.host_str()
        || sent.port_or_known_default() != got.port_or_known_default()
        || sent.path() != got.path()
    {
        return Err(format!("return_to '{got}' does not match '{sent}'"));
    }

    let asserted: Parameters = got.query_pairs().into_owned().collect();
    for (key, value) in sent.query_pairs() {
        if asserted.get(key.as_ref()).map(String::as_str) != Some(value.as_ref()) {
            return Err(format!("return_to argument '{key}' was altered"));
        }
    }
    for (key, value) in &asserted {
        if params.get(key) != Some(value) {
            return Err(format!(
                "return_to argument '{key}' differs from the received request"
            ));
        }
    }

    if pending.local_identity != IDENTIFIER_SELECT && assertion.identity != pending.local_identity
    {
        return Err(format!(
            "asserted local identity '{}' does not match '{}'",
            assertion.identity, pending.local_identity
        ));
    }

    if assertion.version == ProtocolVersion::V2 {
        match &assertion.op_endpoint {
            Some(op) if *op == pending.endpoint => {}
            Some(op) => {
                return Err(format!(
                    "assertion came from '{op}', expected '{}'",
                    pending.endpoint
                ));
            }
            None => return Err(format!("missing '{}'", keys::OP_ENDPOINT)),
        }
        let Some(claimed) = assertion.claimed_id.as_deref().filter(|c| !c.is_empty()) else {
            return Err(format!("missing '{}'", keys::CLAIMED_ID));
        };
        if pending.claimed_identity != IDENTIFIER_SELECT && claimed != pending.claimed_identity {
            return Err(format!(
                "asserted identity '{claimed}' does not match '{}'",
                pending.claimed_identity
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use async_trait::async_trait;
    use openid_rp_sdk::protocol::OPENID2_NS;
    use openid_rp_sdk::{
        Association, CandidateEndpoint, OpenIdRpError, VerificationFailure,
    };

    use super::*;

    const ROUND: Uuid = Uuid::from_u128(0x5eed);

    /// Accepts any assertion signed with `good`.
    struct SigPlugin;

    #[async_trait]
    impl OpenIdRpPluginClient for SigPlugin {
        async fn discover(&self, _: &str) -> Result<Vec<CandidateEndpoint>, OpenIdRpError> {
            Ok(Vec::new())
        }

        async fn associate(&self, _: &CandidateEndpoint) -> Result<Association, OpenIdRpError> {
            Err(OpenIdRpError::ServiceUnavailable("offline".to_owned()))
        }

        async fn verify_assertion(
            &self,
            assertion: &PositiveAssertion,
            _raw: &Parameters,
            _provider: &Url,
            _stage: VerificationStage,
        ) -> Result<(), VerificationFailure> {
            if assertion.sig == "good" {
                Ok(())
            } else {
                Err(VerificationFailure::SignatureMismatch)
            }
        }
    }

    fn return_to() -> String {
        format!("https://rp.example.net/login?index=0&rp.round={ROUND}")
    }

    fn round() -> RoundState {
        let mut round = RoundState::new();
        round.begin(ROUND);
        round.track(PendingRequest {
            index: 0,
            endpoint: Url::parse("https://op.example.com/server").unwrap(),
            claimed_identity: "https://alice.example.org/".to_owned(),
            local_identity: "https://alice.example.org/".to_owned(),
            version: ProtocolVersion::V2,
            return_to: Url::parse(&return_to()).unwrap(),
        });
        round
    }

    /// A round whose only request went to an `OpenID` 1.x endpoint under a
    /// delegated local identity.
    fn v1_round() -> RoundState {
        let mut round = RoundState::new();
        round.begin(ROUND);
        round.track(PendingRequest {
            index: 0,
            endpoint: Url::parse("https://op.example.com/server").unwrap(),
            claimed_identity: "https://alice.example.org/".to_owned(),
            local_identity: "https://op.example.com/u/alice".to_owned(),
            version: ProtocolVersion::V1,
            return_to: Url::parse(&return_to()).unwrap(),
        });
        round
    }

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        let mut p: Parameters = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        p.insert(callback::INDEX.to_owned(), "0".to_owned());
        p.insert(callback::ROUND.to_owned(), ROUND.to_string());
        p
    }

    fn positive(sig: &str) -> Parameters {
        let rt = return_to();
        params(&[
            (keys::NS, OPENID2_NS),
            (keys::MODE, modes::ID_RES),
            (keys::OP_ENDPOINT, "https://op.example.com/server"),
            (keys::CLAIMED_ID, "https://alice.example.org/"),
            (keys::IDENTITY, "https://alice.example.org/"),
            (keys::RETURN_TO, &rt),
            (keys::ASSOC_HANDLE, "h1"),
            (keys::RESPONSE_NONCE, "2026-10-16T10:00:00Zabc"),
            (keys::SIGNED, "op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle"),
            (keys::SIG, sig),
        ])
    }

    #[tokio::test]
    async fn well_formed_signed_assertion_is_authenticated() {
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(&positive("good"), &round(), VerificationStage::Final)
            .await
            .unwrap();

        assert_eq!(response.status(), AuthenticationStatus::Authenticated);
        assert_eq!(response.claimed_identity(), Some("https://alice.example.org/"));
        assert_eq!(
            response.endpoint().map(Url::as_str),
            Some("https://op.example.com/server")
        );
    }

    fn v1_positive(identity: &str) -> Parameters {
        let rt = return_to();
        params(&[
            (keys::MODE, modes::ID_RES),
            (keys::IDENTITY, identity),
            (keys::RETURN_TO, &rt),
            (keys::ASSOC_HANDLE, "h1"),
            (keys::SIGNED, "return_to,identity"),
            (keys::SIG, "good"),
        ])
    }

    #[tokio::test]
    async fn v1_assertion_for_the_sent_identity_is_authenticated() {
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(
                &v1_positive("https://op.example.com/u/alice"),
                &v1_round(),
                VerificationStage::Final,
            )
            .await
            .unwrap();

        assert_eq!(response.status(), AuthenticationStatus::Authenticated);
        assert_eq!(response.claimed_identity(), Some("https://alice.example.org/"));
    }

    #[tokio::test]
    async fn v1_assertion_for_another_local_identity_fails() {
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(
                &v1_positive("https://op.example.com/u/bob"),
                &v1_round(),
                VerificationStage::Final,
            )
            .await
            .unwrap();

        assert_eq!(response.status(), AuthenticationStatus::Failed);
        assert!(response.message().unwrap().contains("local identity"));
    }

    #[tokio::test]
    async fn v2_request_answered_in_v1_shape_fails() {
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(
                &v1_positive("https://alice.example.org/"),
                &round(),
                VerificationStage::Final,
            )
            .await
            .unwrap();

        assert_eq!(response.status(), AuthenticationStatus::Failed);
        assert!(response.message().unwrap().contains("request was sent as OpenID 2.0"));
    }

    #[tokio::test]
    async fn v2_assertion_for_another_local_identity_fails() {
        let mut p = positive("good");
        p.insert(
            keys::IDENTITY.to_owned(),
            "https://mallory.example.org/".to_owned(),
        );
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(&p, &round(), VerificationStage::Final)
            .await
            .unwrap();
        assert_eq!(response.status(), AuthenticationStatus::Failed);
    }

    #[tokio::test]
    async fn tampered_signature_fails_without_raising() {
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(&positive("forged"), &round(), VerificationStage::Final)
            .await
            .unwrap();

        assert_eq!(response.status(), AuthenticationStatus::Failed);
        assert!(response.message().unwrap().contains("signature"));
    }

    #[tokio::test]
    async fn altered_return_to_argument_fails() {
        let mut p = positive("good");
        p.insert(
            keys::RETURN_TO.to_owned(),
            format!("https://rp.example.net/login?index=1&rp.round={ROUND}"),
        );
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(&p, &round(), VerificationStage::Final)
            .await
            .unwrap();
        assert_eq!(response.status(), AuthenticationStatus::Failed);
    }

    #[tokio::test]
    async fn assertion_from_another_endpoint_fails() {
        let mut p = positive("good");
        p.insert(keys::OP_ENDPOINT.to_owned(), "https://evil.example.com/".to_owned());
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(&p, &round(), VerificationStage::Final)
            .await
            .unwrap();
        assert_eq!(response.status(), AuthenticationStatus::Failed);
    }

    async fn classify(pairs: &[(&str, &str)]) -> AuthenticationResponse {
        Verifier::new(Arc::new(SigPlugin))
            .verify(&params(pairs), &round(), VerificationStage::Preliminary)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn negative_modes_are_classified() {
        let cancel = classify(&[(keys::MODE, modes::CANCEL)]).await;
        assert_eq!(cancel.status(), AuthenticationStatus::Canceled);

        let setup = classify(&[(keys::NS, OPENID2_NS), (keys::MODE, modes::SETUP_NEEDED)]).await;
        assert_eq!(setup.status(), AuthenticationStatus::SetupRequired);

        let v1_setup = classify(&[
            (keys::MODE, modes::ID_RES),
            (keys::USER_SETUP_URL, "https://op.example.com/setup"),
        ])
        .await;
        assert_eq!(v1_setup.status(), AuthenticationStatus::SetupRequired);

        let error = classify(&[(keys::MODE, modes::ERROR), (keys::ERROR, "boom")]).await;
        assert_eq!(error.status(), AuthenticationStatus::Failed);
        assert_eq!(error.message(), Some("boom"));
        assert_eq!(error.claimed_identity(), Some("https://alice.example.org/"));
    }

    #[tokio::test]
    async fn reply_for_unknown_round_fails() {
        let mut p = positive("good");
        p.insert(callback::ROUND.to_owned(), Uuid::from_u128(7).to_string());
        let response = Verifier::new(Arc::new(SigPlugin))
            .verify(&p, &round(), VerificationStage::Final)
            .await
            .unwrap();
        assert_eq!(response.status(), AuthenticationStatus::Failed);
    }

    #[test]
    fn unparseable_input_is_a_protocol_error() {
        let mut missing_mode = positive("good");
        missing_mode.remove(keys::MODE);
        assert!(matches!(
            parse_indirect_response(&missing_mode),
            Err(DomainError::Protocol(_))
        ));

        let mut missing_sig = positive("good");
        missing_sig.remove(keys::SIG);
        assert!(matches!(
            parse_indirect_response(&missing_sig),
            Err(DomainError::Protocol(_))
        ));

        let mut bad_index = positive("good");
        bad_index.insert(callback::INDEX.to_owned(), "first".to_owned());
        assert!(matches!(
            parse_indirect_response(&bad_index),
            Err(DomainError::Protocol(_))
        ));

        let unknown_mode = params(&[(keys::MODE, "checkid_setup")]);
        assert!(matches!(
            parse_indirect_response(&unknown_mode),
            Err(DomainError::Protocol(_))
        ));
    }
}
