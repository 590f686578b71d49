//! Service implementation for the static `OpenID` relying party plugin.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use openid_rp_sdk::protocol::keys;
use openid_rp_sdk::{
    Association, CandidateEndpoint, Parameters, PositiveAssertion, ProtocolVersion,
    VerificationFailure, VerificationStage,
};
use parking_lot::Mutex;
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use super::signature;
use crate::config::StaticOpenIdRpPluginConfig;

/// Fields an `OpenID` 2.0 assertion must always sign.
const V2_SIGNED: [&str; 4] = ["op_endpoint", "return_to", "response_nonce", "assoc_handle"];
/// Fields an `OpenID` 1.x assertion must always sign.
const V1_SIGNED: [&str; 2] = ["return_to", "identity"];

struct SharedSecret {
    provider_uri: Url,
    secret: Vec<u8>,
    lifetime: Duration,
}

/// Static `OpenID` relying party service.
///
/// Discovery comes from the identifier table; verification uses the
/// configured shared secrets and a process-local nonce ledger.
pub struct Service {
    identifiers: HashMap<String, Vec<CandidateEndpoint>>,
    /// Keyed by association handle.
    associations: HashMap<String, SharedSecret>,
    max_nonce_age: Duration,
    /// Consumed nonces and when they were issued.
    seen_nonces: Mutex<HashMap<String, OffsetDateTime>>,
}

impl Service {
    /// Create a service from plugin configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a secret is not valid base64 or an association
    /// handle is configured twice.
    pub fn from_config(cfg: &StaticOpenIdRpPluginConfig) -> anyhow::Result<Self> {
        let identifiers = cfg
            .identifiers
            .iter()
            .map(|entry| {
                let endpoints = entry
                    .endpoints
                    .iter()
                    .map(|e| CandidateEndpoint {
                        provider_uri: e.provider_uri.clone(),
                        claimed_identity: e.claimed_identity.clone(),
                        local_identity: e.local_identity.clone(),
                        version: e.version,
                    })
                    .collect();
                (entry.identifier.trim().to_owned(), endpoints)
            })
            .collect();

        let mut associations = HashMap::with_capacity(cfg.associations.len());
        for a in &cfg.associations {
            let secret = BASE64
                .decode(&a.secret)
                .with_context(|| format!("association '{}' has an invalid secret", a.handle))?;
            let shared = SharedSecret {
                provider_uri: a.provider_uri.clone(),
                secret,
                lifetime: a.lifetime,
            };
            if associations.insert(a.handle.clone(), shared).is_some() {
                anyhow::bail!("association handle '{}' is configured twice", a.handle);
            }
        }

        Ok(Self {
            identifiers,
            associations,
            max_nonce_age: cfg.max_nonce_age,
            seen_nonces: Mutex::new(HashMap::new()),
        })
    }

    /// Endpoints for `identifier`, or `None` if it is unknown.
    #[must_use]
    pub fn discover(&self, identifier: &str) -> Option<&[CandidateEndpoint]> {
        self.identifiers.get(identifier.trim()).map(Vec::as_slice)
    }

    /// The association configured for `provider_uri`, if any.
    #[must_use]
    pub fn association_for(&self, provider_uri: &Url) -> Option<Association> {
        self.associations
            .iter()
            .find(|(_, shared)| shared.provider_uri == *provider_uri)
            .map(|(handle, shared)| Association {
                handle: handle.clone(),
                lifetime: shared.lifetime,
            })
    }

    /// Check association, signed-field coverage, signature and nonce.
    ///
    /// The association must belong to `provider`, and so must `op_endpoint`
    /// when the assertion carries one.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationFailure`] found.
    pub fn verify(
        &self,
        assertion: &PositiveAssertion,
        raw: &Parameters,
        provider: &Url,
        stage: VerificationStage,
    ) -> Result<(), VerificationFailure> {
        let shared = self
            .associations
            .get(&assertion.assoc_handle)
            .ok_or_else(|| VerificationFailure::UnknownAssociation(assertion.assoc_handle.clone()))?;
        if shared.provider_uri != *provider {
            return Err(VerificationFailure::rejected(format!(
                "association '{}' does not belong to '{provider}'",
                assertion.assoc_handle
            )));
        }
        if let Some(op) = &assertion.op_endpoint
            && op != provider
        {
            return Err(VerificationFailure::rejected(format!(
                "assertion names '{op}' but was requested from '{provider}'"
            )));
        }

        for field in required_signed_fields(assertion, raw) {
            if !assertion.signed.iter().any(|s| s == field) {
                return Err(VerificationFailure::UnsignedField(field.to_owned()));
            }
        }
        signature::verify(&shared.secret, raw, &assertion.signed, &assertion.sig)?;

        if assertion.version == ProtocolVersion::V2 {
            self.check_nonce(assertion, provider, stage)?;
        }
        debug!(handle = %assertion.assoc_handle, ?stage, "Assertion verified");
        Ok(())
    }

    fn check_nonce(
        &self,
        assertion: &PositiveAssertion,
        provider: &Url,
        stage: VerificationStage,
    ) -> Result<(), VerificationFailure> {
        let nonce = assertion
            .response_nonce
            .as_deref()
            .ok_or_else(|| VerificationFailure::InvalidNonce("missing".to_owned()))?;
        let issued = signature::nonce_timestamp(nonce)?;
        let now = OffsetDateTime::now_utc();
        let age = now - issued;
        if age.unsigned_abs() > self.max_nonce_age {
            return Err(VerificationFailure::InvalidNonce(if age.is_negative() {
                format!("'{nonce}' was issued in the future")
            } else {
                format!("'{nonce}' has expired")
            }));
        }

        let key = format!("{provider}|{nonce}");
        let mut seen = self.seen_nonces.lock();
        if seen.contains_key(&key) {
            return Err(VerificationFailure::NonceReplayed);
        }
        if stage == VerificationStage::Final {
            let max_age = self.max_nonce_age;
            seen.retain(|_, at| (now - *at).unsigned_abs() <= max_age);
            seen.insert(key, issued);
        }
        Ok(())
    }
}

fn required_signed_fields<'a>(
    assertion: &PositiveAssertion,
    raw: &'a Parameters,
) -> impl Iterator<Item = &'static str> + 'a {
    let base: &'static [&'static str] = match assertion.version {
        ProtocolVersion::V2 => &V2_SIGNED,
        ProtocolVersion::V1 => &V1_SIGNED,
    };
    let optional: &'static [&'static str] = match assertion.version {
        ProtocolVersion::V2 => &["claimed_id", "identity"],
        ProtocolVersion::V1 => &[],
    };
    base.iter().copied().chain(
        optional
            .iter()
            .copied()
            .filter(move |f| raw.contains_key(&format!("{}{f}", keys::PREFIX))),
    )
}
