//! Configuration for the static `OpenID` relying party plugin.

use std::time::Duration;

use openid_rp_sdk::ProtocolVersion;
use serde::{Deserialize, Deserializer};
use url::Url;

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticOpenIdRpPluginConfig {
    /// Discovery results, keyed by user-supplied identifier.
    pub identifiers: Vec<IdentifierConfig>,

    /// Shared secrets the plugin may hand out and verify signatures with.
    pub associations: Vec<AssociationConfig>,

    /// Oldest response nonce still accepted.
    #[serde(deserialize_with = "humantime_duration")]
    pub max_nonce_age: Duration,
}

impl Default for StaticOpenIdRpPluginConfig {
    fn default() -> Self {
        Self {
            identifiers: Vec::new(),
            associations: Vec::new(),
            max_nonce_age: Duration::from_secs(300),
        }
    }
}

/// Endpoints an identifier resolves to, most preferred first.
///
/// An empty list is a successful discovery with nothing usable in it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifierConfig {
    pub identifier: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub provider_uri: Url,
    pub claimed_identity: String,
    #[serde(default)]
    pub local_identity: Option<String>,
    #[serde(default)]
    pub version: ProtocolVersion,
}

/// A shared-secret association with one provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationConfig {
    pub provider_uri: Url,
    pub handle: String,
    /// Base64-encoded MAC key.
    pub secret: String,
    #[serde(
        default = "default_association_lifetime",
        deserialize_with = "humantime_duration"
    )]
    pub lifetime: Duration,
}

fn default_association_lifetime() -> Duration {
    Duration::from_secs(3600)
}

fn humantime_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(d)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}
