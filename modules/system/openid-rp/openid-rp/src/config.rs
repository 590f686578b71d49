//! Configuration for the `OpenID` relying party.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Prefix of environment variables overriding file configuration,
/// e.g. `OPENID_RP__HANDLE_NAME`.
pub const ENV_PREFIX: &str = "OPENID_RP__";

/// Configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenIdRpConfig {
    /// Absolute base URL of the hosting site. `~/` in `realm` and
    /// `return_to` resolves against it.
    pub site_url: String,

    /// Realm presented to providers. App-relative (`~/`) or absolute; the
    /// host may start with `*.` to cover subdomains.
    pub realm: String,

    /// Page providers send the user agent back to. Empty means the site URL.
    pub return_to: String,

    /// Name of the result handle the waiting page listens on.
    pub handle_name: String,

    /// How long the page waits on a silent attempt before offering an
    /// interactive one. Only exposed to the host, never awaited here.
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    /// Built-in extension readers and the result property each one fills.
    pub extensions: Vec<ExtensionConfig>,
}

impl Default for OpenIdRpConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:8080/".to_owned(),
            realm: "~/".to_owned(),
            return_to: String::new(),
            handle_name: "openid_identifier".to_owned(),
            timeout: Duration::from_secs(8),
            extensions: Vec::new(),
        }
    }
}

/// Built-in extension reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionReader {
    /// Simple Registration 1.0 / 1.1.
    Sreg,
    /// Attribute Exchange fetch response.
    Ax,
}

/// Binds a built-in extension reader to a result property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
    pub kind: ExtensionReader,
    pub property: String,
}

impl OpenIdRpConfig {
    /// Layer defaults, an optional YAML file and `OPENID_RP__*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value does not
    /// deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let cfg: Self = figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
        Ok(cfg)
    }

    /// Checks that do not need URL resolution.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Config`] for an empty handle name or a zero timeout.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.handle_name.trim().is_empty() {
            return Err(DomainError::Config("handle_name must not be empty".to_owned()));
        }
        if self.timeout.is_zero() {
            return Err(DomainError::Config("timeout must be positive".to_owned()));
        }
        Ok(())
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
