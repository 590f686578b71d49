//! Realm and return-to validation.
//!
//! Everything here runs once, when the module is initialized. A request is
//! never built from a realm or return-to URL that has not been validated.

use std::fmt;

use url::Url;

use super::error::DomainError;

const APP_RELATIVE: &str = "~/";
const WILDCARD: &str = "*.";

/// A validated realm, possibly covering every subdomain of its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    url: Url,
    wildcard: bool,
}

impl Realm {
    /// Parse an absolute realm such as `https://*.example.com/app/`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Config`] if the value is not an absolute
    /// http(s) URL, has no host, or carries a fragment.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let (wildcard, text) = if let Some((scheme, rest)) = value.split_once("://")
            && let Some(host) = rest.strip_prefix(WILDCARD)
        {
            (true, format!("{scheme}://{host}"))
        } else {
            (false, value.to_owned())
        };

        let url = Url::parse(&text)
            .map_err(|e| DomainError::Config(format!("realm '{value}' is not a URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::Config(format!(
                "realm '{value}' must use http or https"
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(DomainError::Config(format!("realm '{value}' has no host")));
        }
        if url.fragment().is_some() {
            return Err(DomainError::Config(format!(
                "realm '{value}' must not carry a fragment"
            )));
        }

        Ok(Self { url, wildcard })
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Take scheme and port from `other`, as providers require them to match
    /// the return-to URL exactly.
    fn align_with(&mut self, other: &Url) -> Result<(), DomainError> {
        let mut url = self.url.clone();
        url.set_scheme(other.scheme()).map_err(|()| {
            DomainError::Config(format!("cannot align realm scheme with '{other}'"))
        })?;
        url.set_port(other.port()).map_err(|()| {
            DomainError::Config(format!("cannot align realm port with '{other}'"))
        })?;
        self.url = url;
        Ok(())
    }

    /// Whether `return_to` falls under this realm.
    #[must_use]
    pub fn contains(&self, return_to: &Url) -> bool {
        if self.url.scheme() != return_to.scheme()
            || self.url.port_or_known_default() != return_to.port_or_known_default()
        {
            return false;
        }

        let (Some(realm_host), Some(host)) = (self.url.host_str(), return_to.host_str()) else {
            return false;
        };
        let host_matches = if self.wildcard {
            host.eq_ignore_ascii_case(realm_host)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", realm_host.to_ascii_lowercase()))
        } else {
            host.eq_ignore_ascii_case(realm_host)
        };
        if !host_matches {
            return false;
        }

        let prefix = self.url.path();
        let path = return_to.path();
        path == prefix
            || (prefix.ends_with('/') && path.starts_with(prefix))
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Wire form sent in `openid.realm`, wildcard included.
impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            f.write_str(&self.url.as_str().replacen("://", "://*.", 1))
        } else {
            f.write_str(self.url.as_str())
        }
    }
}

/// Resolved realm and return-to URL every request of the module shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnContext {
    realm: Realm,
    return_to: Url,
}

impl ReturnContext {
    /// Resolve `~/` against `site_url`, align the realm with the return-to
    /// URL and check that the return-to URL lies under the realm.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Config`] for a malformed site URL, realm or
    /// return-to URL, or for a return-to URL outside the realm.
    pub fn new(site_url: &str, realm: &str, return_to: &str) -> Result<Self, DomainError> {
        let mut site = Url::parse(site_url)
            .map_err(|e| DomainError::Config(format!("site_url '{site_url}' is not a URL: {e}")))?;
        if !site.path().ends_with('/') {
            let path = format!("{}/", site.path());
            site.set_path(&path);
        }

        let return_to = if return_to.is_empty() {
            site.clone()
        } else {
            resolve(&site, return_to)?
        };

        let realm_text = match realm.strip_prefix(APP_RELATIVE) {
            Some(rest) => site
                .join(rest)
                .map_err(|e| DomainError::Config(format!("realm '{realm}' is invalid: {e}")))?
                .to_string(),
            None => realm.to_owned(),
        };
        let mut realm = Realm::parse(&realm_text)?;
        realm.align_with(&return_to)?;

        if !realm.contains(&return_to) {
            return Err(DomainError::Config(format!(
                "return_to '{return_to}' is not under realm '{realm}'"
            )));
        }

        Ok(Self { realm, return_to })
    }

    #[must_use]
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    #[must_use]
    pub fn return_to(&self) -> &Url {
        &self.return_to
    }
}

fn resolve(site: &Url, value: &str) -> Result<Url, DomainError> {
    let resolved = match value.strip_prefix(APP_RELATIVE) {
        Some(rest) => site.join(rest),
        None => site.join(value),
    };
    resolved.map_err(|e| DomainError::Config(format!("return_to '{value}' is invalid: {e}")))
}
