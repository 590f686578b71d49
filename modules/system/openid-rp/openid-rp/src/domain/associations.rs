//! Shared-secret associations already established with providers.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use openid_rp_sdk::Association;
use tracing::warn;
use url::Url;

/// Longest lifetime a cached association is trusted for.
pub const MAX_ASSOCIATION_LIFETIME: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CachedAssociation {
    handle: String,
    expires_at: Instant,
}

/// Association handles keyed by provider endpoint.
///
/// Shared by every round; entries expire with the lifetime the provider
/// granted.
#[derive(Debug, Default)]
pub struct AssociationCache {
    entries: DashMap<String, CachedAssociation>,
}

impl AssociationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live handle for `provider`, dropping it first if it has expired.
    #[must_use]
    pub fn get(&self, provider: &Url) -> Option<String> {
        let key = provider.as_str();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > Instant::now() {
                return Some(entry.handle.clone());
            }
        }
        // read guard must be gone before removing
        self.entries
            .remove_if(key, |_, cached| cached.expires_at <= Instant::now());
        None
    }

    /// Cache `association` for `provider`, clamping its lifetime to
    /// [`MAX_ASSOCIATION_LIFETIME`].
    pub fn insert(&self, provider: &Url, association: &Association) {
        let lifetime = if association.lifetime > MAX_ASSOCIATION_LIFETIME {
            warn!(
                %provider,
                handle = %association.handle,
                granted = ?association.lifetime,
                "Clamping association lifetime"
            );
            MAX_ASSOCIATION_LIFETIME
        } else {
            association.lifetime
        };
        let Some(expires_at) = Instant::now().checked_add(lifetime) else {
            warn!(
                %provider,
                handle = %association.handle,
                "Association lifetime overflows the clock; not cached"
            );
            return;
        };
        self.entries.insert(
            provider.as_str().to_owned(),
            CachedAssociation {
                handle: association.handle.clone(),
                expires_at,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
