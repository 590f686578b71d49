//! Extension data readers for unverified positive assertions.
//!
//! A reader pulls one extension's data out of the raw assertion parameters
//! and turns it into a script-safe JSON value, so the waiting page can
//! pre-process it before the assertion is confirmed. Readers are registered
//! under a stable [`ExtensionKind`] instead of being looked up by type.

use std::fmt;

use crate::models::Parameters;

/// Stable identifier of an extension reader, e.g. `"sreg"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionKind(&'static str);

impl ExtensionKind {
    #[must_use]
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Capability interface for reading one extension out of an assertion.
pub trait ClientScriptExtension: Send + Sync {
    /// The kind this reader is registered under.
    fn kind(&self) -> ExtensionKind;

    /// Extract this extension's data, or `None` when the assertion carries none.
    fn extract(&self, raw: &Parameters) -> Option<serde_json::Value>;
}
