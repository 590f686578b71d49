//! Wire-level constants shared by the orchestrator and its plugins.

/// Value of `openid.ns` for `OpenID` 2.0 messages.
pub const OPENID2_NS: &str = "http://specs.openid.net/auth/2.0";

/// Claimed identifier used when the provider picks the identity itself.
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// `openid.*` message keys.
pub mod keys {
    pub const NS: &str = "openid.ns";
    pub const MODE: &str = "openid.mode";
    pub const CLAIMED_ID: &str = "openid.claimed_id";
    pub const IDENTITY: &str = "openid.identity";
    pub const RETURN_TO: &str = "openid.return_to";
    pub const REALM: &str = "openid.realm";
    pub const TRUST_ROOT: &str = "openid.trust_root";
    pub const ASSOC_HANDLE: &str = "openid.assoc_handle";
    pub const OP_ENDPOINT: &str = "openid.op_endpoint";
    pub const RESPONSE_NONCE: &str = "openid.response_nonce";
    pub const SIGNED: &str = "openid.signed";
    pub const SIG: &str = "openid.sig";
    pub const USER_SETUP_URL: &str = "openid.user_setup_url";
    pub const ERROR: &str = "openid.error";

    /// Prefix every protocol key starts with.
    pub const PREFIX: &str = "openid.";
}

/// Values of `openid.mode`.
pub mod modes {
    pub const CHECKID_IMMEDIATE: &str = "checkid_immediate";
    pub const CHECKID_SETUP: &str = "checkid_setup";
    pub const ID_RES: &str = "id_res";
    pub const CANCEL: &str = "cancel";
    pub const SETUP_NEEDED: &str = "setup_needed";
    pub const ERROR: &str = "error";
}

/// Arguments appended to `return_to` so they round-trip through the provider.
pub mod callback {
    /// Zero-based position of the request within its round.
    pub const INDEX: &str = "index";
    /// Identifier of the interaction round that dispatched the request.
    pub const ROUND: &str = "rp.round";
    pub const USER_SUPPLIED_IDENTIFIER: &str = "rp.user_supplied_identifier";
    /// Provider endpoint the request went to; present even for 1.x providers.
    pub const OP_ENDPOINT: &str = "rp.op_endpoint";
    pub const CLAIMED_ID: &str = "rp.claimed_id";
    pub const PHASE: &str = "rp.phase";
}

/// Round-trip marker carried in [`callback::PHASE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The page asked for discovery of a user-supplied identifier.
    Discovery,
    /// A provider is handing an assertion back to the relying party.
    ResultDelivery,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "1",
            Self::ResultDelivery => "2",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Self::Discovery),
            "2" => Some(Self::ResultDelivery),
            _ => None,
        }
    }
}
