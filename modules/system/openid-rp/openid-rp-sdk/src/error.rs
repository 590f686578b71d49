//! Error types for the `OpenID` relying party module.

use thiserror::Error;

/// Errors that can occur when using the `OpenID` relying party API.
///
/// Discovery and verification problems normally travel as data
/// ([`crate::DiscoveryResult::error`], [`crate::AuthenticationStatus::Failed`]);
/// the variants below are what callers see when an entry point is misused or
/// the inbound payload cannot be understood at all.
#[derive(Debug, Error)]
pub enum OpenIdRpError {
    /// A null/empty identifier or another malformed argument was passed in.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The identifier could not be resolved to endpoints.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// The inbound result payload is structurally unparseable.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An extension binding collides with an existing one.
    #[error("extension registration conflict: {0}")]
    RegistrationConflict(String),

    /// The plugin is not available yet.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Reasons an assertion fails cryptographic or structural verification.
///
/// Never surfaced as an error to callers: the verifier downgrades it to a
/// `Failed` response carrying the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("signature does not match the signed fields")]
    SignatureMismatch,

    #[error("unknown association handle '{0}'")]
    UnknownAssociation(String),

    #[error("field '{0}' is not covered by the signature")]
    UnsignedField(String),

    #[error("response nonce has already been used")]
    NonceReplayed,

    #[error("invalid response nonce: {0}")]
    InvalidNonce(String),

    #[error("{0}")]
    Rejected(String),
}

impl VerificationFailure {
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}
