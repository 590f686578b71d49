//! Domain errors for the `OpenID` relying party.

use openid_rp_sdk::OpenIdRpError;

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("discovery of '{identifier}' failed: {reason}")]
    Discovery { identifier: String, reason: String },

    #[error("malformed provider response: {0}")]
    Protocol(String),

    #[error("extension binding conflict: {0}")]
    RegistrationConflict(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("plugin not available: {0}")]
    PluginUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<url::ParseError> for DomainError {
    fn from(e: url::ParseError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<OpenIdRpError> for DomainError {
    fn from(e: OpenIdRpError) -> Self {
        match e {
            OpenIdRpError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            OpenIdRpError::Discovery(reason) => Self::Discovery {
                identifier: "unknown".to_owned(),
                reason,
            },
            OpenIdRpError::Protocol(msg) => Self::Protocol(msg),
            OpenIdRpError::RegistrationConflict(msg) => Self::RegistrationConflict(msg),
            OpenIdRpError::ServiceUnavailable(msg) => Self::PluginUnavailable(msg),
            OpenIdRpError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<DomainError> for OpenIdRpError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            DomainError::Discovery { identifier, reason } => {
                Self::Discovery(format!("'{identifier}': {reason}"))
            }
            DomainError::Protocol(msg) => Self::Protocol(msg),
            DomainError::RegistrationConflict(msg) => Self::RegistrationConflict(msg),
            DomainError::PluginUnavailable(msg) => Self::ServiceUnavailable(msg),
            DomainError::Config(reason) | DomainError::Internal(reason) => Self::Internal(reason),
        }
    }
}
