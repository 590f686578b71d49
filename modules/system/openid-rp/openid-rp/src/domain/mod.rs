//! Domain layer for the `OpenID` relying party.

pub mod associations;
pub mod correlator;
pub mod dedup;
pub mod error;
pub mod extensions;
pub mod local_client;
pub mod realm;
pub mod request_builder;
pub mod service;
pub mod verifier;

pub use error::DomainError;
pub use local_client::OpenIdRpLocalClient;
pub use service::Service;
