//! Domain layer for the static `OpenID` relying party plugin.

mod client;
pub mod service;
pub mod signature;

pub use service::Service;
