#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static `OpenID` Relying Party Plugin
//!
//! This plugin answers discovery from a configured identifier table and
//! verifies positive assertions against configured shared secrets. It is
//! meant for development and testing.
//!
//! ## Verification
//!
//! - Signatures are HMAC-SHA256 over the `key:value\n` form of the signed
//!   fields, base64-encoded in `openid.sig`.
//! - `OpenID` 2.0 assertions must sign `op_endpoint`, `return_to`,
//!   `response_nonce` and `assoc_handle`, plus `claimed_id` and `identity`
//!   when present.
//! - Response nonces older than `max_nonce_age` are rejected, and each one
//!   is accepted once.
//!
//! ## Configuration
//!
//! ```yaml
//! identifiers:
//!   - identifier: "alice"
//!     endpoints:
//!       - provider_uri: "https://op.example.com/server"
//!         claimed_identity: "https://alice.example.org/"
//! associations:
//!   - provider_uri: "https://op.example.com/server"
//!     handle: "h1"
//!     secret: "c2VjcmV0"
//!     lifetime: "1h"
//! max_nonce_age: "5m"
//! ```

pub mod config;
pub mod domain;

pub use config::StaticOpenIdRpPluginConfig;
pub use domain::Service;
pub use domain::signature::{response_nonce, sign_parameters};
