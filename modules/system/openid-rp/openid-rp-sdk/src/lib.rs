#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `OpenID` Relying Party SDK
//!
//! This crate provides the public API for the `openid_rp` module:
//!
//! - [`OpenIdRpClient`] - Public API trait for the hosting UI
//! - [`OpenIdRpPluginClient`] - Plugin API trait for discovery and assertion verification
//! - [`ClientScriptExtension`] - Capability trait for extension data readers
//! - [`RoundState`] - Per-interaction state owned by the host, including the snapshot cache
//! - [`OpenIdRpError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use openid_rp_sdk::{ContextKind, OpenIdRpClient, RoundState};
//!
//! let mut round = RoundState::new();
//!
//! // Discovery callback from the page
//! let discovery = rp.discover("https://alice.example.org/", &mut round).await?;
//!
//! // Later, inside the background frame that received the provider reply
//! let outcome = rp.deliver_result(&callback_url, ContextKind::Frame, &mut round).await?;
//! ```

pub mod api;
pub mod error;
pub mod extension;
pub mod messages;
pub mod models;
pub mod plugin_api;
pub mod protocol;
pub mod round;

// Re-export main types at crate root
pub use api::OpenIdRpClient;
pub use error::{OpenIdRpError, VerificationFailure};
pub use extension::{ClientScriptExtension, ExtensionKind};
pub use messages::{ContextKind, DeliveryOutcome, HostMessage, IgnoreReason, WaitingContext};
pub use models::{
    Association, AssociationPolicy, AuthenticationRequest, AuthenticationResponse,
    AuthenticationStatus, CandidateEndpoint, DiscoveredRequest, DiscoveryResult,
    DispatchedRequest, Parameters, PositiveAssertion, ProtocolVersion, RequestMode,
    ResolvedResponse, ResponseSnapshot, VerificationStage,
};
pub use plugin_api::OpenIdRpPluginClient;
pub use round::{PendingRequest, ResponseCache, RoundState};
