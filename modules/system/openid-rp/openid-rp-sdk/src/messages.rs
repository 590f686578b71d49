//! Typed messages exchanged between the orchestrator and its UI host.
//!
//! The orchestrator never touches frames or windows itself. It emits
//! [`HostMessage`]s on a channel and the host turns them into whatever
//! cross-context mechanism it uses. For a single delivered response the
//! messages always arrive in this order:
//!
//! 1. one [`HostMessage::Assign`] per registered extension binding, in
//!    registration order;
//! 2. [`HostMessage::UnconfirmedPositiveAssertion`], only for `Authenticated`;
//! 3. exactly one terminal [`HostMessage::AuthResult`];
//! 4. [`HostMessage::CloseSource`], only when the receiving context is a popup.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::AuthenticationStatus;

/// Kind of background context that physically received a provider reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    /// Hidden frame, kept alive for later attempts.
    Frame,
    /// Popup window, torn down after delivery.
    Popup,
}

impl ContextKind {
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Popup)
    }
}

/// Named back-reference to the context awaiting a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingContext {
    pub kind: ContextKind,
    pub handle: String,
}

impl WaitingContext {
    /// Resolve the handle the waiting page listens on.
    ///
    /// A popup reaches its opener through a `waiting_`-prefixed handle so it
    /// never collides with the frame-side name.
    #[must_use]
    pub fn new(source: ContextKind, handle_name: &str) -> Self {
        let handle = match source {
            ContextKind::Frame => handle_name.to_owned(),
            ContextKind::Popup => format!("waiting_{handle_name}"),
        };
        Self {
            kind: source,
            handle,
        }
    }
}

/// A notification or instruction for the UI host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// A request is about to be dispatched to a provider.
    LoggingIn {
        index: usize,
        endpoint: Url,
        claimed_identity: String,
    },
    /// Pre-assignment of extension data on the waiting context's result object.
    Assign {
        target: WaitingContext,
        property: String,
        /// `Null` stands for "absent".
        value: serde_json::Value,
    },
    /// A positive assertion arrived. Observers must not treat the identity
    /// as verified until the following [`HostMessage::AuthResult`].
    UnconfirmedPositiveAssertion {
        target: WaitingContext,
        claimed_identity: Option<String>,
    },
    /// Terminal notification for one delivered response.
    AuthResult {
        target: WaitingContext,
        status: AuthenticationStatus,
        claimed_identity: Option<String>,
        /// Round token the page posts back so the snapshot cache can find it.
        auth_data: String,
    },
    /// Tear down the context that received the reply.
    CloseSource,
    /// A live authenticated response was observed on the page side.
    LoggedIn {
        claimed_identity: Option<String>,
        endpoint: Option<Url>,
    },
}

/// What happened to one result-delivery callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        index: usize,
        status: AuthenticationStatus,
    },
    Ignored(IgnoreReason),
}

/// Why a result-delivery callback produced no delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The reply belongs to a round that is no longer current.
    StaleRound,
    /// Another provider already delivered a positive assertion for this round.
    AlreadySettled,
}
