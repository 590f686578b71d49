//! Delivers a classified response to the context waiting for it.

use openid_rp_sdk::{
    AuthenticationResponse, AuthenticationStatus, ContextKind, HostMessage, WaitingContext,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::extensions::ExtensionBindings;

/// Emits [`HostMessage`]s on the host channel.
pub struct Correlator {
    sender: UnboundedSender<HostMessage>,
    handle_name: String,
}

impl Correlator {
    #[must_use]
    pub fn new(sender: UnboundedSender<HostMessage>, handle_name: String) -> Self {
        Self {
            sender,
            handle_name,
        }
    }

    /// Send one message; a host that stopped listening is not an error here.
    pub fn notify(&self, message: HostMessage) {
        if self.sender.send(message).is_err() {
            warn!("Host channel closed, dropping message");
        }
    }

    /// Deliver `response` from the `source` context that received it.
    ///
    /// Every binding gets an assignment, `Null` included, before the
    /// unconfirmed notice and the terminal result. A popup source is closed
    /// last.
    pub fn deliver(
        &self,
        response: &AuthenticationResponse,
        bindings: &ExtensionBindings,
        source: ContextKind,
        auth_data: &str,
    ) {
        let target = WaitingContext::new(source, &self.handle_name);

        for binding in bindings.iter() {
            self.notify(HostMessage::Assign {
                target: target.clone(),
                property: binding.property().to_owned(),
                value: response.extension_script(binding.extension()),
            });
        }

        if response.status() == AuthenticationStatus::Authenticated {
            self.notify(HostMessage::UnconfirmedPositiveAssertion {
                target: target.clone(),
                claimed_identity: response.claimed_identity().map(str::to_owned),
            });
        }

        debug!(
            handle = %target.handle,
            status = ?response.status(),
            assignments = bindings.len(),
            "Delivering result to waiting context"
        );
        self.notify(HostMessage::AuthResult {
            target,
            status: response.status(),
            claimed_identity: response.claimed_identity().map(str::to_owned),
            auth_data: auth_data.to_owned(),
        });

        self.close_if_transient(source);
    }

    pub fn close_if_transient(&self, source: ContextKind) {
        if source.is_transient() {
            self.notify(HostMessage::CloseSource);
        }
    }
}
