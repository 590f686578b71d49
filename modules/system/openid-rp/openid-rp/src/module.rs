//! `OpenID` relying party module.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use openid_rp_sdk::{ClientScriptExtension, HostMessage, OpenIdRpClient, OpenIdRpPluginClient};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;

use crate::config::OpenIdRpConfig;
use crate::domain::{OpenIdRpLocalClient, Service};

/// `OpenID` relying party module.
///
/// This module:
/// 1. Validates the realm and return-to configuration once
/// 2. Wires the plugin into request building and verification
/// 3. Opens the host channel every notification is sent on
#[derive(Default)]
pub struct OpenIdRpModule {
    service: OnceLock<Arc<Service>>,
}

impl OpenIdRpModule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the module and hand out the client and the host channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the module was
    /// already initialized.
    #[tracing::instrument(skip_all, fields(site_url = %cfg.site_url))]
    pub fn init(
        &self,
        cfg: &OpenIdRpConfig,
        plugin: Arc<dyn OpenIdRpPluginClient>,
    ) -> anyhow::Result<(Arc<dyn OpenIdRpClient>, UnboundedReceiver<HostMessage>)> {
        info!(realm = %cfg.realm, handle_name = %cfg.handle_name, "Initializing openid_rp");

        let (sender, receiver) = mpsc::unbounded_channel();
        let svc = Arc::new(Service::new(cfg, plugin, sender)?);
        info!(
            realm = %svc.return_context().realm(),
            return_to = %svc.return_context().return_to(),
            "Resolved return context"
        );

        let api: Arc<dyn OpenIdRpClient> = Arc::new(OpenIdRpLocalClient::new(svc.clone()));

        self.service
            .set(svc)
            .map_err(|_| anyhow::anyhow!("Service already initialized"))?;

        Ok((api, receiver))
    }

    /// Bind an extension reader to a property of the waiting context's result.
    ///
    /// # Errors
    ///
    /// Returns an error before `init()`, for a blank property or for a kind
    /// or property that is already bound.
    pub fn register_extension(
        &self,
        extension: Arc<dyn ClientScriptExtension>,
        property: &str,
    ) -> anyhow::Result<()> {
        self.service()?.register_extension(extension, property)?;
        Ok(())
    }

    /// How long the host should wait on a silent attempt.
    ///
    /// # Errors
    ///
    /// Returns an error before `init()`.
    pub fn timeout(&self) -> anyhow::Result<Duration> {
        Ok(self.service()?.timeout())
    }

    fn service(&self) -> anyhow::Result<&Arc<Service>> {
        self.service
            .get()
            .ok_or_else(|| anyhow::anyhow!("openid_rp is not initialized"))
    }
}
