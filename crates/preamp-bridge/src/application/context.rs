//! Shared state handed to every connection task.

use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::info;

use crate::application::broadcast::BroadcastHub;
use crate::application::portal::AssetStore;
use crate::application::provisioning::{BootReport, CredentialStore};
use crate::application::serial_bridge::SerialBridge;
use crate::domain::{BridgeConfig, ProvisioningMode};

/// Everything a request handler or WebSocket session needs for one boot.
///
/// Built once per boot after provisioning finishes and shared behind an
/// `Arc`.  A restart drops the whole context and builds a fresh one.
pub struct BridgeContext {
    pub config: BridgeConfig,
    pub boot: BootReport,
    pub serial: SerialBridge,
    /// Normalised commands waiting to be written to the controller.
    pub commands: mpsc::Sender<String>,
    pub credentials: Arc<dyn CredentialStore>,
    pub assets: Arc<dyn AssetStore>,
    restart: Arc<Notify>,
}

impl BridgeContext {
    pub fn new(
        config: BridgeConfig,
        boot: BootReport,
        serial: SerialBridge,
        commands: mpsc::Sender<String>,
        credentials: Arc<dyn CredentialStore>,
        assets: Arc<dyn AssetStore>,
        restart: Arc<Notify>,
    ) -> Self {
        Self {
            config,
            boot,
            serial,
            commands,
            credentials,
            assets,
            restart,
        }
    }

    pub fn mode(&self) -> ProvisioningMode {
        self.boot.mode
    }

    pub fn hub(&self) -> &BroadcastHub {
        self.serial.hub()
    }

    /// Waits `http.restart_grace_ms`, then signals the boot loop to restart.
    pub async fn restart_after_grace(&self) {
        tokio::time::sleep(self.config.http.restart_grace()).await;
        info!("restarting bridge");
        self.restart.notify_one();
    }
}
