//! One boot of the bridge: provisioning, then every long-running task.
//!
//! [`start_boot`] runs the provisioning state machine, builds the per-boot
//! [`BridgeContext`], and spawns the HTTP server, the serial line pump, the
//! startup sync and (when on a joined network) the mDNS responder into the
//! caller's `JoinSet`.  Shutting that set down ends the boot; `main` then
//! calls `start_boot` again to restart from persisted state.
//!
//! The serial device itself is not part of a boot: [`start_serial_link`] opens
//! it once and every boot shares the resulting [`SerialLink`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::application::{
    boot, AssetStore, BootReport, BridgeContext, BroadcastHub, CredentialStore, NameResponder,
    NetworkLink, SerialBridge,
};
use crate::domain::{BridgeConfig, LinkKind, ProvisioningMode, SerialConfig};
use crate::infrastructure::assets::DirAssetStore;
use crate::infrastructure::http_server::{bind_listener, run_server};
use crate::infrastructure::mdns::{bind_multicast, group_addr, run_responder, MDNS_PORT};
use crate::infrastructure::network_link::HostNetworkLink;
use crate::infrastructure::serial::{startup_sync, SerialLink};
use crate::infrastructure::storage::JsonCredentialStore;

/// The seams a boot runs against.
#[derive(Clone)]
pub struct BootServices {
    pub credentials: Arc<dyn CredentialStore>,
    pub link: Arc<dyn NetworkLink>,
    pub assets: Arc<dyn AssetStore>,
    /// `None` when the controller's device could not be opened.
    pub serial: Option<SerialLink>,
}

impl BootServices {
    /// The file- and host-backed implementations named by `config`, plus the
    /// already opened serial link.
    pub fn from_config(config: &BridgeConfig, serial: Option<SerialLink>) -> Self {
        Self {
            credentials: Arc::new(JsonCredentialStore::new(&config.wifi.credentials_file)),
            link: Arc::new(HostNetworkLink::new(
                &config.wifi.hostname,
                config.wifi.ap_address,
            )),
            assets: Arc::new(DirAssetStore::new(&config.web.asset_dir)),
            serial,
        }
    }
}

/// A running boot.
pub struct Boot {
    pub context: Arc<BridgeContext>,
    /// The address the HTTP listener actually bound.
    pub http_addr: SocketAddr,
}

/// Opens the controller's device for the lifetime of the process.
///
/// Returns `None` after logging a warning when the device is unavailable; the
/// bridge then runs without the controller link.
pub async fn start_serial_link(config: &SerialConfig, tasks: &mut JoinSet<()>) -> Option<SerialLink> {
    match SerialLink::start(config, tasks).await {
        Ok(link) => Some(link),
        Err(e) => {
            warn!("{e}; running without the controller link");
            None
        }
    }
}

/// Provisions the network and starts every task of one boot in `tasks`.
///
/// The mDNS socket is optional: if it cannot be bound the bridge logs a
/// warning and runs without it.
///
/// # Errors
///
/// Fails if the access point cannot be started or the HTTP listener cannot
/// be bound.
pub async fn start_boot(
    config: BridgeConfig,
    services: &BootServices,
    tasks: &mut JoinSet<()>,
    restart: Arc<Notify>,
) -> anyhow::Result<Boot> {
    let report = boot(services.credentials.as_ref(), services.link.as_ref(), &config.wifi)
        .await
        .context("network bring-up failed")?;
    info!(
        "boot finished in mode {} on {}",
        report.mode, report.address
    );

    let serial = SerialBridge::new(Arc::new(BroadcastHub::new()));
    let commands = attach_serial(&config, services.serial.as_ref(), &serial, tasks);
    start_mdns(&config, &report, tasks);

    let bind_addr = config
        .http
        .bind_addr()
        .with_context(|| format!("invalid HTTP bind address '{}'", config.http.bind_address))?;
    let listener = bind_listener(bind_addr).await?;
    let http_addr = listener
        .local_addr()
        .context("failed to read HTTP listener address")?;

    let context = Arc::new(BridgeContext::new(
        config,
        report,
        serial,
        commands,
        Arc::clone(&services.credentials),
        Arc::clone(&services.assets),
        restart,
    ));
    tasks.spawn(run_server(listener, Arc::clone(&context)));

    Ok(Boot { context, http_addr })
}

/// Connects this boot's bridge to the shared link and returns the command
/// sender for its sessions.
fn attach_serial(
    config: &BridgeConfig,
    link: Option<&SerialLink>,
    serial: &SerialBridge,
    tasks: &mut JoinSet<()>,
) -> mpsc::Sender<String> {
    let Some(link) = link else {
        // Nobody drains this queue, so session commands fail fast.
        let (commands, _) = mpsc::channel(1);
        return commands;
    };

    tasks.spawn(link.clone().pump(serial.clone()));
    tasks.spawn(startup_sync(link.commands(), config.serial.startup_sync_delay()));
    link.commands()
}

fn start_mdns(config: &BridgeConfig, report: &BootReport, tasks: &mut JoinSet<()>) {
    let on_joined_network =
        report.link == LinkKind::Station && report.mode == ProvisioningMode::Connected;
    if !on_joined_network || !config.mdns.enabled {
        return;
    }

    match bind_multicast(MDNS_PORT) {
        Ok(socket) => {
            let responder = NameResponder::new(&config.mdns.hostname, report.address);
            tasks.spawn(run_responder(socket, responder, group_addr()));
        }
        Err(e) => warn!("mDNS disabled: {e}"),
    }
}
