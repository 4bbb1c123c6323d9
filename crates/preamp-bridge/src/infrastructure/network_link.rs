//! Network bring-up on a host whose interfaces are managed by the OS.
//!
//! On a general-purpose host the bridge does not drive the Wi-Fi radio
//! itself: joining means "the OS is already on a network, find our address",
//! and the access point is provided by the host (for example hostapd) at a
//! configured address.
//!
//! The host name, the network credentials and the access point's ssid and
//! password are all applied by the host's network configuration.  This link
//! only reports them so the log shows what the host is expected to provide.

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::info;

use crate::application::{LinkError, NetworkLink};
use crate::domain::WifiCredentials;
use crate::infrastructure::mdns::group_addr;

/// [`NetworkLink`] for OS-managed interfaces.
///
/// `hostname` is the name the host is expected to register on the joined
/// network.
#[derive(Debug, Clone)]
pub struct HostNetworkLink {
    hostname: String,
    ap_address: Ipv4Addr,
}

impl HostNetworkLink {
    pub fn new(hostname: impl Into<String>, ap_address: Ipv4Addr) -> Self {
        Self {
            hostname: hostname.into(),
            ap_address,
        }
    }
}

#[async_trait]
impl NetworkLink for HostNetworkLink {
    async fn join(&self, credentials: &WifiCredentials) -> Result<Ipv4Addr, LinkError> {
        let join_failed = |reason: String| LinkError::JoinFailed {
            ssid: credentials.ssid.clone(),
            reason,
        };

        // Connecting a UDP socket sends nothing; it only selects the
        // outbound interface, whose address is then the local address.
        let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| join_failed(e.to_string()))?;
        probe
            .connect(group_addr())
            .await
            .map_err(|e| join_failed(format!("no route to the local network: {e}")))?;
        let local = probe
            .local_addr()
            .map_err(|e| join_failed(e.to_string()))?;

        match local.ip() {
            IpAddr::V4(addr) if !addr.is_unspecified() => {
                info!(
                    "host '{}' is on '{}' at {addr}",
                    self.hostname, credentials.ssid
                );
                Ok(addr)
            }
            other => Err(join_failed(format!("no usable IPv4 address ({other})"))),
        }
    }

    async fn start_access_point(&self, ssid: &str, password: &str) -> Result<Ipv4Addr, LinkError> {
        info!(
            "access point '{ssid}' ({}) is expected from the host at {}",
            security(password),
            self.ap_address
        );
        Ok(self.ap_address)
    }
}

/// How an access point with `password` is secured, for logging.
fn security(password: &str) -> &'static str {
    if password.is_empty() {
        "open"
    } else {
        "WPA2-PSK"
    }
}
