//! Boot-time provisioning state machine.
//!
//! ```text
//! AwaitingCredentials ──(no usable record)──────────────▶ SetupFallback
//!         │
//!         └──(record)──▶ Connecting ──(joined)──────────▶ Connected
//!                              └──(failed / timed out)──▶ SetupFallback
//! ```
//!
//! With `wifi.mode = "access_point"` and a stored record the bridge skips the
//! join and is `Connected` over its own access point.
//!
//! The machine runs once per boot.  Portal actions (save / retry / clear) do
//! not move it in-process; they persist or clear the record and ask for a
//! restart, and the next boot starts over from `AwaitingCredentials`.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{LinkKind, ProvisioningMode, WifiConfig, WifiCredentials, WifiMode};

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Error type for network bring-up.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The network could not be joined.
    #[error("failed to join network '{ssid}': {reason}")]
    JoinFailed { ssid: String, reason: String },

    /// The access point could not be started.
    #[error("failed to start access point '{ssid}': {reason}")]
    AccessPointFailed { ssid: String, reason: String },
}

/// Brings the network interface up.
///
/// Infrastructure implementations talk to the host; test implementations
/// record calls and simulate slow or failing joins.
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Joins the network named in `credentials` and returns the address the
    /// bridge obtained on it.
    async fn join(&self, credentials: &WifiCredentials) -> Result<Ipv4Addr, LinkError>;

    /// Hosts an access point and returns the bridge's address on it.
    async fn start_access_point(&self, ssid: &str, password: &str) -> Result<Ipv4Addr, LinkError>;
}

/// Error type for the credential record.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file-system error other than "not found".
    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record exists but is not a valid `{ssid, password}` object.
    #[error("credential record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Durable storage of the single [`WifiCredentials`] record.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Returns the stored record, or `None` when nothing is stored.
    fn load(&self) -> Result<Option<WifiCredentials>, StoreError>;

    /// Replaces the stored record.
    fn save(&self, credentials: &WifiCredentials) -> Result<(), StoreError>;

    /// Deletes the stored record.  Deleting an absent record succeeds.
    fn clear(&self) -> Result<(), StoreError>;
}

// ── Boot ──────────────────────────────────────────────────────────────────────

/// Outcome of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Final mode: `Connected` or `SetupFallback`.
    pub mode: ProvisioningMode,
    pub link: LinkKind,
    /// The bridge's IPv4 address on `link`.
    pub address: Ipv4Addr,
    /// Network name pre-filled on the setup page.
    pub portal_ssid: String,
    /// Every mode entered, in order, starting with `AwaitingCredentials`.
    pub transitions: Vec<ProvisioningMode>,
}

/// Runs the provisioning state machine once.
///
/// An unreadable record is logged and treated as absent.  A join that fails or
/// exceeds `wifi.connect_timeout()` falls back to setup mode.
///
/// # Errors
///
/// Returns [`LinkError`] only when the access point itself cannot be started,
/// since then the bridge is unreachable in every mode.
pub async fn boot(
    store: &dyn CredentialStore,
    link: &dyn NetworkLink,
    wifi: &WifiConfig,
) -> Result<BootReport, LinkError> {
    let mut transitions = vec![ProvisioningMode::AwaitingCredentials];

    let stored = match store.load() {
        Ok(record) => record.filter(WifiCredentials::is_usable),
        Err(e) => {
            warn!("ignoring stored Wi-Fi credentials: {e}");
            None
        }
    };

    let portal_ssid = stored
        .as_ref()
        .map(|c| c.ssid.clone())
        .unwrap_or_else(|| wifi.default_ssid.clone());

    let Some(credentials) = stored else {
        info!("no stored Wi-Fi credentials; entering setup mode");
        return enter_setup(link, wifi, transitions, portal_ssid).await;
    };

    if wifi.mode == WifiMode::AccessPoint {
        let address = link
            .start_access_point(&wifi.ap_ssid, &wifi.ap_password)
            .await?;
        info!("access point '{}' up at {address}", wifi.ap_ssid);
        transitions.push(ProvisioningMode::Connected);
        return Ok(BootReport {
            mode: ProvisioningMode::Connected,
            link: LinkKind::AccessPoint,
            address,
            portal_ssid,
            transitions,
        });
    }

    transitions.push(ProvisioningMode::Connecting);
    info!("connecting to Wi-Fi network '{}'", credentials.ssid);

    match tokio::time::timeout(wifi.connect_timeout(), link.join(&credentials)).await {
        Ok(Ok(address)) => {
            info!("connected to '{}', address {address}", credentials.ssid);
            transitions.push(ProvisioningMode::Connected);
            Ok(BootReport {
                mode: ProvisioningMode::Connected,
                link: LinkKind::Station,
                address,
                portal_ssid,
                transitions,
            })
        }
        Ok(Err(e)) => {
            warn!("{e}; check credentials");
            enter_setup(link, wifi, transitions, portal_ssid).await
        }
        Err(_) => {
            warn!(
                "Wi-Fi connect timeout after {} ms",
                wifi.connect_timeout().as_millis()
            );
            enter_setup(link, wifi, transitions, portal_ssid).await
        }
    }
}

async fn enter_setup(
    link: &dyn NetworkLink,
    wifi: &WifiConfig,
    mut transitions: Vec<ProvisioningMode>,
    portal_ssid: String,
) -> Result<BootReport, LinkError> {
    transitions.push(ProvisioningMode::SetupFallback);
    let address = link
        .start_access_point(&wifi.ap_ssid, &wifi.ap_password)
        .await?;
    info!(
        "setup mode: connect to '{}' and open http://{address}/",
        wifi.ap_ssid
    );
    Ok(BootReport {
        mode: ProvisioningMode::SetupFallback,
        link: LinkKind::AccessPoint,
        address,
        portal_ssid,
        transitions,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::domain::ProvisioningMode::*;

    const STATION_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);
    const AP_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Joins after `join_delay`, or fails when `join_fails` is set.
    #[derive(Default)]
    struct RecordingLink {
        joins: AtomicUsize,
        access_points: AtomicUsize,
        join_delay: Duration,
        join_fails: bool,
    }

    #[async_trait]
    impl NetworkLink for RecordingLink {
        async fn join(&self, credentials: &WifiCredentials) -> Result<Ipv4Addr, LinkError> {
            self.joins.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.join_delay).await;
            if self.join_fails {
                return Err(LinkError::JoinFailed {
                    ssid: credentials.ssid.clone(),
                    reason: "injected failure".to_string(),
                });
            }
            Ok(STATION_ADDR)
        }

        async fn start_access_point(
            &self,
            _ssid: &str,
            _password: &str,
        ) -> Result<Ipv4Addr, LinkError> {
            self.access_points.fetch_add(1, Ordering::SeqCst);
            Ok(AP_ADDR)
        }
    }

    fn store_with(record: Option<WifiCredentials>) -> MockCredentialStore {
        let mut store = MockCredentialStore::new();
        store.expect_load().return_once(move || Ok(record));
        store
    }

    fn home() -> WifiCredentials {
        WifiCredentials::new("Home", "secret")
    }

    // ── Setup fallback ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_no_record_enters_setup_without_joining() {
        // Arrange
        let store = store_with(None);
        let link = RecordingLink::default();

        // Act
        let report = boot(&store, &link, &WifiConfig::default()).await.unwrap();

        // Assert
        assert_eq!(report.mode, SetupFallback);
        assert_eq!(report.transitions, vec![AwaitingCredentials, SetupFallback]);
        assert_eq!(report.link, LinkKind::AccessPoint);
        assert_eq!(report.address, AP_ADDR);
        assert_eq!(link.joins.load(Ordering::SeqCst), 0);
        assert_eq!(link.access_points.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_record_portal_shows_configured_default_ssid() {
        let store = store_with(None);
        let wifi = WifiConfig {
            default_ssid: "Factory".to_string(),
            ..WifiConfig::default()
        };

        let report = boot(&store, &RecordingLink::default(), &wifi).await.unwrap();

        assert_eq!(report.portal_ssid, "Factory");
    }

    #[tokio::test]
    async fn test_empty_ssid_record_counts_as_absent() {
        let store = store_with(Some(WifiCredentials::new("", "x")));
        let link = RecordingLink::default();

        let report = boot(&store, &link, &WifiConfig::default()).await.unwrap();

        assert_eq!(report.mode, SetupFallback);
        assert_eq!(link.joins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_record_counts_as_absent() {
        // Arrange
        let mut store = MockCredentialStore::new();
        store.expect_load().return_once(|| {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        });
        let link = RecordingLink::default();

        // Act
        let report = boot(&store, &link, &WifiConfig::default()).await.unwrap();

        // Assert
        assert_eq!(report.mode, SetupFallback);
        assert_eq!(link.joins.load(Ordering::SeqCst), 0);
    }

    // ── Station join ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_record_and_successful_join_is_connected() {
        let store = store_with(Some(home()));
        let link = RecordingLink::default();

        let report = boot(&store, &link, &WifiConfig::default()).await.unwrap();

        assert_eq!(report.mode, Connected);
        assert_eq!(report.transitions, vec![AwaitingCredentials, Connecting, Connected]);
        assert_eq!(report.link, LinkKind::Station);
        assert_eq!(report.address, STATION_ADDR);
        assert_eq!(report.portal_ssid, "Home");
        assert_eq!(link.access_points.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_exceeding_timeout_falls_back_to_setup() {
        // Arrange: the join takes longer than the 15 s default timeout
        let store = store_with(Some(home()));
        let link = RecordingLink {
            join_delay: Duration::from_secs(60),
            ..RecordingLink::default()
        };

        // Act
        let report = boot(&store, &link, &WifiConfig::default()).await.unwrap();

        // Assert
        assert_eq!(report.mode, SetupFallback);
        assert_eq!(
            report.transitions,
            vec![AwaitingCredentials, Connecting, SetupFallback]
        );
        assert_eq!(link.joins.load(Ordering::SeqCst), 1);
        assert_eq!(link.access_points.load(Ordering::SeqCst), 1);
        // The stored name is still offered on the setup page.
        assert_eq!(report.portal_ssid, "Home");
    }

    #[tokio::test]
    async fn test_failed_join_falls_back_to_setup() {
        let store = store_with(Some(home()));
        let link = RecordingLink {
            join_fails: true,
            ..RecordingLink::default()
        };

        let report = boot(&store, &link, &WifiConfig::default()).await.unwrap();

        assert_eq!(
            report.transitions,
            vec![AwaitingCredentials, Connecting, SetupFallback]
        );
    }

    // ── Forced access point ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_forced_access_point_with_record_is_connected_over_ap() {
        // Arrange
        let store = store_with(Some(home()));
        let link = RecordingLink::default();
        let wifi = WifiConfig {
            mode: WifiMode::AccessPoint,
            ..WifiConfig::default()
        };

        // Act
        let report = boot(&store, &link, &wifi).await.unwrap();

        // Assert
        assert_eq!(report.mode, Connected);
        assert_eq!(report.link, LinkKind::AccessPoint);
        assert_eq!(report.transitions, vec![AwaitingCredentials, Connected]);
        assert_eq!(link.joins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forced_access_point_without_record_is_setup() {
        let store = store_with(None);
        let wifi = WifiConfig {
            mode: WifiMode::AccessPoint,
            ..WifiConfig::default()
        };

        let report = boot(&store, &RecordingLink::default(), &wifi).await.unwrap();

        assert_eq!(report.mode, SetupFallback);
    }
}
