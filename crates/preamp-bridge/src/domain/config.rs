//! Bridge configuration schema.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is normally read from a TOML file (see
//! `infrastructure::storage::load_config`) and then patched with CLI
//! overrides in `main.rs`.
//!
//! ```toml
//! log_level = "info"
//!
//! [http]
//! port = 8080
//!
//! [serial]
//! path = "/dev/ttyUSB0"
//! baud = 115200
//!
//! [wifi]
//! mode = "station"
//! ap_ssid = "PreampBridge-Setup"
//!
//! [mdns]
//! hostname = "preamp"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a partial file (or no
//! file at all) still yields a complete, working configuration.

use std::net::{AddrParseError, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use preamp_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.http.port, 8080);
/// assert_eq!(cfg.mdns.hostname, "preamp");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub wifi: WifiConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default)]
    pub web: WebConfig,
    /// Fallback `tracing` filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP / WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Delay between answering a portal action and restarting, so the
    /// response reaches the browser first.
    #[serde(default = "default_restart_grace_ms")]
    pub restart_grace_ms: u64,
}

/// Serial link to the preamp controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    /// Device node, e.g. `/dev/ttyUSB0`.
    #[serde(default = "default_serial_path")]
    pub path: PathBuf,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Sleep between reads when the device has no data.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay before the initial `GET STATE` / `GET SELECTOR_LABELS`.
    #[serde(default = "default_startup_sync_delay_ms")]
    pub startup_sync_delay_ms: u64,
}

/// How the bridge attaches to the network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WifiMode {
    /// Join the stored network; fall back to the setup access point.
    #[default]
    Station,
    /// Always host the access point.
    AccessPoint,
}

/// Network provisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiConfig {
    #[serde(default)]
    pub mode: WifiMode,
    /// Hostname announced to the network when joining as a station.
    #[serde(default = "default_wifi_hostname")]
    pub hostname: String,
    /// Network name pre-filled on the setup page when nothing is stored.
    #[serde(default)]
    pub default_ssid: String,
    #[serde(default = "default_ap_ssid")]
    pub ap_ssid: String,
    #[serde(default = "default_ap_password")]
    pub ap_password: String,
    /// Address the bridge serves on while hosting the access point.
    #[serde(default = "default_ap_address")]
    pub ap_address: Ipv4Addr,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// JSON file holding the provisioned `{ssid, password}` record.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
}

/// Multicast DNS responder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MdnsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Answered as `<hostname>.local`.
    #[serde(default = "default_mdns_hostname")]
    pub hostname: String,
}

/// Static web UI settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// Directory holding `index.html`, `app.js` and `style.css`.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_restart_grace_ms() -> u64 {
    200
}
fn default_serial_path() -> PathBuf {
    PathBuf::from("/dev/ttyUSB0")
}
fn default_baud() -> u32 {
    115_200
}
fn default_poll_interval_ms() -> u64 {
    20
}
fn default_startup_sync_delay_ms() -> u64 {
    1500
}
fn default_wifi_hostname() -> String {
    "preamp-bridge".to_string()
}
fn default_ap_ssid() -> String {
    "PreampBridge-Setup".to_string()
}
fn default_ap_password() -> String {
    "preamp-setup".to_string()
}
fn default_ap_address() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 4, 1)
}
fn default_connect_timeout_ms() -> u64 {
    15_000
}
fn default_credentials_file() -> PathBuf {
    PathBuf::from("wifi.json")
}
fn default_true() -> bool {
    true
}
fn default_mdns_hostname() -> String {
    "preamp".to_string()
}
fn default_asset_dir() -> PathBuf {
    PathBuf::from("web")
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            serial: SerialConfig::default(),
            wifi: WifiConfig::default(),
            mdns: MdnsConfig::default(),
            web: WebConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_http_port(),
            restart_grace_ms: default_restart_grace_ms(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: default_serial_path(),
            baud: default_baud(),
            poll_interval_ms: default_poll_interval_ms(),
            startup_sync_delay_ms: default_startup_sync_delay_ms(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            mode: WifiMode::default(),
            hostname: default_wifi_hostname(),
            default_ssid: String::new(),
            ap_ssid: default_ap_ssid(),
            ap_password: default_ap_password(),
            ap_address: default_ap_address(),
            connect_timeout_ms: default_connect_timeout_ms(),
            credentials_file: default_credentials_file(),
        }
    }
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            hostname: default_mdns_hostname(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl HttpConfig {
    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind_address` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.bind_address, self.port).parse()
    }

    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.restart_grace_ms)
    }
}

impl SerialConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_sync_delay(&self) -> Duration {
        Duration::from_millis(self.startup_sync_delay_ms)
    }
}

impl WifiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_http_listener_is_all_interfaces_8080() {
        // Arrange / Act
        let cfg = BridgeConfig::default();
        // Assert
        assert_eq!(cfg.http.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_default_serial_settings() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.serial.path, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(cfg.serial.baud, 115_200);
        assert_eq!(cfg.serial.poll_interval(), Duration::from_millis(20));
        assert_eq!(cfg.serial.startup_sync_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_default_wifi_settings() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.wifi.mode, WifiMode::Station);
        assert_eq!(cfg.wifi.ap_ssid, "PreampBridge-Setup");
        assert_eq!(cfg.wifi.ap_address, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(cfg.wifi.connect_timeout(), Duration::from_secs(15));
        assert!(cfg.wifi.default_ssid.is_empty());
    }

    #[test]
    fn test_default_restart_grace_is_200ms() {
        assert_eq!(
            BridgeConfig::default().http.restart_grace(),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        // Arrange / Act
        let cfg: BridgeConfig = toml::from_str("").expect("empty TOML must parse");
        // Assert
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        // Arrange
        let text = r#"
            log_level = "debug"

            [http]
            port = 9000

            [wifi]
            mode = "access_point"
        "#;

        // Act
        let cfg: BridgeConfig = toml::from_str(text).expect("parse");

        // Assert
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.http.port, 9000);
        assert_eq!(cfg.http.bind_address, "0.0.0.0");
        assert_eq!(cfg.wifi.mode, WifiMode::AccessPoint);
        assert_eq!(cfg.wifi.ap_ssid, "PreampBridge-Setup");
        assert!(cfg.mdns.enabled);
    }

    #[test]
    fn test_unknown_wifi_mode_is_rejected() {
        let result: Result<BridgeConfig, _> = toml::from_str("[wifi]\nmode = \"mesh\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_bind_address_is_an_error() {
        let http = HttpConfig {
            bind_address: "not.an.ip".to_string(),
            ..HttpConfig::default()
        };
        assert!(http.bind_addr().is_err());
    }
}
