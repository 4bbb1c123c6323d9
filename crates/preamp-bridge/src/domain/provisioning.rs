//! Provisioning types: the boot-time network mode and the stored Wi-Fi record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the provisioning state machine currently stands.
///
/// Exactly one mode is active per boot.  `Connecting` is transient: a boot
/// always ends in `Connected` or `SetupFallback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningMode {
    /// Initial state: the credential record has not been read yet.
    AwaitingCredentials,
    /// A record exists and the network join is in progress.
    Connecting,
    /// The bridge is on a network and serves the controller UI.
    Connected,
    /// No usable network: the access point is up and the setup page is served.
    SetupFallback,
}

impl ProvisioningMode {
    /// `true` while the captive portal replaces the controller UI.
    pub fn is_setup(self) -> bool {
        self == ProvisioningMode::SetupFallback
    }
}

impl fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisioningMode::AwaitingCredentials => "awaiting-credentials",
            ProvisioningMode::Connecting => "connecting",
            ProvisioningMode::Connected => "connected",
            ProvisioningMode::SetupFallback => "setup-fallback",
        };
        f.write_str(name)
    }
}

/// Which network interface role carries the bridge's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Joined an existing network as a client.
    Station,
    /// Hosting its own access point.
    AccessPoint,
}

/// The persisted network record: `{"ssid": "...", "password": "..."}`.
///
/// Both fields are required in the JSON; a record without a password field
/// is treated as unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

impl WifiCredentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// A record with an empty network name counts as "not provisioned".
    pub fn is_usable(&self) -> bool {
        !self.ssid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_setup_fallback_is_setup() {
        assert!(ProvisioningMode::SetupFallback.is_setup());
        assert!(!ProvisioningMode::Connected.is_setup());
        assert!(!ProvisioningMode::Connecting.is_setup());
        assert!(!ProvisioningMode::AwaitingCredentials.is_setup());
    }

    #[test]
    fn test_mode_display_names() {
        assert_eq!(ProvisioningMode::SetupFallback.to_string(), "setup-fallback");
        assert_eq!(ProvisioningMode::Connected.to_string(), "connected");
    }

    #[test]
    fn test_credentials_json_shape() {
        // Arrange
        let creds = WifiCredentials::new("Home", "secret");

        // Act
        let json = serde_json::to_string(&creds).expect("serialize");

        // Assert
        assert_eq!(json, r#"{"ssid":"Home","password":"secret"}"#);
    }

    #[test]
    fn test_record_without_password_does_not_parse() {
        let result: Result<WifiCredentials, _> = serde_json::from_str(r#"{"ssid":"Home"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_ssid_is_not_usable() {
        assert!(!WifiCredentials::new("", "x").is_usable());
        assert!(WifiCredentials::new("Home", "").is_usable());
    }
}
