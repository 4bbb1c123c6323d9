//! Domain layer for preamp-bridge.
//!
//! Pure types with no I/O: the configuration schema, the provisioning state
//! and stored credential record, and the cache of the controller's last
//! state lines.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, socket, or file types
//! - Reading the config file or the credential record from disk
//! - Anything that could block or fail due to external state

pub mod config;
pub mod line_cache;
pub mod provisioning;

pub use config::{BridgeConfig, HttpConfig, MdnsConfig, SerialConfig, WebConfig, WifiConfig, WifiMode};
pub use line_cache::LineCache;
pub use provisioning::{LinkKind, ProvisioningMode, WifiCredentials};
