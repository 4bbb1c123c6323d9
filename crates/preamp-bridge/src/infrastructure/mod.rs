//! Infrastructure layer for preamp-bridge.
//!
//! The infrastructure layer handles all I/O: the HTTP/WebSocket listener, the
//! serial device, the mDNS socket, and the files behind the credential record,
//! the config and the web UI.
//!
//! # Responsibilities
//!
//! - Binding the TCP listener and reading one request per connection
//! - Completing WebSocket upgrades and running per-session tasks
//! - Opening the serial device once and running its reader and writer
//! - Binding the multicast socket and answering name queries
//! - Implementing the `CredentialStore`, `AssetStore` and `NetworkLink` seams
//! - Starting every task of a boot into one `JoinSet`
//!
//! # What does NOT belong here?
//!
//! - Routing and provisioning decisions (that is the application layer)
//! - Byte-level codecs (those live in `preamp-core`)
//! - Argument parsing and the restart loop (that is `main.rs`)

pub mod assets;
pub mod bootstrap;
pub mod http_server;
pub mod mdns;
pub mod network_link;
pub mod serial;
pub mod storage;
pub mod ws_session;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use bootstrap::{start_boot, start_serial_link, Boot, BootServices};
pub use http_server::{bind_listener, run_server};
pub use storage::{load_config, ConfigError, JsonCredentialStore};
