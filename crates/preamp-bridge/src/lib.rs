//! preamp-bridge library crate.
//!
//! Bridges a preamp controller's serial line protocol to browsers: an HTTP
//! listener serves the controller UI, WebSocket sessions carry the line
//! protocol both ways, an mDNS responder makes the bridge reachable as
//! `<hostname>.local`, and a captive setup portal handles Wi-Fi provisioning.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (text lines over WebSocket)      mDNS queries
//!         ↕                                     ↕
//! [preamp-bridge]
//!   ├── domain/           Config schema, provisioning types, line cache
//!   ├── application/      Provisioning, broadcast hub, routing, portal
//!   └── infrastructure/
//!         ├── http_server/  Accept loop, request reader
//!         ├── ws_session/   Per-session reader and writer tasks
//!         ├── serial/       Device reader/writer tasks
//!         ├── mdns/         Multicast socket
//!         └── bootstrap/    One boot: provisioning + every task
//!         ↕
//! Preamp controller (ASCII lines over a serial port)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O, no async, no sockets.
//! - `application` depends on `domain` and `preamp-core`; its I/O goes through
//!   the `CredentialStore`, `NetworkLink`, `AssetStore` and `LineSink` traits.
//! - `infrastructure` depends on all other layers plus `tokio` and `socket2`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: provisioning, fan-out, routing.
pub mod application;

/// Infrastructure layer: sockets, serial device, files.
pub mod infrastructure;
