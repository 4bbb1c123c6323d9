//! Application layer for preamp-bridge.
//!
//! The application layer knows *what* the bridge does with each request, line
//! and datagram, but delegates *how* bytes move to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Running the provisioning state machine against the [`NetworkLink`] and
//!   [`CredentialStore`] seams
//! - Fanning controller lines out to sessions ([`BroadcastHub`])
//! - Caching and replaying the latest state and labels ([`SerialBridge`])
//! - Routing HTTP requests and the captive-portal actions
//! - Answering `.local` name queries ([`NameResponder`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets, files or serial devices (that is infrastructure)
//! - Tokio task spawning (that happens in the infrastructure layer)
//! - Byte-level codecs (those live in `preamp-core`)

pub mod broadcast;
pub mod context;
pub mod name_responder;
pub mod portal;
pub mod provisioning;
pub mod router;
pub mod serial_bridge;

pub use broadcast::{BroadcastHub, DeliveryError, LineSink, SessionId};
pub use context::BridgeContext;
pub use name_responder::NameResponder;
pub use portal::{AssetError, AssetStore};
pub use provisioning::{boot, BootReport, CredentialStore, LinkError, NetworkLink, StoreError};
pub use router::{dispatch, route, Reply, Route};
pub use serial_bridge::SerialBridge;
