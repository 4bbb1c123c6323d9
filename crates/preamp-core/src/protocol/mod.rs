//! Protocol module containing every wire codec used by the bridge.

pub mod dns;
pub mod frame;
pub mod handshake;
pub mod http;
pub mod serial_line;

pub use frame::{decode_frame, encode_frame, FrameError};
pub use handshake::{accept_token, WS_GUID};
