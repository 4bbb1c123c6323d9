//! # preamp-core
//!
//! Shared protocol library for the preamp bridge.  Every codec the bridge
//! speaks lives here as pure functions over byte slices and strings:
//!
//! - **`protocol::frame`** – WebSocket frame header parsing, masking, and
//!   encoding (RFC 6455 framing without extensions).
//! - **`protocol::handshake`** – the `Sec-WebSocket-Accept` token and the
//!   `101 Switching Protocols` response.
//! - **`protocol::http`** – request-line / header parsing, form decoding, and
//!   `Connection: close` response rendering for the minimal HTTP/1.1 router.
//! - **`protocol::dns`** – DNS name decoding with compression pointers and the
//!   single-answer A-record response used for `.local` discovery.
//! - **`protocol::serial_line`** – classification of lines coming from the
//!   preamp controller and normalisation of commands typed by browsers.
//!
//! The crate has no dependency on sockets, files, or an async runtime.  The
//! `preamp-bridge` crate owns all I/O and calls into these functions, which
//! keeps every wire format unit-testable byte for byte.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `preamp_core::accept_token` instead of the full module path.
pub use protocol::dns::{decode_name, DnsError, DnsQuery};
pub use protocol::frame::{apply_mask, encode_frame, Frame, FrameError, FrameEvent, Opcode};
pub use protocol::handshake::accept_token;
pub use protocol::http::{HttpRequest, HttpResponse, StatusCode};
pub use protocol::serial_line::{classify_line, normalize_command, LineKind};
