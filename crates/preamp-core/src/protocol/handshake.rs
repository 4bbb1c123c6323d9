//! WebSocket opening handshake.
//!
//! The browser sends a random base64 `Sec-WebSocket-Key`.  The server proves it
//! understood the upgrade by answering with
//! `base64(SHA-1(key + GUID))` in `Sec-WebSocket-Accept`.

use base64::Engine;
use sha1::{Digest, Sha1};

/// The fixed GUID every WebSocket server appends to the client key.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` token for a client key.
///
/// # Examples
///
/// ```rust
/// use preamp_core::accept_token;
///
/// assert_eq!(
///     accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
pub fn accept_token(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Renders the `101 Switching Protocols` response for a client key.
pub fn switching_protocols_response(client_key: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_token(client_key)
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_token_matches_rfc_6455_example() {
        assert_eq!(
            accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_accept_token_is_28_base64_chars() {
        // 20-byte digest → 28 base64 characters with one padding byte.
        let token = accept_token("x3JJHMbDL1EzLkh9GBhXDw==");
        assert_eq!(token.len(), 28);
        assert!(token.ends_with('='));
    }

    #[test]
    fn test_switching_protocols_response_contains_token_and_blank_line() {
        let text = String::from_utf8(switching_protocols_response("dGhlIHNhbXBsZSBub25jZQ=="))
            .expect("ascii");
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
