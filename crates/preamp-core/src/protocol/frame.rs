//! WebSocket frame codec (RFC 6455 base framing, no extensions).
//!
//! Wire format:
//! ```text
//! [FIN|RSV|opcode:1][MASK|len7:1][ext len:0/2/8][mask key:0/4][payload:N]
//! ```
//! All multi-byte integers are big-endian.  A 7-bit length of 126 means "read
//! a 16-bit length next", 127 means "read a 64-bit length next".
//!
//! # Fragmentation
//!
//! The FIN bit is parsed but never acted upon: every frame is delivered as a
//! complete message.  Browsers only fragment very large messages and the
//! bridge's inbound traffic is one short command line per frame.  A
//! continuation frame (opcode 0) therefore surfaces as
//! [`FrameEvent::Ignored`].
//!
//! # Masking (for beginners)
//!
//! Browsers must mask every frame they send: each payload byte is XOR-ed with
//! one byte of a random 4-byte key, cycling through the key.  XOR is its own
//! inverse, so applying the same key a second time restores the original
//! bytes.  Servers never mask their frames.

use thiserror::Error;

/// Size of the fixed frame header (opcode byte + length byte).
pub const BASE_HEADER_LEN: usize = 2;

/// Size of the masking key carried by client frames.
pub const MASK_KEY_LEN: usize = 4;

/// Largest payload the bridge accepts from a browser.
///
/// Inbound traffic is short command lines; anything bigger is treated as a
/// hostile or broken peer and ends the session instead of being allocated.
pub const MAX_FRAME_PAYLOAD: u64 = 1024 * 1024;

/// Errors that can occur while decoding a frame from a byte slice.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// The byte slice is shorter than the frame it starts.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The declared payload length is above [`MAX_FRAME_PAYLOAD`].
    #[error("frame payload of {0} bytes exceeds the limit of {MAX_FRAME_PAYLOAD} bytes")]
    PayloadTooLarge(u64),
}

/// Frame opcodes defined by RFC 6455.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(other),
        }
    }
}

/// The two fixed header bytes of a frame, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final-fragment flag.  Parsed for logging only.
    pub fin: bool,
    /// Raw 4-bit opcode.  Kept raw so unknown opcodes can be ignored rather
    /// than rejected.
    pub opcode: u8,
    /// Whether a 4-byte masking key follows the length fields.
    pub masked: bool,
    /// The 7-bit length field: a length below 126, or a length class.
    pub length_field: u8,
}

impl FrameHeader {
    /// Decodes the two base header bytes.
    pub fn parse(bytes: [u8; BASE_HEADER_LEN]) -> Self {
        Self {
            fin: bytes[0] & 0x80 != 0,
            opcode: bytes[0] & 0x0F,
            masked: bytes[1] & 0x80 != 0,
            length_field: bytes[1] & 0x7F,
        }
    }

    /// Number of extended-length bytes that follow the base header.
    pub fn extended_length_len(&self) -> usize {
        match self.length_field {
            126 => 2,
            127 => 8,
            _ => 0,
        }
    }

    /// Resolves the payload length from the (possibly empty) extended field.
    ///
    /// `extended` must hold exactly [`extended_length_len`](Self::extended_length_len)
    /// bytes.
    pub fn payload_len(&self, extended: &[u8]) -> u64 {
        if extended.is_empty() {
            return u64::from(self.length_field);
        }
        extended
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

/// Converts a declared payload length into a buffer size, enforcing
/// [`MAX_FRAME_PAYLOAD`].
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] when the length exceeds the limit.
pub fn checked_payload_len(len: u64) -> Result<usize, FrameError> {
    if len > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge(len));
    }
    // The limit fits in usize on every supported target.
    Ok(len as usize)
}

/// One decoded frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// What a received frame means to the session loop.
///
/// This is the explicit "fatal vs. ignorable" outcome of reading one frame:
/// only [`FrameEvent::Close`] ends the session, everything else lets the loop
/// continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A text frame with a valid UTF-8 payload.
    Text(String),
    /// A ping; the caller must answer with a pong carrying the same payload.
    Ping(Vec<u8>),
    /// The peer asked to close the connection.
    Close,
    /// Anything else: binary, pong, continuation, unknown opcodes, or text
    /// that is not valid UTF-8.
    Ignored,
}

impl Frame {
    /// Returns the typed opcode, or `None` for reserved values.
    pub fn kind(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    /// Interprets the frame for the session loop.
    pub fn into_event(self) -> FrameEvent {
        match self.kind() {
            Some(Opcode::Close) => FrameEvent::Close,
            Some(Opcode::Ping) => FrameEvent::Ping(self.payload),
            Some(Opcode::Text) => match String::from_utf8(self.payload) {
                Ok(text) => FrameEvent::Text(text),
                Err(_) => FrameEvent::Ignored,
            },
            _ => FrameEvent::Ignored,
        }
    }
}

// ── Masking ───────────────────────────────────────────────────────────────────

/// XORs `payload` in place with the cycling 4-byte `key`.
///
/// Applying the same key twice restores the original bytes.
pub fn apply_mask(payload: &mut [u8], key: [u8; MASK_KEY_LEN]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % MASK_KEY_LEN];
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes an unmasked server-to-client frame with the FIN bit set.
///
/// # Examples
///
/// ```rust
/// use preamp_core::protocol::frame::{encode_frame, Opcode};
///
/// let bytes = encode_frame(Opcode::Text, b"hi");
/// assert_eq!(bytes, vec![0x81, 0x02, b'h', b'i']);
/// ```
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BASE_HEADER_LEN + 8 + payload.len());
    buf.push(0x80 | opcode as u8);
    push_length(&mut buf, payload.len(), 0x00);
    buf.extend_from_slice(payload);
    buf
}

/// Encodes a masked client-to-server frame with the FIN bit set.
///
/// The bridge never sends masked frames; this exists so tests and benchmarks
/// can produce exactly what a browser would put on the wire.
pub fn encode_masked_frame(opcode: Opcode, payload: &[u8], key: [u8; MASK_KEY_LEN]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BASE_HEADER_LEN + 8 + MASK_KEY_LEN + payload.len());
    buf.push(0x80 | opcode as u8);
    push_length(&mut buf, payload.len(), 0x80);
    buf.extend_from_slice(&key);
    let start = buf.len();
    buf.extend_from_slice(payload);
    apply_mask(&mut buf[start..], key);
    buf
}

/// Appends the 7-bit length (OR-ed with `mask_bit`) and any extended field.
fn push_length(buf: &mut Vec<u8>, len: usize, mask_bit: u8) {
    if len < 126 {
        buf.push(mask_bit | len as u8);
    } else if len < 65536 {
        buf.push(mask_bit | 126);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(mask_bit | 127);
        buf.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame (payload unmasked) and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`FrameError::InsufficientData`] when `bytes` ends before the frame
/// does, and [`FrameError::PayloadTooLarge`] for oversized declared lengths.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameError> {
    require(bytes, BASE_HEADER_LEN)?;
    let header = FrameHeader::parse([bytes[0], bytes[1]]);
    let mut offset = BASE_HEADER_LEN;

    let ext_len = header.extended_length_len();
    require(bytes, offset + ext_len)?;
    let payload_len = checked_payload_len(header.payload_len(&bytes[offset..offset + ext_len]))?;
    offset += ext_len;

    let mut key = None;
    if header.masked {
        require(bytes, offset + MASK_KEY_LEN)?;
        key = Some([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        offset += MASK_KEY_LEN;
    }

    require(bytes, offset + payload_len)?;
    let mut payload = bytes[offset..offset + payload_len].to_vec();
    if let Some(key) = key {
        apply_mask(&mut payload, key);
    }

    Ok((
        Frame {
            fin: header.fin,
            opcode: header.opcode,
            payload,
        },
        offset + payload_len,
    ))
}

fn require(bytes: &[u8], needed: usize) -> Result<(), FrameError> {
    if bytes.len() < needed {
        return Err(FrameError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
