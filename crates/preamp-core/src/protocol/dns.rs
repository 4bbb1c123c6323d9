//! DNS message decoding and A-record answer encoding for `.local` discovery.
//!
//! Only the subset needed by a multicast-DNS hostname responder is
//! implemented: a fixed 12-byte header, the first question, and a single
//! A-record answer.  No recursion, no additional records, no negative
//! answers.
//!
//! Wire format of the header:
//! ```text
//! [id:2][flags:2][qdcount:2][ancount:2][nscount:2][arcount:2]
//! ```
//! All multi-byte integers are big-endian.
//!
//! # Compression pointers (for beginners)
//!
//! A DNS name is a sequence of length-prefixed labels ending in a zero byte:
//! `\x06preamp\x05local\x00`.  To save space a name may instead end with a
//! two-byte *pointer* (top two bits set) whose low 14 bits are the absolute
//! offset of labels that appeared earlier in the message.  At the place it
//! occurs a compressed name therefore ends two bytes after the pointer, no
//! matter how long the expansion is.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Record type `A` (IPv4 address).
pub const TYPE_A: u16 = 1;

/// Query type `ANY`.
pub const TYPE_ANY: u16 = 255;

/// Record class `IN`.
pub const CLASS_IN: u16 = 1;

/// mDNS cache-flush bit in the class field of an answer.
pub const CACHE_FLUSH: u16 = 0x8000;

/// Header flags of an answer: QR (response) + AA (authoritative).
pub const RESPONSE_FLAGS: u16 = 0x8400;

/// TTL of the A record, in seconds.
pub const ANSWER_TTL_SECS: u32 = 120;

/// Upper bound on compression pointers followed while decoding one name.
pub const MAX_POINTER_HOPS: usize = 16;

/// Upper bound on the encoded length of a decoded name.
pub const MAX_NAME_LEN: usize = 255;

/// Errors that can occur while decoding a DNS message.
#[derive(Debug, Error, PartialEq)]
pub enum DnsError {
    /// The message ends before a field it declares.
    #[error("message truncated: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// A label read or pointer target fell outside the message.
    #[error("offset {0} is outside the message")]
    OffsetOutOfRange(usize),

    /// Too many compression pointers; the name probably points at itself.
    #[error("more than {MAX_POINTER_HOPS} compression pointers in one name")]
    PointerLoop,

    /// The decoded name is longer than DNS allows.
    #[error("name longer than {MAX_NAME_LEN} bytes")]
    NameTooLong,

    /// A length byte used one of the reserved `0x40`/`0x80` label types.
    #[error("unsupported label type byte 0x{0:02X}")]
    InvalidLabelType(u8),

    /// The header announces zero questions.
    #[error("message carries no question")]
    NoQuestion,
}

// ── Header ────────────────────────────────────────────────────────────────────

/// The fixed 12-byte DNS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    /// Decodes the header at the start of `message`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Truncated`] if `message` is shorter than 12 bytes.
    pub fn parse(message: &[u8]) -> Result<Self, DnsError> {
        if message.len() < HEADER_LEN {
            return Err(DnsError::Truncated {
                needed: HEADER_LEN,
                available: message.len(),
            });
        }
        Ok(Self {
            id: read_u16(message, 0),
            flags: read_u16(message, 2),
            qdcount: read_u16(message, 4),
            ancount: read_u16(message, 6),
            nscount: read_u16(message, 8),
            arcount: read_u16(message, 10),
        })
    }
}

// ── Name decoding ─────────────────────────────────────────────────────────────

/// Decodes the (possibly compressed) name starting at `offset`.
///
/// Returns the dotted name without a trailing dot and the offset of the first
/// byte after the name *at its occurrence point*: for a compressed name that
/// is the byte after the first pointer, not the end of the expansion.
///
/// # Errors
///
/// Any out-of-range offset, pointer loop, reserved label type, or oversized
/// name is reported as a [`DnsError`]; decoding never loops unboundedly.
///
/// # Examples
///
/// ```rust
/// use preamp_core::decode_name;
///
/// let msg = b"\x06preamp\x05local\x00\xC0\x00";
/// assert_eq!(decode_name(msg, 0).unwrap(), ("preamp.local".to_string(), 14));
/// assert_eq!(decode_name(msg, 14).unwrap(), ("preamp.local".to_string(), 16));
/// ```
pub fn decode_name(message: &[u8], offset: usize) -> Result<(String, usize), DnsError> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = offset;
    let mut end_after_pointer: Option<usize> = None;
    let mut hops = 0usize;
    let mut encoded_len = 0usize;

    loop {
        let len_byte = *message.get(pos).ok_or(DnsError::OffsetOutOfRange(pos))?;

        if len_byte == 0 {
            pos += 1;
            break;
        }

        match len_byte & 0xC0 {
            0xC0 => {
                let low = *message
                    .get(pos + 1)
                    .ok_or(DnsError::OffsetOutOfRange(pos + 1))?;
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(DnsError::PointerLoop);
                }
                // Only the first pointer fixes where the name ends.
                end_after_pointer.get_or_insert(pos + 2);
                pos = (usize::from(len_byte & 0x3F) << 8) | usize::from(low);
            }
            0x00 => {
                let len = usize::from(len_byte);
                let start = pos + 1;
                let label = message
                    .get(start..start + len)
                    .ok_or(DnsError::OffsetOutOfRange(start + len))?;
                encoded_len += len + 1;
                if encoded_len > MAX_NAME_LEN {
                    return Err(DnsError::NameTooLong);
                }
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos = start + len;
            }
            _ => return Err(DnsError::InvalidLabelType(len_byte)),
        }
    }

    Ok((labels.join("."), end_after_pointer.unwrap_or(pos)))
}

// ── Query ─────────────────────────────────────────────────────────────────────

/// The first question of a DNS query, plus what is needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub header: DnsHeader,
    /// Decoded question name, no trailing dot.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
    /// The raw question bytes (name + type + class), copied verbatim into the
    /// answer.
    pub question: Vec<u8>,
}

impl DnsQuery {
    /// Decodes the header and first question of `message`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::NoQuestion`] when QDCOUNT is zero, or any decoding
    /// error from the header or question name.
    pub fn parse(message: &[u8]) -> Result<Self, DnsError> {
        let header = DnsHeader::parse(message)?;
        if header.qdcount < 1 {
            return Err(DnsError::NoQuestion);
        }

        let (name, name_end) = decode_name(message, HEADER_LEN)?;
        let question_end = name_end + 4;
        if message.len() < question_end {
            return Err(DnsError::Truncated {
                needed: question_end,
                available: message.len(),
            });
        }

        Ok(Self {
            header,
            name,
            qtype: read_u16(message, name_end),
            qclass: read_u16(message, name_end + 2),
            question: message[HEADER_LEN..question_end].to_vec(),
        })
    }

    /// `true` when the query asks for an A record (type A or ANY).
    pub fn wants_address(&self) -> bool {
        self.qtype == TYPE_A || self.qtype == TYPE_ANY
    }
}

// ── Answer encoding ───────────────────────────────────────────────────────────

/// Builds the single-answer response to `query` carrying `addr`.
///
/// The answer name is the pointer `0xC00C`, i.e. the question name right after
/// the header.
pub fn encode_a_response(query: &DnsQuery, addr: Ipv4Addr) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + query.question.len() + 16);

    buf.extend_from_slice(&query.header.id.to_be_bytes());
    buf.extend_from_slice(&RESPONSE_FLAGS.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    buf.extend_from_slice(&1u16.to_be_bytes()); // ANCOUNT
    buf.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    buf.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT

    buf.extend_from_slice(&query.question);

    buf.extend_from_slice(&(0xC000u16 | HEADER_LEN as u16).to_be_bytes());
    buf.extend_from_slice(&TYPE_A.to_be_bytes());
    buf.extend_from_slice(&(CACHE_FLUSH | CLASS_IN).to_be_bytes());
    buf.extend_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
    buf.extend_from_slice(&4u16.to_be_bytes()); // RDLENGTH
    buf.extend_from_slice(&addr.octets());
    buf
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
