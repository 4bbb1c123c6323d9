//! Minimal HTTP/1.1 request parsing and response rendering.
//!
//! The bridge serves exactly one request per connection and always answers
//! with `Connection: close`, so there is no chunked encoding, no keep-alive,
//! and no pipelining to deal with.  This module only knows about text: the
//! infrastructure layer reads lines from the socket and feeds them in here.
//!
//! # Leniency
//!
//! Malformed input never fails the parse:
//!
//! - a request line with fewer than two tokens yields an empty method/path,
//!   which the router answers with `405` or `404`;
//! - header lines without a `:` are skipped;
//! - a `Content-Length` that is not a number counts as "no body".

use std::collections::HashMap;

/// Maximum number of header lines read before the connection is dropped.
pub const MAX_HEADER_LINES: usize = 64;

/// Maximum length of the request line or of a single header line.
pub const MAX_LINE_LEN: usize = 8 * 1024;

// ── Request ───────────────────────────────────────────────────────────────────

/// Case-insensitive header map.  Keys are stored lower-cased; when a header is
/// repeated the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one raw header line and stores it.
    ///
    /// The line is split on its first `:`; key and value are trimmed.  Returns
    /// `false` (and stores nothing) for lines that have no `:` or an empty key.
    pub fn insert_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.split_once(':') else {
            return false;
        };
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        self.insert(key, value.trim());
        true
    }

    /// Stores a header, replacing any previous value for the same key.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_ascii_lowercase(), value.to_string());
    }

    /// Looks a header up by name, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method as sent (`GET`, `POST`, ...).  Empty if unparseable.
    pub method: String,
    /// Request target as sent, including any query string.  Empty if
    /// unparseable.
    pub path: String,
    pub headers: Headers,
    /// Body bytes; empty unless a nonzero `Content-Length` was declared.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Builds a request from its request line.  Headers and body are added
    /// afterwards by the reader.
    pub fn from_request_line(line: &str) -> Self {
        let (method, path) = parse_request_line(line);
        Self {
            method,
            path,
            ..Self::default()
        }
    }

    /// The declared body length, or 0 when absent or not a number.
    pub fn content_length(&self) -> usize {
        self.headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0)
    }

    /// `true` when the `Upgrade` header case-insensitively equals `websocket`.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers
            .get("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    }

    /// The client's `Sec-WebSocket-Key`, if present and non-empty.
    pub fn websocket_key(&self) -> Option<&str> {
        self.headers
            .get("sec-websocket-key")
            .filter(|k| !k.is_empty())
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        parse_form(&self.body)
    }
}

/// Splits `METHOD SP PATH SP VERSION` into method and path.
///
/// The version is ignored.  Fewer than two tokens yields two empty strings.
pub fn parse_request_line(line: &str) -> (String, String) {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => (method.to_string(), path.to_string()),
        _ => (String::new(), String::new()),
    }
}

/// `true` for the empty line that terminates the header section.
pub fn is_header_terminator(line: &str) -> bool {
    line == "\r\n" || line == "\n" || line.is_empty()
}

// ── Form decoding ─────────────────────────────────────────────────────────────

/// Decodes an `application/x-www-form-urlencoded` body into key/value pairs.
///
/// Pairs without `=` are skipped.  A body that is not UTF-8 decodes to an
/// empty map.
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    let mut result = HashMap::new();
    let Ok(text) = std::str::from_utf8(body) else {
        return result;
    };
    for part in text.split('&') {
        if let Some((key, value)) = part.split_once('=') {
            result.insert(url_decode(key), url_decode(value));
        }
    }
    result
}

/// Percent-decodes a form component, turning `+` into a space.
///
/// Malformed escapes are kept literally.  Decoded bytes that do not form valid
/// UTF-8 are replaced with U+FFFD.
pub fn url_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// The status codes the bridge answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// A complete, non-upgrade HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.to_string(),
            body: body.into(),
        }
    }

    /// A `text/plain` response.
    pub fn text(status: StatusCode, body: &str) -> Self {
        Self::new(status, "text/plain", body)
    }

    /// A `text/html` response.
    pub fn html(status: StatusCode, body: &str) -> Self {
        Self::new(status, "text/html", body)
    }

    /// Serializes status line, headers, and body.  Always `Connection: close`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.len()
        );
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
