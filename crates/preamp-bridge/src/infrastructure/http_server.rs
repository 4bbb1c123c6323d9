//! HTTP listener: accept loop, request reader, and per-connection handling.
//!
//! Every connection carries exactly one request.  Plain responses are written
//! with `Connection: close` and the socket is shut down; upgrade requests are
//! answered with `101 Switching Protocols` and the same socket becomes a
//! WebSocket session (see [`ws_session`](super::ws_session)).
//!
//! # Shutdown
//!
//! [`run_server`] never returns on its own.  It owns a `JoinSet` of its
//! connection tasks, so aborting the server task (which the boot loop does on
//! restart) also aborts every open connection and session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use preamp_core::protocol::handshake::switching_protocols_response;
use preamp_core::protocol::http::{is_header_terminator, MAX_HEADER_LINES, MAX_LINE_LEN};
use preamp_core::{HttpRequest, HttpResponse};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::application::{dispatch, BridgeContext, Reply};
use crate::infrastructure::ws_session::run_session;

/// Largest request body accepted (the portal forms are a few dozen bytes).
pub const MAX_BODY_LEN: usize = 64 * 1024;

/// Pause after a failed `accept()` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Why a request could not be read.  The connection is dropped without a
/// response in every case.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line longer than {MAX_LINE_LEN} bytes")]
    LineTooLong,

    #[error("more than {MAX_HEADER_LINES} header lines")]
    TooManyHeaders,

    #[error("body of {0} bytes exceeds the {MAX_BODY_LEN}-byte limit")]
    BodyTooLarge(usize),
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Binds the HTTP/WebSocket listener.
///
/// # Errors
///
/// Returns an error if the address is in use or cannot be bound.
pub async fn bind_listener(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!("HTTP listening on {addr}");
    Ok(listener)
}

/// Accepts connections forever, one task per connection.
pub async fn run_server(listener: TcpListener, ctx: Arc<BridgeContext>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(handle_connection(stream, peer, Arc::clone(&ctx)));
                }
                Err(e) => {
                    error!("accept error: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            // Reap finished connections.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<BridgeContext>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = match read_request(&mut reader).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("{peer} closed without a request");
            return;
        }
        Err(e) => {
            debug!("dropping request from {peer}: {e}");
            return;
        }
    };
    debug!("{peer} {} {}", request.method, request.path);

    match dispatch(&ctx, &request).await {
        Reply::Response(response) => {
            if let Err(e) = write_response(&mut write_half, &response).await {
                debug!("failed to answer {peer}: {e}");
            }
        }
        Reply::ResponseThenRestart(response) => {
            if let Err(e) = write_response(&mut write_half, &response).await {
                debug!("failed to answer {peer}: {e}");
            }
            ctx.restart_after_grace().await;
        }
        Reply::Upgrade { key } => {
            if let Err(e) = write_half.write_all(&switching_protocols_response(&key)).await {
                debug!("handshake with {peer} failed: {e}");
                return;
            }
            debug!("WebSocket upgrade from {peer}");
            run_session(reader, write_half, ctx).await;
        }
        Reply::Close => debug!("closing {peer} without a response"),
    }
}

/// Writes a complete response and closes the write side.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &HttpResponse,
) -> std::io::Result<()> {
    writer.write_all(&response.to_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await
}

// ── Request reader ────────────────────────────────────────────────────────────

/// Reads one request: request line, headers up to a blank line or EOF, then
/// `Content-Length` bytes of body.
///
/// Returns `Ok(None)` when the peer closes before sending anything.
///
/// # Errors
///
/// Returns [`RequestError`] when a bound is exceeded or the socket fails,
/// including a body that ends early.
pub async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<HttpRequest>, RequestError> {
    let Some(request_line) = read_line(reader).await? else {
        return Ok(None);
    };
    let mut request = HttpRequest::from_request_line(&request_line);

    let mut header_lines = 0;
    while let Some(line) = read_line(reader).await? {
        if is_header_terminator(&line) {
            break;
        }
        header_lines += 1;
        if header_lines > MAX_HEADER_LINES {
            return Err(RequestError::TooManyHeaders);
        }
        request.headers.insert_line(&line);
    }

    let len = request.content_length();
    if len > MAX_BODY_LEN {
        return Err(RequestError::BodyTooLarge(len));
    }
    if len > 0 {
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        request.body = body;
    }
    Ok(Some(request))
}

/// Reads one line without its terminator, or `None` at EOF.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>, RequestError> {
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if n == MAX_LINE_LEN && !buf.ends_with(b"\n") {
        return Err(RequestError::LineTooLong);
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
