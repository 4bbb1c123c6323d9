//! One WebSocket session after the `101 Switching Protocols` response.
//!
//! # Task layout
//!
//! ```text
//!  serial reader ──broadcast──▶ QueueSink ──┐
//!                                           ├─▶ mpsc queue ─▶ writer task ─▶ socket
//!  read loop ──── pong ─────────────────────┘
//!      │
//!      └── normalised commands ─▶ ctx.commands ─▶ serial writer
//! ```
//!
//! The read loop runs on the connection task itself; the writer is a child
//! task.  The session ends when either side stops or when a delivery to its
//! queue fails (the hub has then already dropped it).  It is then
//! unregistered, the queue is closed, and the writer sends a best-effort close
//! frame.
//!
//! On open, the cached `SELECTOR_LABELS` and `STATE` lines are queued before
//! the session is registered with the hub, so they always arrive before any
//! live line.

use std::sync::Arc;
use std::time::Duration;

use preamp_core::protocol::frame::{checked_payload_len, FrameHeader, BASE_HEADER_LEN, MASK_KEY_LEN};
use preamp_core::{apply_mask, encode_frame, normalize_command, Frame, FrameError, FrameEvent, Opcode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::{BridgeContext, DeliveryError, LineSink, SessionId};

/// Lines a session may lag behind before it is dropped from the hub.
pub const SESSION_QUEUE_CAPACITY: usize = 64;

/// How long the writer gets to flush and send its close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Why the read side of a session stopped.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad frame: {0}")]
    Frame(#[from] FrameError),

    #[error("outgoing queue full")]
    Lagging,
}

/// One item for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Pong(Vec<u8>),
}

/// The hub's handle on one session's outgoing queue.
///
/// A failed delivery wakes `dropped`, which ends the session.
struct QueueSink {
    tx: mpsc::Sender<Outgoing>,
    dropped: Arc<Notify>,
}

impl LineSink for QueueSink {
    fn deliver(&self, line: &str) -> Result<(), DeliveryError> {
        let result = self
            .tx
            .try_send(Outgoing::Text(line.to_string()))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Full,
                TrySendError::Closed(_) => DeliveryError::Closed,
            });
        if result.is_err() {
            self.dropped.notify_one();
        }
        result
    }
}

// ── Frame reader ──────────────────────────────────────────────────────────────

/// Reads one complete frame: base header, extended length, mask key, payload.
///
/// # Errors
///
/// Any I/O failure (including EOF mid-frame) or an oversized declared length.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, SessionError> {
    let mut base = [0u8; BASE_HEADER_LEN];
    reader.read_exact(&mut base).await?;
    let header = FrameHeader::parse(base);

    let mut extended = [0u8; 8];
    let extended = &mut extended[..header.extended_length_len()];
    reader.read_exact(extended).await?;
    let len = checked_payload_len(header.payload_len(extended))?;

    let mut key = [0u8; MASK_KEY_LEN];
    if header.masked {
        reader.read_exact(&mut key).await?;
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    if header.masked {
        apply_mask(&mut payload, key);
    }

    Ok(Frame {
        fin: header.fin,
        opcode: header.opcode,
        payload,
    })
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Runs a session until the peer closes, the socket fails, or a delivery to
/// it fails.
pub async fn run_session<R, W>(mut reader: R, writer: W, ctx: Arc<BridgeContext>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let id: SessionId = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);

    for line in ctx.serial.replay_lines() {
        // At most two cached lines; the fresh queue has room for them.
        let _ = tx.try_send(Outgoing::Text(line));
    }
    let dropped = Arc::new(Notify::new());
    ctx.hub().register(
        id,
        Arc::new(QueueSink {
            tx: tx.clone(),
            dropped: Arc::clone(&dropped),
        }),
    );
    info!("session {id} opened ({} active)", ctx.hub().len());

    let mut writer_task = tokio::spawn(write_loop(writer, rx));

    let writer_finished = tokio::select! {
        result = read_loop(&mut reader, id, &tx, &ctx) => {
            match result {
                Ok(()) => debug!("session {id}: peer closed"),
                Err(e) => debug!("session {id}: read side ended: {e}"),
            }
            false
        }
        _ = &mut writer_task => {
            debug!("session {id}: writer stopped");
            true
        }
        _ = dropped.notified() => {
            debug!("session {id}: fell behind; closing");
            false
        }
    };

    ctx.hub().unregister(id);
    drop(tx);

    if !writer_finished && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await.is_err() {
        writer_task.abort();
    }
    info!("session {id} closed ({} active)", ctx.hub().len());
}

async fn read_loop<R: AsyncRead + Unpin>(
    reader: &mut R,
    id: SessionId,
    tx: &mpsc::Sender<Outgoing>,
    ctx: &BridgeContext,
) -> Result<(), SessionError> {
    loop {
        match read_frame(reader).await?.into_event() {
            FrameEvent::Close => return Ok(()),
            FrameEvent::Ping(payload) => {
                match tx.try_send(Outgoing::Pong(payload)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => return Err(SessionError::Lagging),
                    Err(TrySendError::Closed(_)) => return Ok(()),
                }
            }
            FrameEvent::Text(text) => {
                let text = text.trim();
                match normalize_command(text) {
                    Some(command) => {
                        debug!("session {id}: command '{command}'");
                        if ctx.commands.send(command).await.is_err() {
                            warn!("serial link unavailable; command from session {id} dropped");
                        }
                    }
                    None if text.is_empty() => {}
                    None => debug!("session {id}: rejected input '{text}'"),
                }
            }
            FrameEvent::Ignored => {}
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::Receiver<Outgoing>) {
    while let Some(item) = rx.recv().await {
        let frame = match &item {
            Outgoing::Text(line) => encode_frame(Opcode::Text, line.as_bytes()),
            Outgoing::Pong(payload) => encode_frame(Opcode::Pong, payload),
        };
        if let Err(e) = writer.write_all(&frame).await {
            debug!("session write failed: {e}");
            return;
        }
    }

    // Best effort; the peer may already be gone.
    let _ = writer.write_all(&encode_frame(Opcode::Close, &[])).await;
    let _ = writer.shutdown().await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
