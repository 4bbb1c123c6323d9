//! Serial link to the preamp controller.
//!
//! The device is opened once per process and outlives every boot: a restart
//! tears down the boot's tasks but never the device handles, so no read is
//! left in flight against a device the next boot is also reading.
//!
//! # Thread and task layout
//!
//! ```text
//!  device ──▶ reader thread ──raw lines──▶ queue ──▶ SerialLink::pump (per boot) ──▶ SerialBridge
//!  device ◀── writer task ◀──commands── SerialLink::commands (shared by every boot)
//! ```
//!
//! The reader is a plain OS thread doing blocking reads, so it is never
//! cancelled mid-read.  Each boot drains the line queue with
//! [`SerialLink::pump`]; `mpsc::Receiver::recv` is cancel safe, so a line
//! that arrives while the boot is being replaced waits in the queue for the
//! next boot.
//!
//! Line settings (baud rate, raw mode, no echo) are applied with `stty`
//! before opening; on hosts without `stty` the device is used as already
//! configured.

use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::application::SerialBridge;
use crate::domain::SerialConfig;

/// Commands sent once after each boot so freshly joined sessions get a replay.
pub const STARTUP_SYNC_COMMANDS: [&str; 2] = ["GET STATE", "GET SELECTOR_LABELS"];

/// Commands that may queue up behind a slow device.
pub const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Lines read but not yet taken by a boot.
pub const LINE_QUEUE_CAPACITY: usize = 256;

/// Longest line kept, terminator excluded.  Longer lines are discarded.
pub const MAX_SERIAL_LINE_LEN: usize = 1024;

/// Error type for serial device setup.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start the serial reader thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// The two halves of an opened serial device.
pub struct SerialPort {
    pub reader: std::io::BufReader<std::fs::File>,
    pub writer: tokio::fs::File,
}

impl SerialPort {
    /// Configures and opens the device at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SerialError::Open`] if either handle cannot be opened.
    pub async fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        configure_line(&config.path, config.baud).await;

        let open_err = |source| SerialError::Open {
            path: config.path.clone(),
            source,
        };
        let reader = OpenOptions::new()
            .read(true)
            .open(&config.path)
            .await
            .map_err(open_err)?
            .into_std()
            .await;
        let writer = OpenOptions::new()
            .write(true)
            .open(&config.path)
            .await
            .map_err(open_err)?;

        info!(
            "serial device {} open at {} baud",
            config.path.display(),
            config.baud
        );
        Ok(Self {
            reader: std::io::BufReader::new(reader),
            writer,
        })
    }
}

/// Applies baud rate and raw mode with `stty`.  Failures are logged only.
async fn configure_line(path: &Path, baud: u32) {
    let device_flag = if cfg!(target_os = "linux") { "-F" } else { "-f" };
    let result = Command::new("stty")
        .arg(device_flag)
        .arg(path)
        .arg(baud.to_string())
        .args(["raw", "-echo"])
        .status()
        .await;

    match result {
        Ok(status) if status.success() => debug!("stty applied to {}", path.display()),
        Ok(status) => warn!("stty on {} exited with {status}", path.display()),
        Err(e) => warn!("could not run stty for {}: {e}", path.display()),
    }
}

// ── Link ──────────────────────────────────────────────────────────────────────

/// Process-wide handle on the controller link, shared by every boot.
#[derive(Clone)]
pub struct SerialLink {
    lines: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    commands: mpsc::Sender<String>,
}

impl SerialLink {
    pub fn new(lines: mpsc::Receiver<Vec<u8>>, commands: mpsc::Sender<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
            commands,
        }
    }

    /// Opens the device and starts the reader thread and the writer task.
    ///
    /// # Errors
    ///
    /// Returns [`SerialError`] if the device cannot be opened or the reader
    /// thread cannot be spawned.
    pub async fn start(
        config: &SerialConfig,
        tasks: &mut tokio::task::JoinSet<()>,
    ) -> Result<Self, SerialError> {
        let port = SerialPort::open(config).await?;
        let (line_tx, line_rx) = mpsc::channel(LINE_QUEUE_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        let poll_interval = config.poll_interval();
        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || run_reader(port.reader, line_tx, poll_interval))
            .map_err(SerialError::Thread)?;
        tasks.spawn(run_writer(port.writer, command_rx));

        Ok(Self::new(line_rx, command_tx))
    }

    /// Sender half of the command queue to the device.
    pub fn commands(&self) -> mpsc::Sender<String> {
        self.commands.clone()
    }

    /// Hands every queued line to `bridge` until the reader stops.
    ///
    /// Only one boot drains the queue at a time; a pump whose task is aborted
    /// releases the queue without losing a line.
    pub async fn pump(self, bridge: SerialBridge) {
        let mut lines = self.lines.lock().await;
        while let Some(line) = lines.recv().await {
            bridge.ingest(&line);
        }
        debug!("serial reader gone; no more controller lines");
    }
}

// ── Reader thread ─────────────────────────────────────────────────────────────

/// Blocking read loop: queues each newline-terminated line, terminator
/// included.
///
/// At end of input the thread sleeps for `poll_interval` and reads again.
/// Lines longer than [`MAX_SERIAL_LINE_LEN`] are dropped up to and including
/// their terminator.  Returns on the first read error or once nobody takes
/// lines any more.
pub fn run_reader<R: BufRead>(mut reader: R, lines: mpsc::Sender<Vec<u8>>, poll_interval: Duration) {
    let mut buf = Vec::new();
    let mut discarding = false;
    loop {
        let limit = (MAX_SERIAL_LINE_LEN + 1 - buf.len()) as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut buf) {
            Ok(_) if buf.ends_with(b"\n") => {
                let line = std::mem::take(&mut buf);
                if std::mem::replace(&mut discarding, false) {
                    continue;
                }
                if lines.blocking_send(line).is_err() {
                    return;
                }
            }
            Ok(_) if buf.len() > MAX_SERIAL_LINE_LEN => {
                if !discarding {
                    warn!("serial line longer than {MAX_SERIAL_LINE_LEN} bytes discarded");
                }
                discarding = true;
                buf.clear();
            }
            // End of input, possibly after a partial line; keep it and wait.
            Ok(_) => std::thread::sleep(poll_interval),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("serial read failed: {e}");
                return;
            }
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

/// Writes each command followed by `\n` until every sender is gone.
pub async fn run_writer<W: AsyncWrite + Unpin>(mut writer: W, mut commands: mpsc::Receiver<String>) {
    while let Some(command) = commands.recv().await {
        debug!("UART -> {command}");
        let line = format!("{command}\n");
        if let Err(e) = write_line(&mut writer, line.as_bytes()).await {
            warn!("serial write of '{command}' failed: {e}");
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &[u8]) -> std::io::Result<()> {
    writer.write_all(line).await?;
    writer.flush().await
}

/// Queues the startup sync commands after `delay`.
pub async fn startup_sync(commands: mpsc::Sender<String>, delay: Duration) {
    tokio::time::sleep(delay).await;
    for command in STARTUP_SYNC_COMMANDS {
        if commands.send(command.to_string()).await.is_err() {
            return;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
