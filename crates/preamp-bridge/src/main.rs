//! Preamp Bridge entry point.
//!
//! This binary connects a preamp controller on a serial port to browsers on
//! the local network.  It serves the controller UI over HTTP, relays the
//! controller's line protocol over WebSocket, answers `<hostname>.local`
//! queries, and falls back to a captive setup portal when it has no usable
//! Wi-Fi network.
//!
//! # Usage
//!
//! ```text
//! preamp-bridge [OPTIONS]
//!
//! Options:
//!   --config      <PATH>  TOML config file [default: bridge.toml]
//!   --http-port   <PORT>  HTTP/WebSocket listener port
//!   --serial-path <PATH>  Serial device of the preamp controller
//!   --asset-dir   <DIR>   Directory holding index.html, app.js, style.css
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present; both override the file.
//!
//! | Variable             | Overrides          |
//! |----------------------|--------------------|
//! | `PREAMP_CONFIG`      | `--config`         |
//! | `PREAMP_HTTP_PORT`   | `http.port`        |
//! | `PREAMP_SERIAL_PATH` | `serial.path`      |
//! | `PREAMP_ASSET_DIR`   | `web.asset_dir`    |
//!
//! # Restarts
//!
//! Portal actions ask for a restart.  A restart is a fresh boot inside the
//! same process: every task of the current boot is aborted, then
//! provisioning runs again from the persisted credentials.  The serial
//! device stays open across restarts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use preamp_bridge::domain::BridgeConfig;
use preamp_bridge::infrastructure::{load_config, start_boot, start_serial_link, BootServices};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial-to-WebSocket bridge for a preamp controller.
#[derive(Debug, Parser)]
#[command(
    name = "preamp-bridge",
    about = "Serial-to-WebSocket bridge with Wi-Fi setup portal and mDNS",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file means "all defaults".
    #[arg(long, default_value = "bridge.toml", env = "PREAMP_CONFIG")]
    config: PathBuf,

    /// TCP port for the HTTP/WebSocket listener.
    #[arg(long, env = "PREAMP_HTTP_PORT")]
    http_port: Option<u16>,

    /// Serial device of the preamp controller, e.g. `/dev/ttyUSB0`.
    #[arg(long, env = "PREAMP_SERIAL_PATH")]
    serial_path: Option<PathBuf>,

    /// Directory holding the controller UI files.
    #[arg(long, env = "PREAMP_ASSET_DIR")]
    asset_dir: Option<PathBuf>,
}

impl Cli {
    /// Loads the config file and applies the CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;

        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if let Some(path) = self.serial_path {
            config.serial.path = path;
        }
        if let Some(dir) = self.asset_dir {
            config.web.asset_dir = dir;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged over the config file.
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over `log_level`.
/// 3. The boot loop starts a boot and waits for either a restart request
///    (boot again) or Ctrl+C (stop).
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_bridge_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "preamp bridge starting: http port {}, serial {}",
        config.http.port,
        config.serial.path.display()
    );

    // The serial device outlives every boot.
    let mut link_tasks = JoinSet::new();
    let serial = start_serial_link(&config.serial, &mut link_tasks).await;
    let services = BootServices::from_config(&config, serial);
    let restart = Arc::new(Notify::new());

    // ── Boot loop ─────────────────────────────────────────────────────────────
    loop {
        let mut tasks = JoinSet::new();
        let boot = start_boot(config.clone(), &services, &mut tasks, Arc::clone(&restart)).await?;
        info!(
            "bridge ready on http://{} ({})",
            boot.http_addr,
            boot.context.mode()
        );

        tokio::select! {
            _ = restart.notified() => {
                info!("restart requested; rebooting");
                tasks.shutdown().await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("failed to listen for Ctrl+C signal: {e}");
                }
                info!("received Ctrl+C, shutting down");
                tasks.shutdown().await;
                link_tasks.shutdown().await;
                break;
            }
        }
    }

    info!("preamp bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const NO_FILE: &str = "/nonexistent/preamp-bridge/bridge.toml";

    #[test]
    fn test_cli_default_config_path() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["preamp-bridge"]);

        // Assert
        assert_eq!(cli.config, PathBuf::from("bridge.toml"));
        assert_eq!(cli.http_port, None);
    }

    #[test]
    fn test_into_bridge_config_missing_file_gives_defaults() {
        let cli = Cli::parse_from(["preamp-bridge", "--config", NO_FILE]);

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_into_bridge_config_applies_overrides() {
        // Arrange
        let cli = Cli::parse_from([
            "preamp-bridge",
            "--config",
            NO_FILE,
            "--http-port",
            "9090",
            "--serial-path",
            "/dev/ttyACM1",
            "--asset-dir",
            "/srv/preamp",
        ]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.serial.path, PathBuf::from("/dev/ttyACM1"));
        assert_eq!(config.web.asset_dir, PathBuf::from("/srv/preamp"));
    }

    #[test]
    fn test_cli_overrides_win_over_file() {
        // Arrange: a file that sets the port
        let path = std::env::temp_dir().join(format!("preamp-cli-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[http]\nport = 7000\n\n[serial]\nbaud = 9600\n").unwrap();
        let path_arg = path.to_string_lossy().into_owned();
        let cli = Cli::parse_from(["preamp-bridge", "--config", &path_arg, "--http-port", "7001"]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert: CLI wins for the port, the file still supplies the baud rate
        assert_eq!(config.http.port, 7001);
        assert_eq!(config.serial.baud, 9600);
    }

    #[test]
    fn test_into_bridge_config_malformed_file_is_error() {
        let path = std::env::temp_dir().join(format!("preamp-cli-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[http\n").unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from(["preamp-bridge", "--config", &path_arg]);

        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        let result = Cli::try_parse_from(["preamp-bridge", "--http-port", "eighty"]);
        assert!(result.is_err());
    }
}
