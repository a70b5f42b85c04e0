//! # sensor-relay
//!
//! Relay binary: reads one serial sensor, pushes every reading to all
//! connected `WebSocket` clients, and serves the dashboard assets.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use relay_core::logging::{LogFormat, init_subscriber};
use relay_device::{DeviceReader, FrameDecoder, SerialOpener, decode_stream};
use relay_hub::BroadcastHub;
use relay_server::config::{ServerConfig, hub_config, reader_config};
use relay_server::ingest::{IngestBridge, IngestExit};
use relay_server::server::RelayServer;
use relay_settings::RelaySettings;
use tracing::{error, info, warn};

/// Serial sensor telemetry relay.
#[derive(Parser, Debug)]
#[command(name = "sensor-relay", about = "Relay serial sensor readings to WebSocket clients")]
struct Cli {
    /// Settings file (default `~/.sensor-relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device path (overrides settings).
    #[arg(long)]
    serial_path: Option<String>,

    /// Serial baud rate (overrides settings).
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static assets (overrides settings).
    #[arg(long)]
    static_dir: Option<String>,

    /// Log level or filter directive (overrides settings; `RUST_LOG` wins).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply flags over loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref path) = self.serial_path {
            settings.serial.path.clone_from(path);
        }
        if let Some(baud) = self.baud_rate {
            settings.serial.baud_rate = baud;
        }
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref dir) = self.static_dir {
            settings.server.static_dir.clone_from(dir);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

/// Defaults, then file, then env, then flags.
fn load_settings(cli: &Cli) -> Result<RelaySettings> {
    let mut settings = match cli.config {
        Some(ref path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            relay_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?
        }
        None => relay_settings::load_settings().context("Failed to load settings")?,
    };
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&settings.logging.level, format);
    info!(version = env!("CARGO_PKG_VERSION"), "starting sensor relay");

    let hub = Arc::new(BroadcastHub::new(hub_config(&settings.hub)));
    let opener = Arc::new(SerialOpener::new(
        settings.serial.path.clone(),
        settings.serial.baud_rate,
        Duration::from_millis(settings.serial.read_timeout_ms),
    ));

    let device = DeviceReader::start(opener, reader_config(&settings.serial))
        .with_context(|| format!("Failed to open serial device {}", settings.serial.path))?;

    let server = RelayServer::new(
        ServerConfig::from(&settings.server),
        Arc::clone(&hub),
        device.state(),
    );
    let (addr, serve) = server.listen().await.with_context(|| {
        format!(
            "Failed to bind {}:{}",
            settings.server.host, settings.server.port
        )
    })?;
    info!(%addr, device = %settings.serial.path, "relay ready");

    let bridge = IngestBridge::new(Arc::clone(&hub), server.shutdown().token());
    let decoder = FrameDecoder::new(settings.serial.max_frame_len);
    let ingest = tokio::spawn(async move {
        match bridge.run(decode_stream(device, decoder)).await {
            IngestExit::DeviceFailed(e) => {
                error!(error = %e, "device lost; clients stay connected but will receive no readings");
            }
            IngestExit::Ended => warn!("device stream ended"),
            IngestExit::Cancelled => {}
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(
            server.hub(),
            vec![serve, ingest],
            Some(server.config().shutdown_timeout()),
        )
        .await;
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_are_empty() {
        let cli = Cli::parse_from(["sensor-relay"]);
        assert!(cli.config.is_none());
        assert!(cli.serial_path.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "sensor-relay",
            "--serial-path",
            "/dev/ttyACM0",
            "--baud-rate",
            "9600",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--static-dir",
            "web",
            "--log-level",
            "debug",
        ]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.serial.path, "/dev/ttyACM0");
        assert_eq!(settings.serial.baud_rate, 9600);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.static_dir, "web");
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn unset_flags_keep_settings() {
        let cli = Cli::parse_from(["sensor-relay", "--port", "4000"]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.serial.path, "/dev/ttyUSB0");
        assert_eq!(settings.serial.baud_rate, 115_200);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let cli = Cli::parse_from(["sensor-relay", "--config", path.to_str().unwrap()]);
        let err = load_settings(&cli).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"serial": {"path": "/dev/ttyS1", "baudRate": 57600}, "hub": {"queueCapacity": 8}}"#,
        )
        .unwrap();
        let cli = Cli::parse_from([
            "sensor-relay",
            "--config",
            path.to_str().unwrap(),
            "--baud-rate",
            "19200",
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.serial.path, "/dev/ttyS1");
        assert_eq!(settings.serial.baud_rate, 19_200);
        assert_eq!(settings.hub.queue_capacity, 8);
    }

    #[test]
    fn zero_baud_from_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{}").unwrap();
        let cli = Cli::parse_from([
            "sensor-relay",
            "--config",
            path.to_str().unwrap(),
            "--baud-rate",
            "0",
        ]);
        let err = load_settings(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("baudRate"));
    }
}
