//! Server configuration, and the mapping from settings to component configs.

use std::path::PathBuf;
use std::time::Duration;

use relay_device::{ReaderConfig, ReconnectPolicy};
use relay_hub::HubConfig;
use relay_settings::{HubSettings, SerialSettings, ServerSettings};
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Directory served for non-API paths.
    pub static_dir: PathBuf,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Per-frame write timeout in milliseconds.
    pub write_timeout_ms: u64,
    /// How long graceful shutdown waits for tasks, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: PathBuf::from("public"),
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            write_timeout_ms: 10_000,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Write timeout.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            static_dir: PathBuf::from(&s.static_dir),
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            write_timeout_ms: s.write_timeout_ms,
            shutdown_timeout_secs: s.shutdown_timeout_secs,
        }
    }
}

/// Reader configuration for a serial settings block.
pub fn reader_config(s: &SerialSettings) -> ReaderConfig {
    let reconnect = if s.reconnect.enabled {
        ReconnectPolicy {
            enabled: true,
            base_delay: Duration::from_millis(s.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(s.reconnect.max_delay_ms),
            max_attempts: s.reconnect.max_attempts,
        }
    } else {
        ReconnectPolicy::disabled()
    };
    ReaderConfig {
        read_buffer_size: s.read_buffer_size,
        idle_timeout: s.idle_timeout_ms.map(Duration::from_millis),
        reconnect,
        ..ReaderConfig::default()
    }
}

/// Hub configuration for a hub settings block.
pub fn hub_config(s: &HubSettings) -> HubConfig {
    HubConfig {
        queue_capacity: s.queue_capacity,
        max_clients: s.max_clients,
    }
}
