//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a settings file only needs the
//! keys it wants to change. Keys are camelCase on disk.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Serial device settings.
    pub serial: SerialSettings,
    /// HTTP / WebSocket server settings.
    pub server: ServerSettings,
    /// Broadcast hub settings.
    pub hub: HubSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.serial.path.trim().is_empty() {
            return Err(invalid("serial.path must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(invalid("serial.baudRate must be > 0"));
        }
        if self.serial.max_frame_len == 0 {
            return Err(invalid("serial.maxFrameLen must be > 0"));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(invalid("serial.readTimeoutMs must be > 0"));
        }
        if self.serial.read_buffer_size == 0 {
            return Err(invalid("serial.readBufferSize must be > 0"));
        }
        if self.hub.queue_capacity == 0 {
            return Err(invalid("hub.queueCapacity must be > 0"));
        }
        if self.hub.max_clients == 0 {
            return Err(invalid("hub.maxClients must be > 0"));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(invalid("server.heartbeatIntervalSecs must be > 0"));
        }
        if self.server.heartbeat_timeout_secs <= self.server.heartbeat_interval_secs {
            return Err(invalid(
                "server.heartbeatTimeoutSecs must exceed heartbeatIntervalSecs",
            ));
        }
        let reconnect = &self.serial.reconnect;
        if reconnect.enabled && reconnect.base_delay_ms > reconnect.max_delay_ms {
            return Err(invalid(
                "serial.reconnect.baseDelayMs must not exceed maxDelayMs",
            ));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SettingsError {
    SettingsError::InvalidValue(msg.to_string())
}

/// Serial endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialSettings {
    /// Device path (e.g. `/dev/ttyUSB0`).
    pub path: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds. Timeouts are not errors; they let the
    /// reader check the idle deadline.
    pub read_timeout_ms: u64,
    /// Fail the device if no bytes arrive for this long. `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,
    /// Size of the buffer handed to each read call.
    pub read_buffer_size: usize,
    /// Longest frame (in bytes) the decoder will buffer before discarding it.
    pub max_frame_len: usize,
    /// Reconnect policy after a mid-stream failure.
    pub reconnect: ReconnectSettings,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 500,
            idle_timeout_ms: None,
            read_buffer_size: 1024,
            max_frame_len: 4096,
            reconnect: ReconnectSettings::default(),
        }
    }
}

/// Reconnect policy. Disabled by default: a failed device stays failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Whether to reopen the device after a failure.
    pub enabled: bool,
    /// First backoff delay in milliseconds; doubles per attempt.
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_delay_ms: u64,
    /// Give up after this many consecutive failed attempts. `None` retries
    /// forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

/// HTTP / WebSocket server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Directory of static presentation assets.
    pub static_dir: String,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Reap a client that has not answered pings for this long.
    pub heartbeat_timeout_secs: u64,
    /// Maximum time a single frame write may take before the client is
    /// dropped.
    pub write_timeout_ms: u64,
    /// How long shutdown waits for background tasks.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: "public".to_string(),
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            write_timeout_ms: 10_000,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Broadcast hub settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Per-client outbound queue bound. When full, the oldest reading is
    /// dropped.
    pub queue_capacity: usize,
    /// Maximum simultaneously registered clients.
    pub max_clients: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_clients: 256,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
