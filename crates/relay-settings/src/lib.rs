//! # relay-settings
//!
//! Configuration for the sensor relay, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, read_settings_file, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RelaySettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = RelaySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.serial.path, "/dev/ttyUSB0");
        assert_eq!(settings.serial.baud_rate, 115_200);
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.hub.queue_capacity, 64);
        assert!(!settings.serial.reconnect.enabled);
    }
}
