//! Device and decode error types.

use std::io;

use thiserror::Error;

/// Failures of the serial device. Any of these ends the reader's sequence
/// unless reconnect is configured.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device could not be opened.
    #[error("failed to open {path}: {reason}")]
    Open {
        /// Device path.
        path: String,
        /// Driver-reported reason.
        reason: String,
    },

    /// A read failed mid-stream.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Device path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The device went away (EOF, hang-up).
    #[error("device {path} closed the stream")]
    Closed {
        /// Device path.
        path: String,
    },

    /// No bytes arrived within the configured idle timeout.
    #[error("no data from {path} for {idle_ms} ms")]
    Idle {
        /// Device path.
        path: String,
        /// The timeout that elapsed.
        idle_ms: u64,
    },
}

impl DeviceError {
    /// Classify a read error: hang-ups become [`DeviceError::Closed`].
    pub fn from_read(path: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Self::Closed {
                path: path.to_string(),
            },
            _ => Self::Io {
                path: path.to_string(),
                source,
            },
        }
    }

    /// Whether this error happened while opening the device.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// A single frame that could not be turned into a reading. Recoverable: the
/// frame is skipped and decoding continues.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame is not valid UTF-8.
    #[error("frame of {len} bytes is not valid UTF-8: {source}")]
    InvalidUtf8 {
        /// Frame length in bytes.
        len: usize,
        /// Position of the first invalid byte.
        #[source]
        source: std::str::Utf8Error,
    },

    /// The frame grew past the configured limit without a newline.
    #[error("frame exceeded {limit} bytes and was discarded")]
    FrameTooLong {
        /// The configured limit.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hangup_kinds_map_to_closed() {
        for kind in [
            io::ErrorKind::UnexpectedEof,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::NotConnected,
        ] {
            let err = DeviceError::from_read("/dev/ttyUSB0", io::Error::from(kind));
            assert!(matches!(err, DeviceError::Closed { .. }), "{kind:?}");
        }
    }

    #[test]
    fn other_kinds_map_to_io() {
        let err = DeviceError::from_read(
            "/dev/ttyUSB0",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, DeviceError::Io { .. }));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn open_failure_flag() {
        let err = DeviceError::Open {
            path: "/dev/none".into(),
            reason: "No such file or directory".into(),
        };
        assert!(err.is_open_failure());
        assert_eq!(
            err.to_string(),
            "failed to open /dev/none: No such file or directory"
        );
        let closed = DeviceError::Closed {
            path: "/dev/none".into(),
        };
        assert!(!closed.is_open_failure());
    }

    #[test]
    fn frame_too_long_display() {
        let err = DecodeError::FrameTooLong { limit: 16 };
        assert_eq!(err.to_string(), "frame exceeded 16 bytes and was discarded");
    }
}
