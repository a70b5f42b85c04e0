//! Byte-source abstraction for the device reader.
//!
//! [`Opener`] is called once at startup and again for every reconnect
//! attempt; each call yields a fresh [`Transport`].

#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod serial;

use std::io;

pub use serial::{SerialOpener, SerialTransport};

use crate::errors::DeviceError;

/// A readable byte source.
pub trait Transport: Send {
    /// Read available bytes into `buffer`.
    ///
    /// `Ok(0)` means the read timed out with no data; it is not end of
    /// stream. Hang-ups are reported as errors.
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
}

/// Opens the device behind a [`Transport`].
pub trait Opener: Send + Sync + 'static {
    /// Open a new connection to the device.
    fn open(&self) -> Result<Box<dyn Transport>, DeviceError>;

    /// Device path, for logs and errors.
    fn path(&self) -> &str;
}
