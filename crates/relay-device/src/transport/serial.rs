//! `serialport`-backed transport.

use std::io::{self, Read};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use super::{Opener, Transport};
use crate::errors::DeviceError;

/// An open serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Opens a serial port at a fixed path and baud rate (8N1, no flow control).
#[derive(Clone, Debug)]
pub struct SerialOpener {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialOpener {
    /// Describe the endpoint to open.
    pub fn new(path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout,
        }
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Opener for SerialOpener {
    fn open(&self) -> Result<Box<dyn Transport>, DeviceError> {
        let port = serialport::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| DeviceError::Open {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        info!(path = %self.path, baud_rate = self.baud_rate, "serial port opened");
        Ok(Box::new(SerialTransport { port }))
    }

    fn path(&self) -> &str {
        &self.path
    }
}
