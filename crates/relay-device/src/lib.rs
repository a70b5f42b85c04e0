//! # relay-device
//!
//! The ingestion side of the relay:
//!
//! - [`transport`]: the byte-source seam ([`Transport`], [`Opener`]) with a
//!   `serialport` implementation
//! - [`reader`]: [`DeviceReader`], which owns the device on a dedicated
//!   thread and exposes its chunks as a [`futures::Stream`]
//! - [`decoder`]: [`FrameDecoder`], line framing with partial-line reassembly
//! - [`stream`]: [`decode_stream`], the lazy reading sequence fed to the hub

#![deny(unsafe_code)]

pub mod decoder;
pub mod errors;
pub mod reader;
pub mod stream;
pub mod transport;

pub use decoder::FrameDecoder;
pub use errors::{DecodeError, DeviceError};
pub use reader::{DeviceEvent, DeviceReader, DeviceStream, ReaderConfig, ReaderState, ReconnectPolicy};
pub use stream::decode_stream;
pub use transport::{Opener, SerialOpener, Transport};
