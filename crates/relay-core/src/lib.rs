//! # relay-core
//!
//! Foundation types shared by every crate in the sensor relay:
//!
//! - [`RawChunk`] and [`Reading`]: the two values flowing through the
//!   ingestion pipeline
//! - [`ConnectionId`]: branded identifier for connected clients
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod reading;

pub use ids::ConnectionId;
pub use reading::{RawChunk, Reading};
