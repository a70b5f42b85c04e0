//! # relay-server
//!
//! Axum HTTP + `WebSocket` front of the relay.
//!
//! - `GET /ws`: push channel, one `sensorData` text frame per reading
//! - `GET /health`: liveness and counters
//! - everything else: static assets from the configured directory
//! - [`ingest::IngestBridge`]: drives decoded readings into the hub
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod ingest;
pub mod server;
pub mod shutdown;
pub mod websocket;
