//! `WebSocket` push channel.

pub mod heartbeat;
pub mod message;
pub mod session;
