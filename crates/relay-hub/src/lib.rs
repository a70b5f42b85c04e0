//! # relay-hub
//!
//! Fan-out of decoded readings to connected clients.
//!
//! The [`BroadcastHub`] owns the registry of [`ClientHandle`]s. Publishing
//! never waits on a client: each handle has a bounded [`OutboundQueue`] that
//! drops its oldest entry when full.

#![deny(unsafe_code)]

pub mod errors;
pub mod handle;
pub mod hub;
pub mod queue;

pub use errors::HubError;
pub use handle::ClientHandle;
pub use hub::{BroadcastHub, HubConfig, HubStats, PublishReport};
pub use queue::{OutboundQueue, PushOutcome};
