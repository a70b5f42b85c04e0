//! Values flowing through the ingestion pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Bytes delivered by one read from the device, stamped on arrival.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChunk {
    /// The bytes exactly as read from the device.
    pub bytes: Vec<u8>,
    /// When the read completed.
    pub arrived_at: DateTime<Utc>,
}

impl RawChunk {
    /// Create a chunk stamped with the current time.
    #[must_use]
    pub fn now(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            arrived_at: Utc::now(),
        }
    }

    /// Number of bytes in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the chunk carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for RawChunk {
    fn from(s: &str) -> Self {
        Self::now(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for RawChunk {
    fn from(b: &[u8]) -> Self {
        Self::now(b.to_vec())
    }
}

/// One decoded sensor value.
///
/// Cloning is cheap: the payload is shared, so fanning a reading out to many
/// clients never copies the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reading {
    /// Sequence number within the current device session (starts at 1).
    pub seq: u64,
    /// Trimmed UTF-8 payload of the frame.
    pub payload: Arc<str>,
    /// Arrival time of the chunk that completed the frame.
    pub received_at: DateTime<Utc>,
}

impl Reading {
    /// Build a reading.
    #[must_use]
    pub fn new(seq: u64, payload: impl Into<Arc<str>>, received_at: DateTime<Utc>) -> Self {
        Self {
            seq,
            payload: payload.into(),
            received_at,
        }
    }

    /// The payload as a string slice.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_from_str_keeps_bytes() {
        let chunk = RawChunk::from("23.5\n");
        assert_eq!(chunk.bytes, b"23.5\n");
        assert_eq!(chunk.len(), 5);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn empty_chunk() {
        let chunk = RawChunk::now(Vec::new());
        assert!(chunk.is_empty());
    }

    #[test]
    fn reading_clone_shares_payload() {
        let r = Reading::new(1, "22.0", Utc::now());
        let c = r.clone();
        assert!(Arc::ptr_eq(&r.payload, &c.payload));
        assert_eq!(c.payload(), "22.0");
    }
}
