//! Per-client write errors.

use thiserror::Error;

/// A failed write to one client. Always ends that client's session.
#[derive(Debug, Error)]
pub enum ClientWriteError {
    /// The frame did not complete within the write timeout.
    #[error("write timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The transport rejected the frame.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// The reading could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = ClientWriteError::Timeout { timeout_ms: 250 };
        assert_eq!(err.to_string(), "write timed out after 250 ms");
    }
}
