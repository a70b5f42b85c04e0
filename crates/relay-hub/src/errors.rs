//! Registration errors.

use relay_core::ConnectionId;
use thiserror::Error;

/// Why the hub refused a registration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HubError {
    /// A handle with this id is already registered.
    #[error("connection {0} is already registered")]
    Duplicate(ConnectionId),

    /// The hub is at `max_clients`.
    #[error("client limit of {max} reached")]
    CapacityReached {
        /// Configured limit.
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = HubError::Duplicate(ConnectionId::from("conn_a"));
        assert_eq!(err.to_string(), "connection conn_a is already registered");
        let err = HubError::CapacityReached { max: 2 };
        assert_eq!(err.to_string(), "client limit of 2 reached");
    }
}
