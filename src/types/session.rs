//! Session descriptors handed from the dispatcher to a desk

use std::fmt;

/// Transport-assigned identifier of one client's byte-stream pair
pub type SessionId = u64;

/// Opaque handle to one client's bidirectional channel
///
/// Built by the dispatcher from a connection announcement and consumed exactly
/// once by the desk that dequeues it. It is deliberately not `Clone`, so
/// ownership moves from dispatcher to queue to desk.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionDescriptor {
    /// Identifier the transport uses to open the channel
    pub id: SessionId,

    /// Human-readable endpoint description (peer address, pipe names, ...)
    pub endpoint: String,
}

impl SessionDescriptor {
    pub fn new(id: SessionId, endpoint: impl Into<String>) -> Self {
        SessionDescriptor {
            id,
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {} ({})", self.id, self.endpoint)
    }
}
