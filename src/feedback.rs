use educe::Educe;
use thiserror::Error;

use crate::framework::RoutingSystem;

/// Decode failures for inbound control messages. These are expected under
/// corrupted or adversarial input; the message is dropped locally and never
/// propagated to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("control message is empty")]
    Empty,
    #[error("unknown message type {0}")]
    UnknownType(u8),
    #[error("message truncated or padded: expected {expected} payload bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
    #[error("invalid binary route state {0}")]
    InvalidState(u32),
}

/// Table inconsistencies observed mid-cycle. Although this is an error enum,
/// these should be treated as warnings: the affected operation is skipped for
/// the cycle and repaired by the next periodic advertisement.
#[derive(Error)]
#[derive(Educe)]
#[educe(Debug)]
pub enum RoutingWarning<T: RoutingSystem + ?Sized> {
    /// The forwarding table was expected to hold this destination.
    #[error("no forwarding entry for an expected destination")]
    MissingForwardingEntry { dest: T::NodeAddress },
    /// A live neighbour has no distance vector yet (no advertisement seen).
    #[error("no distance vector for a live neighbour")]
    MissingVector { neighbour: T::NodeAddress },
}
