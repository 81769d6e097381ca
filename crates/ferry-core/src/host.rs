//! Collaborator traits implemented by whatever hosts a forwarding node
//!
//! The forwarding core owns routing state only. The message buffer, the
//! contact set and the transfer machinery belong to the host (a simulator or
//! a real transport) and are reached through these traits.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::identity::PeerIdentity;
use crate::message::{Message, MessageId};

/// Opaque handle for an established link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A peer reachable during the current tick
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Contact<I: PeerIdentity> {
    /// The peer on the other end of the link
    pub peer: I,
    /// Handle passed back to [`ContactHost::attempt_transfer`]
    pub connection: ConnectionId,
}

impl<I: PeerIdentity> Contact<I> {
    pub fn new(peer: I, connection: ConnectionId) -> Self {
        Self { peer, connection }
    }
}

/// How an outbound transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// The receiver got the whole message
    Completed,
    /// The link dropped or the transfer was cancelled
    Aborted,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed)
    }
}

/// Access to the node's local message buffer
pub trait BufferHost<I: PeerIdentity> {
    /// Resident messages, in the buffer's iteration order
    fn buffer_contents(&self) -> Vec<Message<I>>;

    /// Check if a message is resident
    fn contains_message(&self, id: &MessageId) -> bool;

    /// Store a message; the caller has already made room for it
    fn insert_message(&mut self, message: Message<I>);

    /// Remove a message, returning it if it was resident
    fn remove_message(&mut self, id: &MessageId) -> Option<Message<I>>;

    /// Bytes currently free in the buffer
    fn free_buffer_space(&self) -> usize;

    /// Total buffer size in bytes
    fn buffer_capacity(&self) -> usize;

    /// Check if a message is currently being sent and must not be evicted
    fn is_sending(&self, id: &MessageId) -> bool;

    /// The host's notion of the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Live contacts and transfer primitives for one tick
pub trait ContactHost<I: PeerIdentity>: BufferHost<I> {
    /// Peers reachable right now
    fn current_contacts(&self) -> Vec<Contact<I>>;

    /// Ask the transport to start sending `message` over `contact`
    ///
    /// `Ok` means the transfer started; its completion is reported later
    /// through the node's send-complete entry point.
    fn attempt_transfer(
        &mut self,
        message: &Message<I>,
        contact: &Contact<I>,
    ) -> Result<(), TransferError>;

    /// Check if this node already has a transfer running
    fn is_transfer_in_progress(&self) -> bool;

    /// Check if a new transfer may start this tick
    fn can_start_transfer(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_outcome() {
        assert!(TransferOutcome::Completed.is_completed());
        assert!(!TransferOutcome::Aborted.is_completed());
        assert_eq!(ConnectionId(3).to_string(), "conn#3");
    }
}
