//! Delivery/duplicate guard
//!
//! Checked on every inbound header before a transfer starts. A message that
//! already visited this node, was already delivered here, or was discarded
//! here by an application filter is turned away.

use std::fmt;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ferry_core::{Message, MessageId, PeerIdentity};

/// Why an inbound message was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// This node is already in the message's travel history
    Looped,
    /// The message was already delivered to this node
    AlreadyDelivered,
    /// An application filter discarded this message here before
    Blacklisted,
    /// A copy of the message is already in this node's buffer
    AlreadyHeld,
    /// The buffer cannot make room for the message
    NoSpace,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Looped => write!(f, "already visited this node"),
            RejectReason::AlreadyDelivered => write!(f, "already delivered"),
            RejectReason::Blacklisted => write!(f, "discarded by application"),
            RejectReason::AlreadyHeld => write!(f, "copy already held"),
            RejectReason::NoSpace => write!(f, "no buffer space"),
        }
    }
}

/// Outcome of offering a message header to this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveVerdict {
    /// The transfer may start
    Accept,
    /// The transfer must not start
    Reject { reason: RejectReason },
}

impl ReceiveVerdict {
    pub fn reject(reason: RejectReason) -> Self {
        ReceiveVerdict::Reject { reason }
    }

    /// Check if the message was accepted
    pub fn is_accept(&self) -> bool {
        matches!(self, ReceiveVerdict::Accept)
    }

    /// Get the rejection reason, if any
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            ReceiveVerdict::Reject { reason } => Some(*reason),
            ReceiveVerdict::Accept => None,
        }
    }
}

/// Intake guard for one node
pub struct DuplicateGuard<I: PeerIdentity> {
    local: I,
    delivered: DashSet<MessageId>,
    blacklisted: DashSet<MessageId>,
}

impl<I: PeerIdentity> DuplicateGuard<I> {
    pub fn new(local: I) -> Self {
        Self {
            local,
            delivered: DashSet::new(),
            blacklisted: DashSet::new(),
        }
    }

    /// Decide whether `message`, offered by `from`, may be received
    pub fn check(&self, message: &Message<I>, from: &I) -> ReceiveVerdict {
        let reason = if message.has_visited(&self.local) {
            RejectReason::Looped
        } else if self.is_delivered(&message.id) {
            RejectReason::AlreadyDelivered
        } else if self.is_blacklisted(&message.id) {
            RejectReason::Blacklisted
        } else {
            return ReceiveVerdict::Accept;
        };

        debug!(
            message_id = %message.id,
            from = %from,
            reason = %reason,
            "Rejected inbound message"
        );
        ReceiveVerdict::reject(reason)
    }

    /// Remember a delivery; returns true the first time
    pub fn record_delivery(&self, message_id: &MessageId) -> bool {
        self.delivered.insert(message_id.clone())
    }

    /// Check if a message was delivered here
    pub fn is_delivered(&self, message_id: &MessageId) -> bool {
        self.delivered.contains(message_id)
    }

    /// Remember that an application filter discarded a message
    pub fn blacklist(&self, message_id: &MessageId) {
        self.blacklisted.insert(message_id.clone());
    }

    /// Check if a message was discarded here
    pub fn is_blacklisted(&self, message_id: &MessageId) -> bool {
        self.blacklisted.contains(message_id)
    }
}
