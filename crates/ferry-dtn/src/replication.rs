//! Replication tracker
//!
//! Remembers which peers each resident message has been handed to, bounding
//! how many copies this node spreads before it gives up on a message.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use ferry_core::{MessageId, PeerIdentity};

/// How sends count towards the replication bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplicationCounting {
    /// Every completed send counts, even to a peer already sent to
    #[default]
    PerSend,
    /// Only distinct peers count
    DistinctPeers,
}

/// Configuration for the replication tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Sends after which a message is exhausted
    pub bound: usize,
    /// How sends are counted
    pub counting: ReplicationCounting,
    /// Delete a message from the buffer once it is exhausted
    pub drop_when_exhausted: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            bound: 3,
            counting: ReplicationCounting::PerSend,
            drop_when_exhausted: true,
        }
    }
}

#[derive(Debug)]
struct ReplicationRecord<I> {
    /// Peers in send order; may repeat
    peers: Vec<I>,
}

impl<I> Default for ReplicationRecord<I> {
    fn default() -> Self {
        Self { peers: Vec::new() }
    }
}

/// Per-message record of the peers a message was handed to
pub struct ReplicationTracker<I: PeerIdentity> {
    records: DashMap<MessageId, ReplicationRecord<I>>,
    config: ReplicationConfig,
}

impl<I: PeerIdentity> ReplicationTracker<I> {
    /// Create a tracker
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    /// Record that `message_id` was handed to `peer`
    pub fn record_send(&self, message_id: &MessageId, peer: &I) {
        let mut record = self.records.entry(message_id.clone()).or_default();
        record.peers.push(peer.clone());
        trace!(message_id = %message_id, peer = %peer, sends = record.peers.len(), "Recorded send");
    }

    /// Sends that count towards the bound
    pub fn sent_count(&self, message_id: &MessageId) -> usize {
        let Some(record) = self.records.get(message_id) else {
            return 0;
        };
        match self.config.counting {
            ReplicationCounting::PerSend => record.peers.len(),
            ReplicationCounting::DistinctPeers => {
                let mut distinct: Vec<&I> = Vec::with_capacity(record.peers.len());
                for peer in &record.peers {
                    if !distinct.contains(&peer) {
                        distinct.push(peer);
                    }
                }
                distinct.len()
            }
        }
    }

    /// Peers the message was sent to, in send order
    pub fn sent_to(&self, message_id: &MessageId) -> Vec<I> {
        self.records
            .get(message_id)
            .map(|record| record.peers.clone())
            .unwrap_or_default()
    }

    /// Check if the message was already handed to `peer`
    pub fn has_sent_to(&self, message_id: &MessageId, peer: &I) -> bool {
        self.records
            .get(message_id)
            .is_some_and(|record| record.peers.contains(peer))
    }

    /// Check if the message has used up its replication budget
    ///
    /// A message handed to its destination is not tracked here: the router
    /// removes it from the buffer, which clears its record.
    pub fn is_exhausted(&self, message_id: &MessageId) -> bool {
        self.sent_count(message_id) >= self.config.bound
    }

    /// Forget a message (called when it leaves the buffer)
    pub fn clear(&self, message_id: &MessageId) {
        self.records.remove(message_id);
    }

    /// Number of messages being tracked
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    /// The tracker's configuration
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }
}

impl<I: PeerIdentity> Default for ReplicationTracker<I> {
    fn default() -> Self {
        Self::new(ReplicationConfig::default())
    }
}
