//! Message types for store-carry-forward transfer
//!
//! A [`Message`] carries two separate node sequences:
//!
//! - [`TravelHistory`]: every node the message has physically visited. It can
//!   only grow.
//! - [`ReturnPath`]: present only on replies. It is derived once, from the
//!   delivered message's history, and can only shrink.
//!
//! Keeping them apart means consuming a reply's path can never rewrite the
//! history that loop detection and route learning read.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Create a message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the ID of the reply to this message
    ///
    /// Deterministic: the same message always yields the same reply ID.
    pub fn response(&self, prefix: &str) -> Self {
        Self(format!("{}{}", prefix, self.0))
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Append-only record of the nodes a message has visited, origin first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct TravelHistory<I: PeerIdentity> {
    nodes: Vec<I>,
}

impl<I: PeerIdentity> TravelHistory<I> {
    /// Start a history at the message's origin
    pub fn new(origin: I) -> Self {
        Self {
            nodes: vec![origin],
        }
    }

    /// Build a history from an explicit node sequence
    pub fn from_nodes(nodes: Vec<I>) -> Self {
        Self { nodes }
    }

    /// Record that the message reached `node`
    pub fn push(&mut self, node: I) {
        self.nodes.push(node);
    }

    /// Check whether the message has visited `node`
    pub fn contains(&self, node: &I) -> bool {
        self.nodes.contains(node)
    }

    /// The most recently visited node
    pub fn last(&self) -> Option<&I> {
        self.nodes.last()
    }

    /// All visited nodes, origin first
    pub fn nodes(&self) -> &[I] {
        &self.nodes
    }

    /// Number of visited nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pop-only stack of nodes a reply must retrace
///
/// The next hop is always the last entry. Each node the reply reaches pops
/// itself off, so the path is empty exactly when the reply has walked back
/// to the original sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct ReturnPath<I: PeerIdentity> {
    remaining: Vec<I>,
}

impl<I: PeerIdentity> ReturnPath<I> {
    /// Derive the return path for a reply to a delivered message
    ///
    /// The final history entry is the delivering node itself, so it is left
    /// out: `[S, H1, H2, D]` becomes `[S, H1, H2]` with `H2` next.
    pub fn reversing(history: &TravelHistory<I>) -> Self {
        let nodes = history.nodes();
        let keep = nodes.len().saturating_sub(1);
        Self {
            remaining: nodes[..keep].to_vec(),
        }
    }

    /// Build a path from an explicit node sequence (next hop last)
    pub fn from_nodes(remaining: Vec<I>) -> Self {
        Self { remaining }
    }

    /// The node the reply must reach next
    pub fn next_hop(&self) -> Option<&I> {
        self.remaining.last()
    }

    /// Pop the next hop if it is `node`
    ///
    /// Returns false, leaving the path untouched, when `node` is not the next
    /// hop.
    pub fn advance_past(&mut self, node: &I) -> bool {
        if self.remaining.last() == Some(node) {
            self.remaining.pop();
            true
        } else {
            false
        }
    }

    /// Check whether every hop has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Remaining hops, origin first
    pub fn nodes(&self) -> &[I] {
        &self.remaining
    }

    /// Number of remaining hops
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Alias of [`ReturnPath::is_exhausted`]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// The unit of store-carry-forward transfer
///
/// The payload is immutable once created; the metadata (history, receive
/// time, return path) is updated as copies move between nodes. Every node
/// holds its own independent copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct Message<I: PeerIdentity> {
    /// Unique message identifier
    pub id: MessageId,
    /// Originating node
    pub source: I,
    /// Final destination
    pub destination: I,
    /// Application/content tag used to select application filters
    pub app_id: Option<String>,
    /// Opaque payload
    pub payload: Vec<u8>,
    /// Size accounted against buffers, in bytes
    pub size: usize,
    /// When the origin created the message
    pub created_at: DateTime<Utc>,
    /// When the current holder obtained its copy
    pub received_at: DateTime<Utc>,
    /// Nodes this copy has visited
    pub travel: TravelHistory<I>,
    /// Path a reply retraces; `None` for ordinary messages
    pub return_path: Option<ReturnPath<I>>,
}

impl<I: PeerIdentity> Message<I> {
    /// Create a message at its origin
    pub fn new(
        id: impl Into<MessageId>,
        source: I,
        destination: I,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let size = payload.len();
        Self {
            id: id.into(),
            travel: TravelHistory::new(source.clone()),
            source,
            destination,
            app_id: None,
            payload,
            size,
            created_at,
            received_at: created_at,
            return_path: None,
        }
    }

    /// Tag the message for a specific application
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Override the accounted size
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Attach a return path, turning this into a response-routed message
    pub fn with_return_path(mut self, path: ReturnPath<I>) -> Self {
        self.return_path = Some(path);
        self
    }

    /// Check if this message is a reply travelling on a return path
    pub fn is_response_routed(&self) -> bool {
        self.return_path.is_some()
    }

    /// Check if this copy has already visited `node`
    pub fn has_visited(&self, node: &I) -> bool {
        self.travel.contains(node)
    }

    /// Record arrival at `node` (done by the transport on each hop)
    pub fn record_hop(&mut self, node: I) {
        self.travel.push(node);
    }

    /// Stamp the time the current holder obtained this copy
    pub fn mark_received(&mut self, at: DateTime<Utc>) {
        self.received_at = at;
    }

    /// Number of hops this copy has taken
    pub fn hop_count(&self) -> usize {
        self.travel.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SimulationIdentity;

    fn id(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    fn history(chars: &str) -> TravelHistory<SimulationIdentity> {
        TravelHistory::from_nodes(chars.chars().map(id).collect())
    }

    #[test]
    fn test_new_message_starts_at_origin() {
        let msg = Message::new("m1", id('A'), id('D'), b"hi".to_vec(), Utc::now());

        assert_eq!(msg.size, 2);
        assert_eq!(msg.travel.nodes(), &[id('A')]);
        assert_eq!(msg.hop_count(), 0);
        assert!(!msg.is_response_routed());
        assert!(msg.has_visited(&id('A')));
    }

    #[test]
    fn test_record_hop_appends() {
        let mut msg = Message::new("m1", id('A'), id('D'), vec![], Utc::now());
        msg.record_hop(id('B'));
        msg.record_hop(id('C'));

        assert_eq!(msg.travel.nodes(), &[id('A'), id('B'), id('C')]);
        assert_eq!(msg.travel.last(), Some(&id('C')));
        assert_eq!(msg.hop_count(), 2);
    }

    #[test]
    fn test_return_path_drops_delivering_node() {
        let path = ReturnPath::reversing(&history("SXYD"));
        assert_eq!(path.nodes(), &[id('S'), id('X'), id('Y')]);
        assert_eq!(path.next_hop(), Some(&id('Y')));
    }

    #[test]
    fn test_return_path_shrinks_one_hop_at_a_time() {
        let mut path = ReturnPath::reversing(&history("SXYD"));

        assert!(!path.advance_past(&id('X')));
        assert_eq!(path.len(), 3);

        assert!(path.advance_past(&id('Y')));
        assert!(path.advance_past(&id('X')));
        assert_eq!(path.next_hop(), Some(&id('S')));
        assert!(path.advance_past(&id('S')));
        assert!(path.is_exhausted());
        assert_eq!(path.next_hop(), None);
    }

    #[test]
    fn test_consuming_return_path_leaves_history_intact() {
        let delivered = history("SXD");
        let mut path = ReturnPath::reversing(&delivered);
        path.advance_past(&id('X'));

        assert_eq!(delivered.nodes(), &[id('S'), id('X'), id('D')]);
    }

    #[test]
    fn test_response_id_is_deterministic() {
        let original = MessageId::new("m1");
        assert_eq!(original.response("R_"), MessageId::new("R_m1"));
        assert_eq!(original.response("R_"), original.response("R_"));
    }
}
