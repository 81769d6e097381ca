//! Response routing
//!
//! When a message reaches its destination, the destination answers with a
//! small reply that walks the delivered message's travel history backwards,
//! one recorded hop at a time, instead of asking the learned routes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferry_core::{Message, PeerIdentity, ReturnPath};

/// Configuration for reply synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Send a reply on first delivery
    pub enabled: bool,
    /// Prefix that turns a message ID into its reply's ID
    pub id_prefix: String,
    /// Accounted size of a reply, in bytes
    pub size: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id_prefix: "R_".to_string(),
            size: 10,
        }
    }
}

/// Build the reply to `delivered`, which just arrived at `local`
///
/// The reply originates here, is addressed to the delivered message's
/// source, and carries the delivered history minus this node as its return
/// path.
pub fn build_response<I: PeerIdentity>(
    delivered: &Message<I>,
    local: &I,
    config: &ResponseConfig,
    now: DateTime<Utc>,
) -> Message<I> {
    // Hosts normally append the receiver on arrival; if this one did not,
    // the whole history is still the way back.
    let path = if delivered.travel.last() == Some(local) {
        ReturnPath::reversing(&delivered.travel)
    } else {
        ReturnPath::from_nodes(delivered.travel.nodes().to_vec())
    };

    Message::new(
        delivered.id.response(&config.id_prefix),
        local.clone(),
        delivered.source.clone(),
        Vec::new(),
        now,
    )
    .with_size(config.size)
    .with_return_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{MessageId, SimulationIdentity};

    fn make_id(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    fn delivered(hops: &[char]) -> Message<SimulationIdentity> {
        let source = make_id(hops[0]);
        let destination = make_id(hops[hops.len() - 1]);
        let mut msg = Message::new("m1", source, destination, vec![1; 64], Utc::now());
        for c in &hops[1..] {
            msg.record_hop(make_id(*c));
        }
        msg
    }

    #[test]
    fn test_reply_retraces_history_without_destination() {
        let msg = delivered(&['S', 'X', 'Y', 'D']);
        let reply = build_response(&msg, &make_id('D'), &ResponseConfig::default(), Utc::now());

        assert_eq!(reply.id, MessageId::new("R_m1"));
        assert_eq!(reply.source, make_id('D'));
        assert_eq!(reply.destination, make_id('S'));
        assert_eq!(reply.size, 10);
        assert_eq!(reply.travel.nodes(), &[make_id('D')]);

        let path = reply.return_path.unwrap();
        assert_eq!(path.nodes(), &[make_id('S'), make_id('X'), make_id('Y')]);
        assert_eq!(path.next_hop(), Some(&make_id('Y')));
    }

    #[test]
    fn test_delivered_history_untouched() {
        let msg = delivered(&['S', 'X', 'D']);
        let _ = build_response(&msg, &make_id('D'), &ResponseConfig::default(), Utc::now());
        assert_eq!(msg.travel.len(), 3);
        assert!(!msg.is_response_routed());
    }

    #[test]
    fn test_history_without_local_entry_is_kept_whole() {
        let msg = delivered(&['S', 'X']);
        let reply = build_response(&msg, &make_id('D'), &ResponseConfig::default(), Utc::now());
        assert_eq!(
            reply.return_path.unwrap().nodes(),
            &[make_id('S'), make_id('X')]
        );
    }

    #[test]
    fn test_custom_prefix_and_size() {
        let config = ResponseConfig {
            enabled: true,
            id_prefix: "ack-".to_string(),
            size: 1,
        };
        let msg = delivered(&['S', 'D']);
        let reply = build_response(&msg, &make_id('D'), &config, Utc::now());
        assert_eq!(reply.id.as_str(), "ack-m1");
        assert_eq!(reply.size, 1);
    }
}
