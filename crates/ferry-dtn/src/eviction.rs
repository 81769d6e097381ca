//! Buffer eviction policy
//!
//! Picks the message to sacrifice when the buffer has to free space. Within
//! a class the least recently received message goes first; the class order
//! decides whether replies or ordinary messages are sacrificed first.

use serde::{Deserialize, Serialize};

use ferry_core::{Message, MessageId, PeerIdentity};

/// Which class of message is sacrificed first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionOrder {
    /// Ordinary messages go first; a reply is only evicted when nothing else
    /// is eligible
    #[default]
    ProtectResponses,
    /// Replies go first, then ordinary messages
    ResponsesFirst,
}

/// Configuration for the eviction policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    pub order: EvictionOrder,
}

/// Choose a victim among `messages`
///
/// Messages for which `excluded` returns true (typically those being sent)
/// are never chosen. Ties on receive time keep the earliest in iteration
/// order. Returns `None` when nothing is eligible.
pub fn select_victim<'a, I, F>(
    messages: impl IntoIterator<Item = &'a Message<I>>,
    order: EvictionOrder,
    excluded: F,
) -> Option<MessageId>
where
    I: PeerIdentity,
    F: Fn(&MessageId) -> bool,
{
    let mut best: Option<&Message<I>> = None;

    for candidate in messages {
        if excluded(&candidate.id) {
            continue;
        }
        best = match best {
            Some(current) if !is_better_victim(candidate, current, order) => Some(current),
            _ => Some(candidate),
        };
    }

    best.map(|message| message.id.clone())
}

/// Check if `candidate` should be evicted before `current`
fn is_better_victim<I: PeerIdentity>(
    candidate: &Message<I>,
    current: &Message<I>,
    order: EvictionOrder,
) -> bool {
    let preferred = |message: &Message<I>| match order {
        EvictionOrder::ProtectResponses => !message.is_response_routed(),
        EvictionOrder::ResponsesFirst => message.is_response_routed(),
    };

    match (preferred(candidate), preferred(current)) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.received_at < current.received_at,
    }
}
