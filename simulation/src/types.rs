//! Events and statistics for the Ferry simulation

use serde::{Deserialize, Serialize};

use ferry_core::{MessageId, SimulationIdentity};
use ferry_dtn::{ForwardReason, RejectReason};

/// Node identities in the simulation are single letters
pub type PeerId = SimulationIdentity;

/// Things that happen during a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SimEvent {
    /// A potential link came up
    LinkUp { a: PeerId, b: PeerId, tick: u64 },
    /// A link went down
    LinkDown { a: PeerId, b: PeerId, tick: u64 },
    /// A message was created at its source
    Created {
        message_id: MessageId,
        source: PeerId,
        destination: PeerId,
        tick: u64,
    },
    /// A node started handing a copy to a peer
    TransferStarted {
        message_id: MessageId,
        from: PeerId,
        to: PeerId,
        via: ForwardReason,
        tick: u64,
    },
    /// A copy arrived in full
    TransferCompleted {
        message_id: MessageId,
        from: PeerId,
        to: PeerId,
        tick: u64,
    },
    /// The link dropped before the copy arrived
    TransferAborted {
        message_id: MessageId,
        from: PeerId,
        to: PeerId,
        tick: u64,
    },
    /// The receiver turned a transfer down at its header
    TransferRefused {
        message_id: MessageId,
        from: PeerId,
        to: PeerId,
        reason: RejectReason,
        tick: u64,
    },
    /// A message reached its destination
    Delivered {
        message_id: MessageId,
        to: PeerId,
        travel: Vec<PeerId>,
        first_delivery: bool,
        tick: u64,
    },
    /// A reply made it back to the original sender
    ResponseDelivered {
        message_id: MessageId,
        to: PeerId,
        travel: Vec<PeerId>,
        tick: u64,
    },
    /// An application filter discarded a message
    Discarded {
        message_id: MessageId,
        node: PeerId,
        tick: u64,
    },
    /// A message outlived its TTL in a buffer
    Expired {
        message_id: MessageId,
        node: PeerId,
        tick: u64,
    },
}

/// Simulation statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimStats {
    pub messages_created: u64,
    pub transfers_started: u64,
    pub transfers_completed: u64,
    pub transfers_aborted: u64,
    pub transfers_refused: u64,
    /// First deliveries only
    pub messages_delivered: u64,
    pub duplicate_deliveries: u64,
    pub responses_created: u64,
    pub responses_delivered: u64,
    pub messages_discarded: u64,
    pub messages_evicted: u64,
    pub messages_expired: u64,
    /// Transfers started per forwarding rule
    pub direct_forwards: u64,
    pub response_forwards: u64,
    pub learned_forwards: u64,
    pub flood_forwards: u64,
    /// Sum of hops over first deliveries
    pub total_hops: u64,
    /// Sum of ticks from creation to first delivery
    pub total_delivery_latency: u64,
}

impl SimStats {
    /// Count a transfer started by the given rule
    pub fn record_forward(&mut self, via: ForwardReason) {
        self.transfers_started += 1;
        match via {
            ForwardReason::Direct => self.direct_forwards += 1,
            ForwardReason::ResponsePath => self.response_forwards += 1,
            ForwardReason::LearnedRoute => self.learned_forwards += 1,
            ForwardReason::Flood => self.flood_forwards += 1,
        }
    }

    /// Fraction of created messages delivered at least once
    ///
    /// Replies are created by destinations, so they are left out of the
    /// denominator.
    pub fn delivery_rate(&self) -> f64 {
        if self.messages_created == 0 {
            return 0.0;
        }
        self.messages_delivered as f64 / self.messages_created as f64
    }

    /// Mean ticks from creation to first delivery
    pub fn average_latency(&self) -> Option<f64> {
        (self.messages_delivered > 0)
            .then(|| self.total_delivery_latency as f64 / self.messages_delivered as f64)
    }

    /// Mean hop count of first deliveries
    pub fn average_hops(&self) -> Option<f64> {
        (self.messages_delivered > 0)
            .then(|| self.total_hops as f64 / self.messages_delivered as f64)
    }
}

impl std::fmt::Display for SimStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Messages created: {}", self.messages_created)?;
        writeln!(
            f,
            "  Messages delivered: {} ({:.1}%)",
            self.messages_delivered,
            self.delivery_rate() * 100.0
        )?;
        writeln!(f, "  Duplicate deliveries: {}", self.duplicate_deliveries)?;
        writeln!(
            f,
            "  Responses delivered: {}/{}",
            self.responses_delivered, self.responses_created
        )?;
        writeln!(
            f,
            "  Transfers: {} started, {} completed, {} aborted, {} refused",
            self.transfers_started,
            self.transfers_completed,
            self.transfers_aborted,
            self.transfers_refused
        )?;
        writeln!(
            f,
            "  Forwards: {} direct, {} response path, {} learned, {} flood",
            self.direct_forwards, self.response_forwards, self.learned_forwards, self.flood_forwards
        )?;
        writeln!(
            f,
            "  Removed: {} evicted, {} expired, {} discarded",
            self.messages_evicted, self.messages_expired, self.messages_discarded
        )?;
        if let (Some(latency), Some(hops)) = (self.average_latency(), self.average_hops()) {
            writeln!(f, "  Average latency: {:.1} ticks over {:.1} hops", latency, hops)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = SimStats::default();
        assert_eq!(stats.delivery_rate(), 0.0);
        assert!(stats.average_latency().is_none());
    }

    #[test]
    fn test_record_forward_by_rule() {
        let mut stats = SimStats::default();
        stats.record_forward(ForwardReason::Flood);
        stats.record_forward(ForwardReason::Flood);
        stats.record_forward(ForwardReason::LearnedRoute);

        assert_eq!(stats.transfers_started, 3);
        assert_eq!(stats.flood_forwards, 2);
        assert_eq!(stats.learned_forwards, 1);
    }

    #[test]
    fn test_rates() {
        let stats = SimStats {
            messages_created: 4,
            messages_delivered: 2,
            total_delivery_latency: 10,
            total_hops: 6,
            ..Default::default()
        };
        assert_eq!(stats.delivery_rate(), 0.5);
        assert_eq!(stats.average_latency(), Some(5.0));
        assert_eq!(stats.average_hops(), Some(3.0));
    }
}
