//! Hop-history router
//!
//! Learns next hops from traffic this node has seen. Every node on a
//! received message's travel history is treated as a destination the
//! relaying peer can reach, so one message teaches a route towards each node
//! it passed through.
//!
//! Each destination keeps a short list of relays, least recently confirmed
//! first. Once the list is full the oldest entry falls off the front.

use std::collections::VecDeque;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use ferry_core::PeerIdentity;

/// Configuration for the hop-history router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum relays remembered per destination
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 3 }
    }
}

/// Bounded, recency-ordered memory of who recently reached whom
pub struct HopHistory<I: PeerIdentity> {
    /// Relays per destination, oldest first
    candidates: DashMap<I, VecDeque<I>>,
    /// Per-destination bound
    capacity: usize,
}

impl<I: PeerIdentity> HopHistory<I> {
    /// Create an empty history with the given per-destination bound
    pub fn new(capacity: usize) -> Self {
        Self {
            candidates: DashMap::new(),
            capacity,
        }
    }

    /// Create a history from configuration
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Record that `relay` handed us a message that travelled through `path`
    ///
    /// `relay` is appended once per path node. Repeats are not suppressed:
    /// seeing the same relay again moves it towards the most-recent end.
    pub fn record_observation<'a>(&self, path: impl IntoIterator<Item = &'a I>, relay: &I) {
        if self.capacity == 0 {
            return;
        }

        for node in path {
            let mut relays = self.candidates.entry(node.clone()).or_default();
            relays.push_back(relay.clone());
            while relays.len() > self.capacity {
                relays.pop_front();
            }
            trace!(destination = %node, relay = %relay, known = relays.len(), "Learned relay");
        }
    }

    /// Relays known to reach `destination`, most recently confirmed last
    pub fn candidates_for(&self, destination: &I) -> Vec<I> {
        self.candidates
            .get(destination)
            .map(|relays| relays.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of destinations with at least one learned relay
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check if nothing has been learned
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Per-destination bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all learned state
    pub fn clear(&self) {
        self.candidates.clear();
    }
}

impl<I: PeerIdentity> Default for HopHistory<I> {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::SimulationIdentity;

    fn make_id(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    fn path(chars: &str) -> Vec<SimulationIdentity> {
        chars.chars().map(make_id).collect()
    }

    #[test]
    fn test_unknown_destination_is_empty() {
        let history: HopHistory<SimulationIdentity> = HopHistory::default();
        assert!(history.candidates_for(&make_id('Z')).is_empty());
        assert!(history.is_empty());
    }

    #[test]
    fn test_every_path_node_learns_the_relay() {
        let history = HopHistory::new(3);
        history.record_observation(&path("XRA"), &make_id('R'));

        for node in ['X', 'R', 'A'] {
            assert_eq!(history.candidates_for(&make_id(node)), vec![make_id('R')]);
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_most_recent_relay_is_last() {
        let history = HopHistory::new(3);
        let dest = path("D");
        history.record_observation(&dest, &make_id('P'));
        history.record_observation(&dest, &make_id('Q'));

        assert_eq!(
            history.candidates_for(&make_id('D')),
            vec![make_id('P'), make_id('Q')]
        );
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let history = HopHistory::new(3);
        let dest = path("D");
        for relay in ['P', 'Q', 'R', 'S', 'T'] {
            history.record_observation(&dest, &make_id(relay));
            assert!(history.candidates_for(&make_id('D')).len() <= 3);
        }

        assert_eq!(
            history.candidates_for(&make_id('D')),
            vec![make_id('R'), make_id('S'), make_id('T')]
        );
    }

    #[test]
    fn test_repeated_relay_is_reappended() {
        let history = HopHistory::new(3);
        let dest = path("D");
        history.record_observation(&dest, &make_id('P'));
        history.record_observation(&dest, &make_id('Q'));
        history.record_observation(&dest, &make_id('P'));

        assert_eq!(
            history.candidates_for(&make_id('D')),
            vec![make_id('P'), make_id('Q'), make_id('P')]
        );
    }

    #[test]
    fn test_zero_capacity_learns_nothing() {
        let history = HopHistory::new(0);
        history.record_observation(&path("XY"), &make_id('R'));
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear() {
        let history = HopHistory::new(3);
        history.record_observation(&path("XY"), &make_id('R'));
        assert_eq!(history.len(), 2);

        history.clear();
        assert!(history.is_empty());
    }
}
