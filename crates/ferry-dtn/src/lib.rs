//! # Ferry DTN
//!
//! Per-node forwarding for opportunistic, delay-tolerant networks.
//!
//! A node only ever knows who it can reach right now and what it has seen
//! pass through. From that it learns which peers recently reached which
//! nodes, spreads a bounded number of copies when it knows nothing better,
//! and answers delivered messages with a reply that retraces the exact path
//! the message took.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferry_core::{Message, SimulationIdentity};
//! use ferry_dtn::{DtnConfig, DtnRouter};
//!
//! let router = DtnRouter::new(SimulationIdentity::new('A').unwrap(), DtnConfig::default());
//!
//! // Queue a message, then let the host drive the node
//! router.create_message(&mut host, message)?;
//! let outcome = router.on_tick(&mut host);
//! ```
//!
//! ## Architecture
//!
//! - [`history`]: Hop-history router (learned relays per destination)
//! - [`replication`]: Per-message send records and the replication bound
//! - [`forwarding`]: The per-tick decision engine
//! - [`response`]: Reply synthesis for response routing
//! - [`eviction`]: Victim selection when the buffer is full
//! - [`guard`]: Intake checks against loops and duplicates
//! - [`app`]: Application filter hook
//! - [`router`]: [`DtnRouter`], the node facade tying it all together
//! - [`error`]: DTN-specific error types

pub mod app;
pub mod error;
pub mod eviction;
pub mod forwarding;
pub mod guard;
pub mod history;
pub mod replication;
pub mod response;
pub mod router;

// Re-export main types
pub use app::{ApplicationFilter, FilterChain};
pub use error::{DtnError, DtnResult};
pub use eviction::{EvictionConfig, EvictionOrder, select_victim};
pub use forwarding::{
    FloodPolicy, Forward, ForwardReason, ForwardingConfig, ForwardingEngine, TickOutcome,
};
pub use guard::{DuplicateGuard, ReceiveVerdict, RejectReason};
pub use history::{HistoryConfig, HopHistory};
pub use replication::{ReplicationConfig, ReplicationCounting, ReplicationTracker};
pub use response::{ResponseConfig, build_response};
pub use router::{DtnRouter, ReceiveOutcome};

use serde::{Deserialize, Serialize};

/// Configuration for a forwarding node
///
/// Combines configuration for all components. Missing sections fall back to
/// their defaults when deserializing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DtnConfig {
    /// Hop-history router configuration
    pub history: HistoryConfig,
    /// Replication bound and counting
    pub replication: ReplicationConfig,
    /// Forwarding rules
    pub forwarding: ForwardingConfig,
    /// Reply synthesis
    pub response: ResponseConfig,
    /// Eviction order
    pub eviction: EvictionConfig,
}

impl DtnConfig {
    /// The reference behaviour (same as `Default`)
    ///
    /// Three relays remembered per destination, three sends per message,
    /// flooding stops at the first transfer.
    pub fn reference() -> Self {
        Self::default()
    }

    /// Create a config that spreads as few copies as possible
    ///
    /// One copy per message, counted by distinct peer.
    pub fn conservative() -> Self {
        Self {
            replication: ReplicationConfig {
                bound: 1,
                counting: ReplicationCounting::DistinctPeers,
                drop_when_exhausted: true,
            },
            ..Self::default()
        }
    }

    /// Create a config for sparse, fast-changing networks
    ///
    /// Remembers more relays, spreads more copies and floods every peer the
    /// host lets it reach in one tick.
    pub fn aggressive() -> Self {
        Self {
            history: HistoryConfig { capacity: 8 },
            replication: ReplicationConfig {
                bound: 6,
                ..ReplicationConfig::default()
            },
            forwarding: ForwardingConfig {
                direct_delivery: true,
                flood: FloodPolicy::TryAllPeers,
            },
            ..Self::default()
        }
    }

    /// Validate configuration invariants
    ///
    /// Returns a list of warnings if the configuration has potential issues.
    /// An empty list means the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.history.capacity == 0 {
            warnings.push(ConfigWarning::ZeroHistoryCapacity);
        }

        if self.replication.bound == 0 {
            warnings.push(ConfigWarning::ZeroReplicationBound);
        }

        if self.response.enabled {
            if self.response.size == 0 {
                warnings.push(ConfigWarning::ZeroResponseSize);
            }
            if self.response.id_prefix.is_empty() {
                warnings.push(ConfigWarning::EmptyResponsePrefix);
            }
        }

        warnings
    }

    /// Check if the configuration is valid (no warnings)
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No relays can be learned
    ZeroHistoryCapacity,
    /// Messages are exhausted before their first send
    ZeroReplicationBound,
    /// Replies take no buffer space
    ZeroResponseSize,
    /// Reply IDs would collide with the messages they answer
    EmptyResponsePrefix,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::ZeroHistoryCapacity => write!(f, "history.capacity is 0"),
            ConfigWarning::ZeroReplicationBound => write!(f, "replication.bound is 0"),
            ConfigWarning::ZeroResponseSize => write!(f, "response.size is 0"),
            ConfigWarning::EmptyResponsePrefix => write!(f, "response.id_prefix is empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DtnConfig::default();
        assert_eq!(config.history.capacity, 3);
        assert_eq!(config.replication.bound, 3);
        assert_eq!(config.replication.counting, ReplicationCounting::PerSend);
        assert!(config.replication.drop_when_exhausted);
        assert!(config.forwarding.direct_delivery);
        assert_eq!(config.forwarding.flood, FloodPolicy::StopAtFirstSuccess);
        assert_eq!(config.response.id_prefix, "R_");
        assert_eq!(config.response.size, 10);
        assert_eq!(config.eviction.order, EvictionOrder::ProtectResponses);
    }

    #[test]
    fn test_preset_configs_are_valid() {
        assert!(DtnConfig::reference().is_valid());
        assert!(DtnConfig::conservative().is_valid());
        assert!(DtnConfig::aggressive().is_valid());
    }

    #[test]
    fn test_conservative_config() {
        let config = DtnConfig::conservative();
        assert_eq!(config.replication.bound, 1);
        assert_eq!(
            config.replication.counting,
            ReplicationCounting::DistinctPeers
        );
    }

    #[test]
    fn test_aggressive_config() {
        let config = DtnConfig::aggressive();
        assert_eq!(config.history.capacity, 8);
        assert_eq!(config.replication.bound, 6);
        assert_eq!(config.forwarding.flood, FloodPolicy::TryAllPeers);
    }

    #[test]
    fn test_invalid_config_detected() {
        let mut config = DtnConfig::default();
        config.history.capacity = 0;
        config.response.id_prefix.clear();

        let warnings = config.validate();
        assert!(warnings.contains(&ConfigWarning::ZeroHistoryCapacity));
        assert!(warnings.contains(&ConfigWarning::EmptyResponsePrefix));
        assert!(!warnings.contains(&ConfigWarning::ZeroReplicationBound));
    }

    #[test]
    fn test_disabled_responses_skip_response_checks() {
        let mut config = DtnConfig::default();
        config.response.enabled = false;
        config.response.size = 0;
        assert!(config.is_valid());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DtnConfig =
            serde_json::from_str(r#"{ "replication": { "bound": 5, "counting": "DistinctPeers", "drop_when_exhausted": false } }"#)
                .unwrap();
        assert_eq!(config.replication.bound, 5);
        assert!(!config.replication.drop_when_exhausted);
        assert_eq!(config.history.capacity, 3);
        assert_eq!(config.response.id_prefix, "R_");
    }
}
