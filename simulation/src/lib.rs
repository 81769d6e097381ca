//! # Ferry Simulation
//!
//! A discrete-time mesh simulation driving Ferry DTN nodes over links that
//! come and go.
//!
//! ## Overview
//!
//! Every node runs a [`ferry_dtn::DtnRouter`] against a simulated host:
//!
//! - **Named nodes** (A-Z) on a [`Mesh`] of potential links
//! - **Intermittent links**: each tick a link is up with a configured
//!   probability, or pinned up/down by the scenario
//! - **Transfers with duration**: a copy takes several ticks to arrive and is
//!   lost if its link drops first
//! - **Bounded buffers**: the router evicts to make room
//! - **Replies**: deliveries are answered, and replies retrace the path
//!
//! ## Architecture
//!
//! - **Types** (`types.rs`): Event log entries and statistics
//! - **Topology** (`topology.rs`): Mesh construction (line, ring, random, etc.)
//! - **Buffer** (`buffer.rs`): Per-node byte-bounded message store
//! - **Simulation** (`simulation.rs`): Discrete-time engine and host views
//! - **Scenarios** (`scenarios.rs`): Pre-built runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_simulation::*;
//!
//! let mesh = from_edges(&[('A', 'B'), ('B', 'C')])?;
//! let mut sim = Simulation::new(mesh, SimConfig::default(), DtnConfig::default());
//!
//! sim.send_message(PeerId::new('A').unwrap(), PeerId::new('C').unwrap(), b"Hello C!".to_vec())?;
//! sim.run_ticks(10)?;
//!
//! assert_eq!(sim.stats.messages_delivered, 1);
//! ```

pub mod buffer;
pub mod error;
pub mod scenarios;
pub mod simulation;
pub mod topology;
pub mod types;

pub use buffer::MessageBuffer;
pub use error::{SimError, SimResult};
pub use scenarios::ChaosOptions;
pub use simulation::{SimConfig, SimNode, Simulation};
pub use topology::{Mesh, MeshBuilder, from_edges};
pub use types::{PeerId, SimEvent, SimStats};

// Re-export the node configuration for callers building simulations
pub use ferry_dtn::DtnConfig;
