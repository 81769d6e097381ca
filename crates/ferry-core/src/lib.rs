//! # Ferry Core
//!
//! Core types and collaborator traits for the Ferry store-carry-forward
//! engine.
//!
//! The forwarding logic in `ferry-dtn` never talks to a radio, a socket or a
//! simulator directly. Everything it needs from the outside world goes through
//! the traits defined here, so the same engine runs inside the in-memory
//! simulation and behind a real transport.
//!
//! ## Key Traits
//!
//! - [`PeerIdentity`]: Abstraction over node identification (char for sim)
//! - [`BufferHost`]: Read/write access to the node's message buffer
//! - [`ContactHost`]: Live contacts and transfer primitives for one tick
//!
//! ## Key Types
//!
//! - [`Message`]: The unit of store-carry-forward transfer
//! - [`TravelHistory`]: Append-only record of the nodes a message visited
//! - [`ReturnPath`]: Pop-only stack a reply retraces hop by hop
//! - [`Contact`]: A peer reachable during the current tick

pub mod error;
pub mod host;
pub mod identity;
pub mod message;

// Re-export main types
pub use error::*;
pub use host::*;
pub use identity::*;
pub use message::*;
