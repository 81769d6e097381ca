//! Simulation error types

use thiserror::Error;

use ferry_core::IdentityError;
use ferry_dtn::DtnError;

use crate::types::PeerId;

/// Errors that stop a simulation run
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Unknown node: {0}")]
    UnknownPeer(PeerId),

    #[error("Invalid topology: {0}")]
    Topology(#[from] IdentityError),

    /// A router rejected the host's account of a transfer, or could not
    /// take a new message
    #[error(transparent)]
    Dtn(#[from] DtnError),
}

/// Result type alias for simulation operations
pub type SimResult<T> = Result<T, SimError>;
