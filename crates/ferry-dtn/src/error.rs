//! DTN-specific error types

use thiserror::Error;

use ferry_core::{FerryError, MessageId};

/// Errors surfaced by a forwarding node
///
/// Routing failures (no contact, peer refused, replication spent) are not
/// errors; they show up as tick and receive outcomes instead.
#[derive(Debug, Error)]
pub enum DtnError {
    /// The host reported a transfer this node never accepted
    #[error("No incoming transfer of {message_id} from {peer}: host and router are out of sync")]
    Desynchronized { message_id: MessageId, peer: String },

    /// The buffer cannot hold the message even after eviction
    #[error("No room for message {message_id} ({size} bytes)")]
    NoSpace { message_id: MessageId, size: usize },

    /// Core errors
    #[error("Core error: {0}")]
    Core(#[from] FerryError),
}

impl DtnError {
    /// Check if this error means host and router disagree about transfers
    pub fn is_desynchronized(&self) -> bool {
        matches!(self, DtnError::Desynchronized { .. })
    }
}

/// Result type for DTN operations
pub type DtnResult<T> = Result<T, DtnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desynchronized_names_message_and_peer() {
        let err = DtnError::Desynchronized {
            message_id: MessageId::new("m42"),
            peer: "K".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("m42"));
        assert!(text.contains('K'));
        assert!(err.is_desynchronized());
    }

    #[test]
    fn test_no_space_display() {
        let err = DtnError::NoSpace {
            message_id: MessageId::new("big"),
            size: 4096,
        };
        assert!(err.to_string().contains("4096"));
        assert!(!err.is_desynchronized());
    }
}
