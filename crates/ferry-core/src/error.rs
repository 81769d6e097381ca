//! Error types shared across Ferry crates

use thiserror::Error;

/// Top-level error type for Ferry
#[derive(Debug, Error)]
pub enum FerryError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),
}

/// Errors related to node identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Reasons a host refuses to start a transfer
///
/// None of these are fatal for the forwarding engine: the message stays in
/// the buffer and is retried on a later tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("A transfer is already in progress")]
    Busy,

    #[error("Peer not in contact: {0}")]
    NotConnected(String),

    #[error("Peer is busy with another transfer: {0}")]
    PeerBusy(String),

    #[error("Peer refused the message: {0}")]
    Refused(String),
}

/// Result type alias for Ferry operations
pub type FerryResult<T> = Result<T, FerryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_display() {
        let err = IdentityError::InvalidFormat("bad".to_string());
        assert!(format!("{}", err).contains("Invalid identity format"));

        let err = IdentityError::InvalidKeyLength {
            expected: 1,
            actual: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains('1'));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_transfer_error_display() {
        assert!(format!("{}", TransferError::Busy).contains("already in progress"));

        let err = TransferError::NotConnected("C".to_string());
        assert!(format!("{}", err).contains('C'));

        let err = TransferError::Refused("looped".to_string());
        assert!(format!("{}", err).contains("looped"));
    }

    #[test]
    fn test_error_conversions() {
        let err: FerryError = TransferError::Busy.into();
        assert!(matches!(err, FerryError::Transfer(_)));

        let err: FerryError = IdentityError::InvalidFormat("x".into()).into();
        assert!(matches!(err, FerryError::Identity(_)));
    }
}
