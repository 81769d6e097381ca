//! Node identity abstractions
//!
//! Identities are opaque: the forwarding engine only hashes and compares
//! them, it never orders them. [`SimulationIdentity`] is the single-letter
//! identity used by the simulation and by tests.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::IdentityError;

/// Trait for node identity abstraction
///
/// Anything that can key a map and be logged can identify a node.
pub trait PeerIdentity:
    Clone + Eq + Hash + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get the identity as bytes
    fn as_bytes(&self) -> Vec<u8>;

    /// Create an identity from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError>;

    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Single-letter node identity ('A'..='Z') for simulation and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimulationIdentity(pub char);

impl SimulationIdentity {
    /// Create an identity from a capital letter
    pub fn new(c: char) -> Option<Self> {
        c.is_ascii_uppercase().then_some(Self(c))
    }

    /// All identities from 'A' to `end` inclusive
    pub fn range_to(end: char) -> Vec<Self> {
        ('A'..=end).filter_map(Self::new).collect()
    }

    /// The first `count` identities starting at 'A' (at most 26)
    pub fn first(count: usize) -> Vec<Self> {
        ('A'..='Z').take(count).filter_map(Self::new).collect()
    }

    /// Get the underlying character
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl Display for SimulationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<char> for SimulationIdentity {
    type Error = IdentityError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::new(c)
            .ok_or_else(|| IdentityError::InvalidFormat(format!("not a node letter: {:?}", c)))
    }
}

impl FromStr for SimulationIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::try_from(c.to_ascii_uppercase()),
            _ => Err(IdentityError::InvalidFormat(format!(
                "expected a single letter, got {:?}",
                s
            ))),
        }
    }
}

impl PeerIdentity for SimulationIdentity {
    fn as_bytes(&self) -> Vec<u8> {
        vec![self.0 as u8]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        match bytes {
            [b] => Self::try_from(*b as char),
            _ => Err(IdentityError::InvalidKeyLength {
                expected: 1,
                actual: bytes.len(),
            }),
        }
    }

    fn short_id(&self) -> String {
        self.0.to_string()
    }
}
