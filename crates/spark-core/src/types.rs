//! Core types for Spark

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub mod connection;
pub mod interests;
pub mod profile;

pub use connection::{Connection, Coordinate, CoordinateError};
pub use interests::{InterestCategory, InterestError, InterestSet};
pub use profile::{PasswordHash, Profile};

/// Unique identifier for a profile
///
/// Uses ULID for time-ordered unique identifiers that sort lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(pub Ulid);

impl ProfileId {
    /// Create a new ProfileId with current timestamp
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Convert to string representation
    pub fn to_string_repr(&self) -> String {
        self.0.to_string()
    }

    /// Parse from string representation
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        let ulid = Ulid::from_string(s)?;
        Ok(Self(ulid))
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "profile_{}", self.0)
    }
}

/// Unique identifier for a connection record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub Ulid);

impl ConnectionId {
    /// Create a new ConnectionId with current timestamp
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Convert to string representation
    pub fn to_string_repr(&self) -> String {
        self.0.to_string()
    }

    /// Parse from string representation
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        let ulid = Ulid::from_string(s)?;
        Ok(Self(ulid))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_id_new() {
        let id1 = ProfileId::new();
        let id2 = ProfileId::new();
        // Should generate different IDs
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_profile_id_display() {
        let id = ProfileId::new();
        assert!(format!("{}", id).starts_with("profile_"));
    }

    #[test]
    fn test_connection_id_string_roundtrip() {
        let id = ConnectionId::new();
        let parsed = ConnectionId::from_string(&id.to_string_repr()).expect("Failed to parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_connection_id_rejects_garbage() {
        assert!(ConnectionId::from_string("not-a-ulid").is_err());
    }
}
