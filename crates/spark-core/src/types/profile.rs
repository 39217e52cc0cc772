//! User Profile Type - credentials, bio, interests and connection history

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Connection, InterestSet, ProfileId};

/// Salted SHA-256 digest of a password.
///
/// The plaintext is never stored. Verification re-hashes the candidate
/// with the stored salt and compares digests in constant time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    /// Hex-encoded 16 byte random salt
    pub salt: String,
    /// Hex-encoded SHA-256(salt || password)
    pub digest: String,
}

impl PasswordHash {
    /// Hash a password with a fresh random salt
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::rng().fill_bytes(&mut salt);
        Self {
            salt: hex::encode(salt),
            digest: hex::encode(Self::digest(&salt, password)),
        }
    }

    /// Check a candidate password against this hash
    pub fn verify(&self, password: &str) -> bool {
        let Ok(salt) = hex::decode(&self.salt) else {
            return false;
        };
        let Ok(expected) = hex::decode(&self.digest) else {
            return false;
        };
        let actual = Self::digest(&salt, password);
        expected.len() == actual.len()
            && expected
                .iter()
                .zip(actual.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    fn digest(salt: &[u8], password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

/// A registered user of this device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable identifier; survives username lookups and re-sorting
    pub id: ProfileId,

    /// Unique username (case-sensitive)
    pub username: String,

    /// Login credential
    pub password: PasswordHash,

    /// Free-form biography
    pub bio: String,

    /// Declared interests
    pub interests: InterestSet,

    /// Recorded encounters, oldest first
    pub connections: Vec<Connection>,

    /// Unix timestamp when the profile was created
    #[serde(default)]
    pub created_at: i64,
}

impl Profile {
    /// Create a profile with default interests and no connections
    pub fn new(username: impl Into<String>, password: &str, bio: impl Into<String>) -> Self {
        Self {
            id: ProfileId::new(),
            username: username.into(),
            password: PasswordHash::new(password),
            bio: bio.into(),
            interests: InterestSet::default(),
            connections: Vec::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether both username and password match exactly
    pub fn matches_credentials(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password.verify(password)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile() {
        let profile = Profile::new("alice", "secret", "Hi there");
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.bio, "Hi there");
        assert_eq!(profile.interests, InterestSet::default());
        assert_eq!(profile.connection_count(), 0);
        assert!(profile.created_at > 0);
    }

    #[test]
    fn test_password_is_not_stored_in_plaintext() {
        let profile = Profile::new("alice", "secret", "");
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("\"secret\""));
    }

    #[test]
    fn test_password_verify() {
        let hash = PasswordHash::new("hunter2");
        assert!(hash.verify("hunter2"));
        assert!(!hash.verify("hunter3"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn test_same_password_different_salt() {
        let a = PasswordHash::new("pw");
        let b = PasswordHash::new("pw");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_matches_credentials_requires_both() {
        let profile = Profile::new("alice", "secret", "");
        assert!(profile.matches_credentials("alice", "secret"));
        assert!(!profile.matches_credentials("Alice", "secret"));
        assert!(!profile.matches_credentials("alice", "Secret"));
    }

    #[test]
    fn test_corrupt_hash_never_verifies() {
        let hash = PasswordHash {
            salt: "zz".to_string(),
            digest: "00".to_string(),
        };
        assert!(!hash.verify("anything"));
    }
}
