//! Profile store - every registered profile plus the logged-in user.
//!
//! The store owns the in-memory profile collection and mirrors it to a
//! [`KeyValueStore`] after each mutation. The current user is held as a
//! [`ProfileId`] and always resolved against the collection, so reads see
//! the latest stored state.
//!
//! Persistence is best effort: a failed save is logged and the in-memory
//! change is kept. A crash before the next successful save loses that
//! change.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::storage::{interests_key, KeyValueStore, PROFILES_KEY};
use crate::types::{
    Connection, ConnectionId, Coordinate, InterestCategory, InterestSet, Profile, ProfileId,
};

pub struct ProfileStore {
    backend: Arc<dyn KeyValueStore>,
    profiles: Vec<Profile>,
    current: Option<ProfileId>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("backend", &"<KeyValueStore>")
            .field("profiles", &self.profiles.len())
            .field("current", &self.current)
            .finish()
    }
}

impl ProfileStore {
    /// Open the store, loading the last persisted collection.
    ///
    /// Missing or unreadable data yields an empty collection.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        let profiles = Self::load_profiles(backend.as_ref());
        info!(count = profiles.len(), "Profile store initialized");
        Self {
            backend,
            profiles,
            current: None,
        }
    }

    fn load_profiles(backend: &dyn KeyValueStore) -> Vec<Profile> {
        let bytes = match backend.load(PROFILES_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load profiles, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!(error = %e, "Stored profiles are corrupt, starting empty");
                Vec::new()
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accounts
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a new profile with default interests.
    pub fn add_profile(
        &mut self,
        username: &str,
        password: &str,
        bio: &str,
    ) -> Result<ProfileId, StoreError> {
        if username.trim().is_empty() {
            return Err(StoreError::InvalidUsername);
        }
        if self.profiles.iter().any(|p| p.username == username) {
            debug!(username, "Rejected duplicate username");
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }

        let profile = Profile::new(username, password, bio);
        let id = profile.id;
        self.profiles.push(profile);
        self.persist();

        info!(username, %id, "Profile created");
        Ok(id)
    }

    /// Log in. Leaves the current user untouched on failure.
    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<ProfileId, StoreError> {
        let Some(profile) = self
            .profiles
            .iter()
            .find(|p| p.matches_credentials(username, password))
        else {
            info!(username, "Authentication failed");
            return Err(StoreError::AuthFailed(username.to_string()));
        };

        let id = profile.id;
        if self.cached_interests(username).is_none() {
            let interests = profile.interests.clone();
            self.save_interest_cache(username, &interests);
        }
        self.current = Some(id);
        info!(username, "User authenticated");
        Ok(id)
    }

    /// Forget the current user without touching stored data
    pub fn logout(&mut self) {
        if let Some(profile) = self.current_user() {
            debug!(username = %profile.username, "Logged out");
        }
        self.current = None;
    }

    /// Delete the logged-in user's profile. No-op when nobody is logged in.
    pub fn delete_current_user(&mut self) {
        let Some(id) = self.current else {
            return;
        };
        let Some(index) = self.profiles.iter().position(|p| p.id == id) else {
            self.current = None;
            return;
        };

        let removed = self.profiles.remove(index);
        self.current = None;
        self.persist();

        if let Err(e) = self.backend.remove(&interests_key(&removed.username)) {
            error!(error = %e, username = %removed.username, "Failed to drop interest cache");
        }
        info!(username = %removed.username, "Profile deleted");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Connections
    // ═══════════════════════════════════════════════════════════════════════

    /// Record an encounter for the current user.
    ///
    /// Returns `None` (and changes nothing) when nobody is logged in.
    pub fn add_connection(
        &mut self,
        username: &str,
        photo: Option<Vec<u8>>,
        location: Option<Coordinate>,
    ) -> Option<Connection> {
        let profile = self.current_user_mut()?;
        let connection = Connection::new(username, photo, location);
        profile.connections.push(connection.clone());
        let owner = profile.username.clone();
        self.persist();

        info!(owner = %owner, peer = username, id = %connection.id, "Connection recorded");
        Some(connection)
    }

    /// Delete one of the current user's connections. Returns whether it existed.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        let Some(profile) = self.current_user_mut() else {
            return false;
        };
        let before = profile.connections.len();
        profile.connections.retain(|c| &c.id != id);
        if profile.connections.len() == before {
            return false;
        }
        self.persist();
        debug!(%id, "Connection removed");
        true
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Interests
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace the current user's interests. No-op when nobody is logged in.
    pub fn update_interests(&mut self, interests: InterestSet) {
        let Some(profile) = self.current_user_mut() else {
            return;
        };
        profile.interests = interests.clone();
        let username = profile.username.clone();
        self.persist();
        self.save_interest_cache(&username, &interests);
        debug!(username = %username, count = interests.len(), "Interests updated");
    }

    /// Add one interest to the current user's category
    pub fn add_interest(
        &mut self,
        category: InterestCategory,
        interest: &str,
    ) -> Result<(), StoreError> {
        let mut interests = self.current_interests().ok_or(StoreError::NoCurrentUser)?;
        interests.add(category, interest)?;
        self.update_interests(interests);
        Ok(())
    }

    /// Remove one interest from the current user's category.
    ///
    /// Returns whether the interest was present.
    pub fn remove_interest(
        &mut self,
        category: InterestCategory,
        interest: &str,
    ) -> Result<bool, StoreError> {
        let mut interests = self.current_interests().ok_or(StoreError::NoCurrentUser)?;
        if !interests.remove(category, interest) {
            return Ok(false);
        }
        self.update_interests(interests);
        Ok(true)
    }

    /// Interests cached for `username`, without touching the profile list
    pub fn cached_interests(&self, username: &str) -> Option<InterestSet> {
        let bytes = match self.backend.load(&interests_key(username)) {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(error = %e, username, "Failed to read interest cache");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(interests) => Some(interests),
            Err(e) => {
                warn!(error = %e, username, "Interest cache is corrupt");
                None
            }
        }
    }

    /// The current user's interests, preferring the cache
    pub fn current_interests(&self) -> Option<InterestSet> {
        let profile = self.current_user()?;
        self.cached_interests(&profile.username)
            .or_else(|| Some(profile.interests.clone()))
    }

    fn save_interest_cache(&self, username: &str, interests: &InterestSet) {
        let bytes = match serde_json::to_vec(interests) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Failed to serialize interests");
                return;
            }
        };
        if let Err(e) = self.backend.save(&interests_key(username), &bytes) {
            error!(error = %e, username, "Failed to save interest cache");
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// The logged-in profile, resolved against the collection
    pub fn current_user(&self) -> Option<&Profile> {
        let id = self.current?;
        self.profiles.iter().find(|p| p.id == id)
    }

    fn current_user_mut(&mut self) -> Option<&mut Profile> {
        let id = self.current?;
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    pub fn current_id(&self) -> Option<ProfileId> {
        self.current
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, username: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.username == username)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles ordered by connection count, most connected first.
    ///
    /// Ties keep registration order.
    pub fn leaderboard(&self) -> Vec<&Profile> {
        let mut ranked: Vec<&Profile> = self.profiles.iter().collect();
        ranked.sort_by(|a, b| b.connection_count().cmp(&a.connection_count()));
        ranked
    }

    fn persist(&self) {
        let bytes = match serde_json::to_vec(&self.profiles) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Failed to serialize profiles");
                return;
            }
        };
        if let Err(e) = self.backend.save(PROFILES_KEY, &bytes) {
            error!(error = %e, "Failed to persist profiles; change kept in memory only");
        }
    }
}
