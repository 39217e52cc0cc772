//! Main SparkEngine - the primary entry point for Spark
//!
//! SparkEngine owns the [`ProfileStore`] and the [`TagController`] and wires
//! them together:
//! - Account management (sign up, log in, delete)
//! - Sharing the current user's payload by writing a tag
//! - Reading a peer's tag, matching interests and recording the encounter
//!
//! # Example
//!
//! ```ignore
//! use spark_core::{SparkEngine, SessionConfig};
//!
//! let engine = SparkEngine::open("~/.spark/data", transport, SessionConfig::default())?;
//! engine.sign_up("alice", "secret", "hi")?;
//! engine.log_in("alice", "secret")?;
//!
//! // Put our profile on a tag
//! engine.share_profile()?.outcome().await?;
//!
//! // Read someone else's and connect if we have something in common
//! let encounter = engine.exchange(&mut prompt).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{SessionFailure, SparkError, StoreError};
use crate::matcher::{intersect, SharedInterests};
use crate::payload::{encode, DecodedPayload};
use crate::recorder::{ConfirmationPrompt, ConnectionRecorder, RecordOutcome};
use crate::storage::{KeyValueStore, MemoryStore, Storage};
use crate::store::ProfileStore;
use crate::tag::{SessionHandle, SessionNotice, SessionResult, TagController, TagTransport};
use crate::types::{InterestCategory, InterestSet, Profile, ProfileId};

/// File name of the database inside the data directory
pub const DATABASE_FILE: &str = "spark.redb";

/// Result of reading a peer's tag
#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub peer: DecodedPayload,
    pub shared: SharedInterests,
    pub outcome: RecordOutcome,
}

/// Main entry point for Spark
pub struct SparkEngine {
    store: Arc<RwLock<ProfileStore>>,
    tags: TagController<dyn TagTransport>,
    /// `None` for in-memory engines
    data_dir: Option<PathBuf>,
}

impl std::fmt::Debug for SparkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparkEngine")
            .field("data_dir", &self.data_dir)
            .field("profiles", &self.store.read().len())
            .finish()
    }
}

impl SparkEngine {
    /// Open an engine backed by a database in `data_dir`
    ///
    /// The directory is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `SparkError::Io` if the directory cannot be created.
    /// Returns `SparkError::Database` if the database cannot be opened.
    pub fn open(
        data_dir: impl AsRef<Path>,
        transport: Arc<dyn TagTransport>,
        config: SessionConfig,
    ) -> Result<Self, SparkError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!(?data_dir, "Initializing SparkEngine");

        std::fs::create_dir_all(&data_dir)?;
        let storage = Storage::new(data_dir.join(DATABASE_FILE))?;

        let mut engine = Self::with_backend(Arc::new(storage), transport, config);
        engine.data_dir = Some(data_dir);
        Ok(engine)
    }

    /// Engine over a non-durable store
    pub fn in_memory(transport: Arc<dyn TagTransport>, config: SessionConfig) -> Self {
        Self::with_backend(Arc::new(MemoryStore::new()), transport, config)
    }

    pub fn with_backend(
        backend: Arc<dyn KeyValueStore>,
        transport: Arc<dyn TagTransport>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(ProfileStore::open(backend))),
            tags: TagController::new(transport, config),
            data_dir: None,
        }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Shared handle to the profile store
    pub fn store(&self) -> Arc<RwLock<ProfileStore>> {
        self.store.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        self.tags.config()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accounts
    // ═══════════════════════════════════════════════════════════════════════

    pub fn sign_up(&self, username: &str, password: &str, bio: &str) -> Result<ProfileId, StoreError> {
        self.store.write().add_profile(username, password, bio)
    }

    pub fn log_in(&self, username: &str, password: &str) -> Result<ProfileId, StoreError> {
        self.store.write().authenticate(username, password)
    }

    pub fn log_out(&self) {
        self.store.write().logout();
    }

    /// Delete the logged-in account. No-op when nobody is logged in.
    pub fn delete_account(&self) {
        self.store.write().delete_current_user();
    }

    /// Snapshot of the logged-in profile
    pub fn current_user(&self) -> Option<Profile> {
        self.store.read().current_user().cloned()
    }

    pub fn current_interests(&self) -> Option<InterestSet> {
        self.store.read().current_interests()
    }

    pub fn add_interest(&self, category: InterestCategory, interest: &str) -> Result<(), StoreError> {
        self.store.write().add_interest(category, interest)
    }

    pub fn remove_interest(&self, category: InterestCategory, interest: &str) -> Result<bool, StoreError> {
        self.store.write().remove_interest(category, interest)
    }

    /// Profiles by connection count, most connected first
    pub fn leaderboard(&self) -> Vec<(String, usize)> {
        self.store
            .read()
            .leaderboard()
            .into_iter()
            .map(|p| (p.username.clone(), p.connection_count()))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tag sessions
    // ═══════════════════════════════════════════════════════════════════════

    /// The payload the current user would write to a tag
    pub fn current_payload(&self) -> Option<Vec<u8>> {
        let store = self.store.read();
        let username = store.current_user()?.username.clone();
        let interests = store.current_interests()?;
        Some(encode(&username, &interests))
    }

    /// Start writing the current user's payload to a tag
    pub fn share_profile(&self) -> Result<SessionHandle, StoreError> {
        let payload = self.current_payload().ok_or(StoreError::NoCurrentUser)?;
        debug!(bytes = payload.len(), "Sharing profile");
        Ok(self.tags.start_write(payload))
    }

    /// Start reading a peer's tag
    pub fn scan(&self) -> SessionHandle {
        self.tags.start_read()
    }

    /// Read a peer's tag, then match and record the encounter
    pub async fn exchange<P>(&self, prompt: &mut P) -> Result<Encounter, SessionFailure>
    where
        P: ConfirmationPrompt + Send,
    {
        let peer = match self.scan().outcome().await? {
            SessionResult::Peer(peer) => peer,
            // A read session never acknowledges a write
            SessionResult::WriteAck => return Err(SessionFailure::NoMessage),
        };
        let (shared, outcome) = self.record_encounter(prompt, &peer);
        Ok(Encounter {
            peer,
            shared,
            outcome,
        })
    }

    /// Match an already decoded peer and record the encounter.
    ///
    /// The store is unlocked while the prompt runs, so the prompt may read
    /// the engine.
    pub fn record_encounter(
        &self,
        prompt: &mut dyn ConfirmationPrompt,
        peer: &DecodedPayload,
    ) -> (SharedInterests, RecordOutcome) {
        let mine = self.store.read().current_interests();
        let Some(mine) = mine else {
            return (SharedInterests::default(), RecordOutcome::NoCurrentUser);
        };
        let shared = intersect(&mine, &peer.interests);

        let decision = ConnectionRecorder::confirm(prompt, &peer.username, &shared);
        let outcome =
            ConnectionRecorder::apply(&mut self.store.write(), &peer.username, &shared, decision);
        (shared, outcome)
    }

    /// Notices from tag sessions started after this call
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.tags.subscribe()
    }

    /// Invalidate the running tag session, if any
    pub fn cancel_session(&self) {
        self.tags.invalidate();
    }
}
