//! Spark Core Library
//!
//! Proximity profile exchange over near-field tags.
//!
//! ## Overview
//!
//! Two people hold their phones to the same tag. One writes a compact text
//! payload with their username and interests, the other reads it back. If
//! they share interests and confirm, the encounter is stored as a
//! connection with an optional photo and location.
//!
//! ## Components
//!
//! - **payload**: the tag text format (encode / decode)
//! - **tag**: the session state machine and its async runner
//! - **matcher**: per-category interest intersection
//! - **store**: profiles, current user, interest cache, persistence
//! - **recorder**: confirmation-gated connection recording
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use spark_core::{ConfirmOutcome, SessionConfig, SparkEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SparkEngine::open("~/.spark/data", transport, SessionConfig::default())?;
//!     engine.log_in("alice", "secret")?;
//!
//!     let encounter = engine
//!         .exchange(&mut |peer: &str, shared: &_| {
//!             println!("{peer} also likes {shared}");
//!             ConfirmOutcome::connect()
//!         })
//!         .await?;
//!
//!     println!("{:?}", encounter.outcome);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod payload;
pub mod recorder;
pub mod storage;
pub mod store;
pub mod tag;
pub mod types;

// Re-exports
pub use config::SessionConfig;
pub use engine::{Encounter, SparkEngine, DATABASE_FILE};
pub use error::{SessionFailure, SparkError, StoreError};
pub use matcher::{intersect, SharedInterests};
pub use payload::{decode, decode_message, encode, DecodedPayload, PayloadError, TagMessage, TagRecord};
pub use recorder::{ConfirmOutcome, ConfirmationPrompt, ConnectionRecorder, Decision, RecordOutcome};
pub use storage::{KeyValueStore, MemoryStore, Storage};
pub use store::ProfileStore;
pub use tag::{
    MockTransport, SessionHandle, SessionIntent, SessionNotice, SessionOutcome, SessionResult,
    TagCapability, TagController, TagId, TagSession, TagTransport, TransportError,
};
pub use types::*;
