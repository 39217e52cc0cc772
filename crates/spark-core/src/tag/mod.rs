//! Near-field tag sessions
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TagTransport: radio primitive supplied by the platform         │
//! │  ├── discover / connect / query_capability                      │
//! │  └── read_message / write_message / release                     │
//! │                                                                 │
//! │  TagSession: pure state machine, handle_event(Event) -> Trans.  │
//! │                                                                 │
//! │  TagController: runs one session at a time on tokio            │
//! │  ├── feeds transport results back as events                     │
//! │  ├── delayed re-poll when several tags are in range             │
//! │  └── broadcasts user-facing notices                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::payload::TagMessage;

pub mod driver;
pub mod mock;
pub mod session;

pub use driver::{SessionHandle, SessionNotice, TagController};
pub use mock::MockTransport;
pub use session::{
    SessionAction, SessionEvent, SessionIntent, SessionOutcome, SessionResult, SessionState,
    TagSession, Transition, MULTIPLE_TAGS_NOTICE,
};

/// Identifies one tag within a discovery round
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagId(pub String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag_{}", self.0)
    }
}

/// What a connected tag allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCapability {
    /// The tag cannot hold a message
    NotSupported,
    /// The tag holds a message that cannot be changed
    ReadOnly,
    /// The tag can be read and written
    ReadWrite,
}

impl std::fmt::Display for TagCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSupported => write!(f, "Not Supported"),
            Self::ReadOnly => write!(f, "Read Only"),
            Self::ReadWrite => write!(f, "Read/Write"),
        }
    }
}

/// Failure reported by a [`TagTransport`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The user dismissed the system scan UI
    #[error("cancelled by user")]
    UserCancelled,

    /// Any other radio failure
    #[error("{0}")]
    Failed(String),
}

/// The radio primitive a tag session drives.
///
/// Implementations only perform I/O; ordering, retries and timeouts are
/// handled by [`TagController`]. At most one call is outstanding at a time.
#[async_trait]
pub trait TagTransport: Send + Sync {
    /// Whether this device can talk to tags at all
    fn is_available(&self) -> bool;

    /// Poll for tags in range
    async fn discover(&self) -> Result<Vec<TagId>, TransportError>;

    /// Open a connection to one tag
    async fn connect(&self, tag: &TagId) -> Result<(), TransportError>;

    /// Ask a connected tag what it supports
    async fn query_capability(&self, tag: &TagId) -> Result<TagCapability, TransportError>;

    /// Read the tag's message, `None` if it holds none
    async fn read_message(&self, tag: &TagId) -> Result<Option<TagMessage>, TransportError>;

    /// Replace the tag's message
    async fn write_message(&self, tag: &TagId, message: &TagMessage) -> Result<(), TransportError>;

    /// Give the radio back; called once when a session ends
    async fn release(&self);
}
