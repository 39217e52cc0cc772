//! Tag session state machine
//!
//! [`TagSession`] is a pure state machine: it performs no I/O and owns no
//! timers. The caller feeds it [`SessionEvent`]s and executes the
//! [`SessionAction`] each [`Transition`] asks for, so a whole session can be
//! exercised with synthetic events.
//!
//! ```text
//! Idle ─Start─▶ SessionActive ─1 tag─▶ TagDetected ─ok─▶ Connected
//!                 ▲     │                                   │
//!                 └─2+ tags (notice, re-poll after delay)   ▼
//!                                                    StatusQueried
//!                                                     │         │
//!                                                 Reading    Writing
//!                                                     │         │
//!                                                     ▼         ▼
//!                                                Completed | Failed
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::DEFAULT_RETRY_DELAY;
use crate::error::SessionFailure;
use crate::payload::{decode_message, DecodedPayload, TagMessage};
use crate::tag::{TagCapability, TagId, TransportError};

/// Shown while more than one tag is in range
pub const MULTIPLE_TAGS_NOTICE: &str =
    "More than 1 tag is detected. Please remove all tags and try again.";

/// What the session was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIntent {
    /// Read a peer's payload from the tag
    Read,
    /// Write these payload bytes to the tag
    Write(Vec<u8>),
}

impl SessionIntent {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// Successful end of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    /// The payload was written
    WriteAck,
    /// A peer's payload was read and decoded
    Peer(DecodedPayload),
}

/// Final result of a session
pub type SessionOutcome = Result<SessionResult, SessionFailure>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SessionActive,
    TagDetected(TagId),
    Connected(TagId),
    StatusQueried(TagId, TagCapability),
    Reading(TagId),
    Writing(TagId),
    Completed(SessionResult),
    Failed(SessionFailure),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::SessionActive => "SessionActive",
            Self::TagDetected(_) => "TagDetected",
            Self::Connected(_) => "Connected",
            Self::StatusQueried(..) => "StatusQueried",
            Self::Reading(_) => "Reading",
            Self::Writing(_) => "Writing",
            Self::Completed(_) => "Completed",
            Self::Failed(_) => "Failed",
        }
    }

    /// The outcome, once the state is terminal
    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self {
            Self::Completed(result) => Some(Ok(result.clone())),
            Self::Failed(failure) => Some(Err(failure.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session start requested; `available` is the radio's availability
    Start { available: bool },
    /// A discovery poll finished
    TagsDiscovered(Vec<TagId>),
    /// A discovery poll failed
    DiscoveryFailed(String),
    /// Result of connecting to the detected tag
    Connected(Result<(), TransportError>),
    /// Result of the capability query
    CapabilityQueried(Result<TagCapability, TransportError>),
    /// Result of reading the tag's message
    ReadFinished(Result<Option<TagMessage>, TransportError>),
    /// Result of writing the payload
    WriteFinished(Result<(), TransportError>),
    /// The caller invalidated the session
    Invalidate,
    /// The user dismissed the scan
    UserCancelled,
    /// Discovery ran out of time
    TimedOut,
}

/// Work the caller must do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Nothing to do (the event was ignored)
    None,
    /// Poll for tags now
    BeginDiscovery,
    /// Poll for tags again after the delay
    RetryDiscoveryAfter(Duration),
    Connect(TagId),
    QueryCapability(TagId),
    Read(TagId),
    Write(TagId, TagMessage),
    /// The session ended; release the transport
    Release,
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub state: SessionState,
    /// Next step for the caller
    pub action: SessionAction,
    /// Message to show the user, if any
    pub notice: Option<String>,
}

/// One proximity session
#[derive(Debug, Clone)]
pub struct TagSession {
    intent: SessionIntent,
    retry_delay: Duration,
    state: SessionState,
    history: Vec<SessionState>,
}

impl TagSession {
    pub fn new(intent: SessionIntent) -> Self {
        Self::with_retry_delay(intent, DEFAULT_RETRY_DELAY)
    }

    pub fn with_retry_delay(intent: SessionIntent, retry_delay: Duration) -> Self {
        Self {
            intent,
            retry_delay,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn intent(&self) -> &SessionIntent {
        &self.intent
    }

    /// Every state entered so far, including pass-through states
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advance the machine by one event.
    ///
    /// Events that make no sense in the current state are ignored and
    /// produce [`SessionAction::None`].
    pub fn handle_event(&mut self, event: SessionEvent) -> Transition {
        if self.state.is_terminal() {
            debug!(state = %self.state, ?event, "Session finished, ignoring event");
            return self.unchanged();
        }

        let current = std::mem::replace(&mut self.state, SessionState::Idle);
        let from = current.name();

        let (next, action, notice) = match (current, event) {
            (_, SessionEvent::Invalidate) => Self::fail(SessionFailure::Cancelled),

            (SessionState::Idle, SessionEvent::Start { available: false }) => {
                Self::fail(SessionFailure::UnsupportedHardware)
            }
            (SessionState::Idle, SessionEvent::Start { available: true }) => {
                (SessionState::SessionActive, SessionAction::BeginDiscovery, None)
            }

            (SessionState::SessionActive, SessionEvent::TagsDiscovered(mut tags)) => {
                match tags.len() {
                    0 => Self::fail(SessionFailure::NoTag),
                    1 => {
                        let tag = tags.remove(0);
                        (
                            SessionState::TagDetected(tag.clone()),
                            SessionAction::Connect(tag),
                            None,
                        )
                    }
                    count => {
                        info!(count, "Multiple tags in range, polling again");
                        (
                            SessionState::SessionActive,
                            SessionAction::RetryDiscoveryAfter(self.retry_delay),
                            Some(MULTIPLE_TAGS_NOTICE.to_string()),
                        )
                    }
                }
            }
            (SessionState::SessionActive, SessionEvent::DiscoveryFailed(reason)) => {
                Self::fail(SessionFailure::DiscoveryError(reason))
            }
            (SessionState::SessionActive, SessionEvent::UserCancelled) => {
                Self::fail(SessionFailure::UserCancelled)
            }
            (SessionState::SessionActive, SessionEvent::TimedOut) => {
                Self::fail(SessionFailure::Timeout)
            }

            (SessionState::TagDetected(tag), SessionEvent::Connected(Ok(()))) => (
                SessionState::Connected(tag.clone()),
                SessionAction::QueryCapability(tag),
                None,
            ),
            (SessionState::TagDetected(_), SessionEvent::Connected(Err(e))) => {
                Self::fail(SessionFailure::ConnectError(e.to_string()))
            }

            (SessionState::Connected(_), SessionEvent::CapabilityQueried(Err(e))) => {
                Self::fail(SessionFailure::CapabilityQueryError(e.to_string()))
            }
            (SessionState::Connected(tag), SessionEvent::CapabilityQueried(Ok(capability))) => {
                self.history
                    .push(SessionState::StatusQueried(tag.clone(), capability));
                self.resolve_capability(tag, capability)
            }

            (SessionState::Writing(_), SessionEvent::WriteFinished(Ok(()))) => (
                SessionState::Completed(SessionResult::WriteAck),
                SessionAction::Release,
                Some("Write successful.".to_string()),
            ),
            (SessionState::Writing(_), SessionEvent::WriteFinished(Err(e))) => {
                Self::fail(SessionFailure::WriteError(e.to_string()))
            }

            (SessionState::Reading(_), SessionEvent::ReadFinished(result)) => {
                Self::finish_read(result)
            }

            (state, event) => {
                debug!(state = %state, ?event, "Event does not apply, ignoring");
                self.state = state;
                return self.unchanged();
            }
        };

        debug!(from, to = next.name(), ?action, "Session transition");
        match &next {
            SessionState::Failed(failure) if failure.is_cancellation() => {
                info!(%failure, "Session cancelled")
            }
            SessionState::Failed(failure) => warn!(%failure, "Session failed"),
            SessionState::Completed(_) => info!("Session completed"),
            _ => {}
        }

        self.state = next.clone();
        self.history.push(next.clone());
        Transition {
            state: next,
            action,
            notice,
        }
    }

    fn resolve_capability(
        &self,
        tag: TagId,
        capability: TagCapability,
    ) -> (SessionState, SessionAction, Option<String>) {
        match (capability, &self.intent) {
            (TagCapability::NotSupported, _) => Self::fail(SessionFailure::Incompatible),
            (TagCapability::ReadOnly, SessionIntent::Write(_)) => {
                Self::fail(SessionFailure::ReadOnlyTag)
            }
            (TagCapability::ReadWrite, SessionIntent::Write(payload)) => (
                SessionState::Writing(tag.clone()),
                SessionAction::Write(tag, TagMessage::from_payload(payload.clone())),
                None,
            ),
            (TagCapability::ReadOnly | TagCapability::ReadWrite, SessionIntent::Read) => (
                SessionState::Reading(tag.clone()),
                SessionAction::Read(tag),
                None,
            ),
        }
    }

    fn finish_read(
        result: Result<Option<TagMessage>, TransportError>,
    ) -> (SessionState, SessionAction, Option<String>) {
        let message = match result {
            Ok(Some(message)) => message,
            Ok(None) => return Self::fail(SessionFailure::NoMessage),
            Err(e) => return Self::fail(SessionFailure::ReadError(e.to_string())),
        };
        match decode_message(&message) {
            Some(Ok(peer)) => {
                debug!(username = %peer.username, "Decoded peer payload");
                (
                    SessionState::Completed(SessionResult::Peer(peer)),
                    SessionAction::Release,
                    None,
                )
            }
            Some(Err(e)) => Self::fail(SessionFailure::DecodeError(e)),
            None => Self::fail(SessionFailure::NoMessage),
        }
    }

    fn fail(failure: SessionFailure) -> (SessionState, SessionAction, Option<String>) {
        let notice = (!failure.is_cancellation()).then(|| failure.to_string());
        (SessionState::Failed(failure), SessionAction::Release, notice)
    }

    fn unchanged(&self) -> Transition {
        Transition {
            state: self.state.clone(),
            action: SessionAction::None,
            notice: None,
        }
    }
}
