//! Confirmation-gated connection recording
//!
//! After a peer's payload is read, the shared interests are shown to the
//! user. Only when they confirm is a [`Connection`] appended to the current
//! user's profile, optionally carrying a photo and a location.

use tracing::{debug, info};

use crate::matcher::{intersect, SharedInterests};
use crate::payload::DecodedPayload;
use crate::store::ProfileStore;
use crate::types::{Connection, Coordinate};

/// The user's answer to a connection prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// Record the connection with optional metadata
    Connect {
        photo: Option<Vec<u8>>,
        coordinate: Option<Coordinate>,
    },
    Cancel,
}

impl ConfirmOutcome {
    /// Connect without a photo or location
    pub fn connect() -> Self {
        Self::Connect {
            photo: None,
            coordinate: None,
        }
    }
}

/// What happened to an encounter
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Nothing in common, the user was not asked
    NoSharedInterests,
    /// The user cancelled the prompt
    Declined,
    Recorded(Connection),
    /// Confirmed, but nobody is logged in
    NoCurrentUser,
}

impl RecordOutcome {
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            Self::Recorded(connection) => Some(connection),
            _ => None,
        }
    }
}

/// Asks the user whether to connect with a peer
pub trait ConfirmationPrompt {
    fn confirm(&mut self, peer: &str, shared: &SharedInterests) -> ConfirmOutcome;
}

impl<F> ConfirmationPrompt for F
where
    F: FnMut(&str, &SharedInterests) -> ConfirmOutcome,
{
    fn confirm(&mut self, peer: &str, shared: &SharedInterests) -> ConfirmOutcome {
        self(peer, shared)
    }
}

/// The user's verdict on an encounter, reached without touching the store
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing will be recorded; carries the final outcome
    Skip(RecordOutcome),
    /// Confirmed, record with this metadata
    Record {
        photo: Option<Vec<u8>>,
        coordinate: Option<Coordinate>,
    },
}

/// Records connections once the user agrees
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionRecorder;

impl ConnectionRecorder {
    /// Ask about `peer`. The prompt is not shown when `shared` is empty.
    ///
    /// Callers sharing a store behind a lock run this with the lock released,
    /// since the prompt may block on the user.
    pub fn confirm(
        prompt: &mut dyn ConfirmationPrompt,
        peer: &str,
        shared: &SharedInterests,
    ) -> Decision {
        if shared.is_empty() {
            debug!(peer, "No shared interests, skipping prompt");
            return Decision::Skip(RecordOutcome::NoSharedInterests);
        }

        match prompt.confirm(peer, shared) {
            ConfirmOutcome::Cancel => {
                debug!(peer, "Connection declined");
                Decision::Skip(RecordOutcome::Declined)
            }
            ConfirmOutcome::Connect { photo, coordinate } => Decision::Record { photo, coordinate },
        }
    }

    /// Carry out a decision against the current user's profile
    pub fn apply(
        store: &mut ProfileStore,
        peer: &str,
        shared: &SharedInterests,
        decision: Decision,
    ) -> RecordOutcome {
        let (photo, coordinate) = match decision {
            Decision::Skip(outcome) => return outcome,
            Decision::Record { photo, coordinate } => (photo, coordinate),
        };
        match store.add_connection(peer, photo, coordinate) {
            Some(connection) => {
                info!(peer, shared = shared.len(), "Encounter recorded");
                RecordOutcome::Recorded(connection)
            }
            None => RecordOutcome::NoCurrentUser,
        }
    }

    /// Ask about `peer` and record the connection if confirmed
    pub fn record(
        store: &mut ProfileStore,
        prompt: &mut dyn ConfirmationPrompt,
        peer: &str,
        shared: &SharedInterests,
    ) -> RecordOutcome {
        let decision = Self::confirm(prompt, peer, shared);
        Self::apply(store, peer, shared, decision)
    }

    /// Match a decoded peer against the current user's interests and record
    /// the encounter.
    pub fn handle_encounter(
        store: &mut ProfileStore,
        prompt: &mut dyn ConfirmationPrompt,
        peer: &DecodedPayload,
    ) -> (SharedInterests, RecordOutcome) {
        let Some(mine) = store.current_interests() else {
            return (SharedInterests::default(), RecordOutcome::NoCurrentUser);
        };
        let shared = intersect(&mine, &peer.interests);
        let outcome = Self::record(store, prompt, &peer.username, &shared);
        (shared, outcome)
    }
}
