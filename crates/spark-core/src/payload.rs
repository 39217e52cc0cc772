//! Tag payload codec
//!
//! Converts a username and [`InterestSet`] into the plain-text block written
//! to a tag, and parses such a block back.
//!
//! ## Format
//!
//! ```text
//! Username: bob
//! Academic Interests: Math, Physics
//! Sports Interests:
//! Media Interests: Music
//! ```
//!
//! Lines are separated by `\n`. Each line is `Key: value`; list values are
//! joined with `", "`. Decoding is lenient: unknown keys are skipped and
//! missing interest lines decode as empty lists. Only the username is
//! mandatory.

use thiserror::Error;
use tracing::{debug, trace};

use crate::types::InterestSet;

pub const USERNAME_KEY: &str = "Username";
pub const ACADEMIC_KEY: &str = "Academic Interests";
pub const SPORTS_KEY: &str = "Sports Interests";
pub const MEDIA_KEY: &str = "Media Interests";

/// NDEF well-known record type for text
pub const TEXT_RECORD_TYPE: &str = "T";

/// Why a payload could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Text parsed but carried no usable username
    #[error("Payload has no username")]
    InvalidPayload,

    /// Bytes are not valid UTF-8
    #[error("Payload is not valid UTF-8 text")]
    UndecodablePayload,
}

/// The result of a successful decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub username: String,
    pub interests: InterestSet,
}

/// One record of a tag message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    /// Record type name (`"T"` for text)
    pub type_name: String,
    /// Raw record payload
    pub payload: Vec<u8>,
}

impl TagRecord {
    /// A well-known text record
    pub fn text(payload: Vec<u8>) -> Self {
        Self {
            type_name: TEXT_RECORD_TYPE.to_string(),
            payload,
        }
    }
}

/// A message as stored on a tag: an ordered list of records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMessage {
    pub records: Vec<TagRecord>,
}

impl TagMessage {
    /// Wrap an encoded payload in a single text record
    pub fn from_payload(payload: Vec<u8>) -> Self {
        Self {
            records: vec![TagRecord::text(payload)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Encode a username and interests as tag payload bytes.
///
/// Output is deterministic and has no trailing newline.
pub fn encode(username: &str, interests: &InterestSet) -> Vec<u8> {
    let text = format!(
        "{USERNAME_KEY}: {username}\n\
         {ACADEMIC_KEY}: {}\n\
         {SPORTS_KEY}: {}\n\
         {MEDIA_KEY}: {}",
        interests.academic().join(", "),
        interests.sports().join(", "),
        interests.media().join(", "),
    );
    trace!(payload = %text, "Encoded tag payload");
    text.into_bytes()
}

/// Decode tag payload bytes
pub fn decode(bytes: &[u8]) -> Result<DecodedPayload, PayloadError> {
    let text = std::str::from_utf8(bytes).map_err(|_| PayloadError::UndecodablePayload)?;

    let mut username = String::new();
    let mut academic = Vec::new();
    let mut sports = Vec::new();
    let mut media = Vec::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            USERNAME_KEY => username = value.to_string(),
            ACADEMIC_KEY => academic = split_list(value),
            SPORTS_KEY => sports = split_list(value),
            MEDIA_KEY => media = split_list(value),
            other => debug!(key = other, "Ignoring unknown payload key"),
        }
    }

    if username.is_empty() {
        return Err(PayloadError::InvalidPayload);
    }

    Ok(DecodedPayload {
        username,
        interests: InterestSet::from_lists(academic, sports, media),
    })
}

/// Decode the first record of a message that holds a valid payload.
///
/// Returns the error of the last record tried when none decode, and
/// `None` for a message without records.
pub fn decode_message(message: &TagMessage) -> Option<Result<DecodedPayload, PayloadError>> {
    let mut last_err = None;
    for record in &message.records {
        debug!(record_type = %record.type_name, len = record.payload.len(), "Decoding record");
        match decode(&record.payload) {
            Ok(decoded) => return Some(Ok(decoded)),
            Err(e) => last_err = Some(e),
        }
    }
    last_err.map(Err)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
