//! Connection records - one persisted encounter with a peer.

use std::hash::{Hash, Hasher};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ConnectionId;

/// Why a latitude/longitude pair was rejected
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("Coordinate components must be finite numbers")]
    NonFinite,

    #[error("Latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
}

/// A geographic point where an encounter was pinned.
///
/// Both components are finite and within range, so every coordinate
/// survives a JSON round trip. Equality and hashing compare exact bit
/// patterns.
#[derive(Debug, Clone, Copy)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// A recorded encounter between the owning profile and a peer.
///
/// Connections are immutable once created; the only way to change one is
/// to delete it from the owning profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ConnectionRecord", into = "ConnectionRecord")]
pub struct Connection {
    /// Unique identifier
    pub id: ConnectionId,
    /// Username of the peer
    pub username: String,
    /// When the encounter was recorded
    pub date: DateTime<Utc>,
    /// Opaque photo bytes (usually a JPEG selfie)
    pub photo: Option<Vec<u8>>,
    /// Where the encounter happened, if pinned
    pub location: Option<Coordinate>,
}

impl Connection {
    /// Create a connection stamped with the current time
    pub fn new(
        username: impl Into<String>,
        photo: Option<Vec<u8>>,
        location: Option<Coordinate>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            username: username.into(),
            date: Utc::now(),
            photo,
            location,
        }
    }
}

/// Stored shape of a connection.
///
/// The coordinate is flattened into two optional fields and the photo is
/// kept as base64 text. A record with only one of latitude/longitude, or
/// with an invalid pair, loads without a location.
#[derive(Serialize, Deserialize)]
struct ConnectionRecord {
    id: ConnectionId,
    username: String,
    date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
}

impl From<Connection> for ConnectionRecord {
    fn from(conn: Connection) -> Self {
        Self {
            id: conn.id,
            username: conn.username,
            date: conn.date,
            photo: conn.photo.map(|bytes| BASE64.encode(bytes)),
            latitude: conn.location.map(|c| c.latitude),
            longitude: conn.location.map(|c| c.longitude),
        }
    }
}

impl From<ConnectionRecord> for Connection {
    fn from(record: ConnectionRecord) -> Self {
        let location = match (record.latitude, record.longitude) {
            (Some(latitude), Some(longitude)) => Coordinate::try_new(latitude, longitude).ok(),
            _ => None,
        };
        Self {
            id: record.id,
            username: record.username,
            date: record.date,
            // Unreadable photo data is dropped rather than failing the whole profile list
            photo: record.photo.and_then(|text| BASE64.decode(text).ok()),
            location,
        }
    }
}
