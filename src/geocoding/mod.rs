//! Coordinate ↔ three-word-address resolution
//!
//! The [`Geocoder`] trait is what the device lifecycle depends on;
//! [`W3wClient`] is the what3words v3 implementation.

pub mod w3w;

pub use w3w::W3wClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A (latitude, longitude) pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `(0, 0)` doubles as "never resolved".
    ///
    /// A device genuinely deployed at the intersection of the equator and the
    /// prime meridian is indistinguishable from one with no coordinates.
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A `word.word.word` address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThreeWordAddress(String);

impl ThreeWordAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ThreeWordAddress {
    type Err = GeocodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("///");
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || p.contains(char::is_whitespace)) {
            return Err(GeocodingError::InvalidAddress(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for ThreeWordAddress {
    type Error = GeocodingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ThreeWordAddress> for String {
    fn from(value: ThreeWordAddress) -> Self {
        value.0
    }
}

impl fmt::Display for ThreeWordAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
    #[error("not a three-word address: {0:?}")]
    InvalidAddress(String),

    #[error("geocoding service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("geocoding service returned an unreadable payload: {0}")]
    Malformed(String),

    #[error("geocoding request timed out")]
    Timeout,

    #[error("geocoding request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for GeocodingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeocodingError::Timeout
        } else if e.is_decode() {
            GeocodingError::Malformed(e.to_string())
        } else {
            GeocodingError::Transport(e)
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve_address_to_coordinates(
        &self,
        address: &ThreeWordAddress,
    ) -> Result<Coordinates, GeocodingError>;

    async fn resolve_coordinates_to_address(
        &self,
        coordinates: Coordinates,
    ) -> Result<ThreeWordAddress, GeocodingError>;
}
