//! Error types.
//!
//! Only input absence and unreadable source data abort a run. Geocoding
//! failures are reported per lookup and absorbed by the narrative engine.

use thiserror::Error;

/// A single reverse-geocoding call failed.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for GeocodeError {
    fn from(e: serde_json::Error) -> Self {
        GeocodeError::Decode(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("no track or route points found")]
    NoPoints,
    #[error("reverse geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("unreadable track source: {0}")]
    Source(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
