//! # Track Narrator
//!
//! Turns a raw GPS track into a bullet-point route description.
//!
//! This library provides:
//! - Adaptive spatial downsampling of dense tracks to a bounded sample set
//! - Reverse geocoding through Nominatim or Photon with request pacing
//! - A narrative engine that folds geocoded samples into start, section,
//!   road-change and finish events (German or English)
//! - Telemetry summaries for FIT recordings
//!
//! ## Features
//!
//! - **`http`** - Enable the HTTP reverse geocoders
//! - **`readers`** - Enable GPX and FIT track readers
//! - **`cli`** - Build the `track2text` command-line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_narrator::{GpsPoint, NarrativeConfig, sample_points};
//!
//! let track: Vec<GpsPoint> = (0..1000)
//!     .map(|i| GpsPoint::new(52.52 + i as f64 * 0.0001, 13.405))
//!     .collect();
//!
//! let config = NarrativeConfig::default();
//! let samples = sample_points(&track, config.max_samples, config.min_spacing_m);
//!
//! assert!(samples.len() <= config.max_samples);
//! assert_eq!(samples.first(), track.first());
//! assert_eq!(samples.last(), track.last());
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod error;
pub use error::{Error, GeocodeError, Result};

pub mod geo_utils;

// Adaptive downsampling
pub mod sampling;
pub use sampling::{downsample, sample_points};

// Reverse geocoding gateway
pub mod geocode;
pub use geocode::{
    Address, AddressPicks, GeocodeResult, GeocoderConfig, GeocoderKind, Precision,
    RequestPacer, ReverseGeocoder,
};
#[cfg(feature = "http")]
pub use geocode::Geocoder;

// Narrative synthesis
pub mod narrative;
pub use narrative::{describe_track, Language, Narrative, NarrativeEvent, NarrativeState};

// Telemetry summaries
pub mod telemetry;
pub use telemetry::{
    FieldSummary, HeadlineSummary, Telemetry, TelemetryField, TelemetryMessage,
    TelemetrySummary, TelemetryValue,
};

// Report assembly and rendering
pub mod output;
pub use output::RouteReport;

// File readers
#[cfg(feature = "readers")]
pub mod reader;

// ============================================================================
// Core Types
// ============================================================================

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Lat/lng extent of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        geo_utils::compute_bounds(points)
    }

    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Configuration for one narrative run.
///
/// Built once at run start and passed by reference to every component.
/// Nothing in the library reads the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Upper bound on the number of sampled (and therefore geocoded) points.
    /// Default: 200
    pub max_samples: usize,

    /// Initial minimum spacing between kept samples, in meters.
    /// Grows by 1.5x until the sample cap is met. Default: 50.0
    pub min_spacing_m: f64,

    /// Distance between section markers in meters. Zero or negative disables
    /// section markers. Default: 3000.0
    pub section_length_m: f64,

    /// Zoom used for the extra locality lookup at start and section points.
    /// `None` disables those refinement lookups. Default: city level (12)
    pub locality_precision: Option<Precision>,

    /// Emit "Start" and "Finish" events. Default: true
    pub include_start_finish: bool,

    /// Output language for rendered lines. Default: German
    pub language: Language,

    /// Minimum spacing between the starts of two provider requests.
    /// Public geocoders require at least one second. Default: 1s
    pub request_interval: Duration,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            max_samples: 200,
            min_spacing_m: 50.0,
            section_length_m: 3000.0,
            locality_precision: Some(Precision::CITY),
            include_start_finish: true,
            language: Language::German,
            request_interval: Duration::from_secs(1),
        }
    }
}

impl NarrativeConfig {
    /// First section boundary, or infinity when sections are disabled.
    pub fn first_section_boundary(&self) -> f64 {
        if self.section_length_m > 0.0 {
            self.section_length_m
        } else {
            f64::INFINITY
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(52.52, 13.405).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_default_config() {
        let config = NarrativeConfig::default();
        assert_eq!(config.max_samples, 200);
        assert_eq!(config.min_spacing_m, 50.0);
        assert_eq!(config.section_length_m, 3000.0);
        assert_eq!(config.locality_precision, Some(Precision::CITY));
        assert!(config.include_start_finish);
        assert_eq!(config.language, Language::German);
        assert_eq!(config.request_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_sections_disabled() {
        let config = NarrativeConfig {
            section_length_m: 0.0,
            ..NarrativeConfig::default()
        };
        assert!(config.first_section_boundary().is_infinite());
    }

    #[test]
    fn test_bounds_center() {
        let points = vec![GpsPoint::new(52.50, 13.40), GpsPoint::new(52.52, 13.42)];
        let bounds = Bounds::from_points(&points).unwrap();
        let center = bounds.center();
        assert!((center.latitude - 52.51).abs() < 1e-9);
        assert!((center.longitude - 13.41).abs() < 1e-9);
    }
}
