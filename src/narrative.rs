//! # Narrative Synthesis
//!
//! Folds a sampled track and its reverse-geocoding results into an ordered list
//! of route events.
//!
//! ## Algorithm
//! For each sample, in track order:
//! 1. Advance the cumulative distance (even if the lookup below fails)
//! 2. Look up the point at street precision; a failure becomes a note line and
//!    nothing else happens for this sample
//! 3. Emit a section marker when the cumulative distance reached the next
//!    boundary, refined by an optional locality lookup
//! 4. The first sample seeds the last-known road/locality/district and emits
//!    "Start"; later samples emit "Road change" when the road differs
//!
//! After the last sample a "Finish" event repeats the last-known values.
//!
//! Every transition is a method on [`NarrativeState`] that takes the state by
//! value and returns the next one, so the event logic is testable without any
//! geocoder.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::geo_utils::haversine_distance;
use crate::geocode::{AddressPicks, Precision, RequestPacer, ReverseGeocoder};
use crate::sampling::sample_points;
use crate::{GpsPoint, NarrativeConfig};

// ============================================================================
// Language
// ============================================================================

/// Output language. Chosen once per run; only label strings differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "de")]
    German,
    #[serde(rename = "en")]
    English,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" | "deu" | "german" | "deutsch" => Ok(Language::German),
            "en" | "eng" | "english" | "englisch" => Ok(Language::English),
            other => Err(format!("unsupported language '{}' (expected de or en)", other)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::German => write!(f, "de"),
            Language::English => write!(f, "en"),
        }
    }
}

struct Labels {
    start: &'static str,
    finish: &'static str,
    road_change: &'static str,
    section_from_km: &'static str,
    locality: &'static str,
    district: &'static str,
    lookup_failed: &'static str,
}

const GERMAN: Labels = Labels {
    start: "Start",
    finish: "Ziel",
    road_change: "Straßenwechsel",
    section_from_km: "Abschnitt: ab km",
    locality: "Ort",
    district: "Ortsteil",
    lookup_failed: "Hinweis: Reverse-Geocoding fehlgeschlagen",
};

const ENGLISH: Labels = Labels {
    start: "Start",
    finish: "Finish",
    road_change: "Road change",
    section_from_km: "Section: from km",
    locality: "Place",
    district: "District",
    lookup_failed: "Note: reverse geocoding failed",
};

impl Language {
    fn labels(self) -> &'static Labels {
        match self {
            Language::German => &GERMAN,
            Language::English => &ENGLISH,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// One narrative line, before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NarrativeEvent {
    Start {
        road: Option<String>,
        locality: Option<String>,
        district: Option<String>,
    },
    /// Marker emitted when the cumulative distance passes a section boundary.
    Section {
        km: u64,
        locality: Option<String>,
        district: Option<String>,
    },
    /// Only the locality/district values that changed are carried.
    RoadChange {
        road: String,
        locality: Option<String>,
        district: Option<String>,
    },
    Finish {
        road: Option<String>,
        locality: Option<String>,
        district: Option<String>,
    },
    LookupFailed {
        reason: String,
    },
}

/// " (Ort: X, Ortsteil: Y)", or nothing when both are missing.
fn place_suffix(labels: &Labels, locality: Option<&str>, district: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(locality) = locality {
        parts.push(format!("{}: {}", labels.locality, locality));
    }
    if let Some(district) = district {
        parts.push(format!("{}: {}", labels.district, district));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn with_road(label: &str, road: Option<&str>) -> String {
    match road {
        Some(road) => format!("{}: {}", label, road),
        None => label.to_string(),
    }
}

impl NarrativeEvent {
    /// Render the event text without bullet.
    ///
    /// ```
    /// use track_narrator::{Language, NarrativeEvent};
    ///
    /// let event = NarrativeEvent::RoadChange {
    ///     road: "Elm Street".into(),
    ///     locality: Some("Shelbyville".into()),
    ///     district: None,
    /// };
    /// assert_eq!(event.render(Language::English), "Road change: Elm Street (Place: Shelbyville)");
    /// assert_eq!(event.render(Language::German), "Straßenwechsel: Elm Street (Ort: Shelbyville)");
    /// ```
    pub fn render(&self, language: Language) -> String {
        let labels = language.labels();
        match self {
            NarrativeEvent::Start { road, locality, district } => format!(
                "{}{}",
                with_road(labels.start, road.as_deref()),
                place_suffix(labels, locality.as_deref(), district.as_deref())
            ),
            // Same parenthetical as Start/Finish. Older drafts wrote the
            // district outside it, as "(Ort: X), Ortsteil: Y".
            NarrativeEvent::Section { km, locality, district } => format!(
                "{} {}{}",
                labels.section_from_km,
                km,
                place_suffix(labels, locality.as_deref(), district.as_deref())
            ),
            NarrativeEvent::RoadChange { road, locality, district } => format!(
                "{}: {}{}",
                labels.road_change,
                road,
                place_suffix(labels, locality.as_deref(), district.as_deref())
            ),
            NarrativeEvent::Finish { road, locality, district } => format!(
                "{}{}",
                with_road(labels.finish, road.as_deref()),
                place_suffix(labels, locality.as_deref(), district.as_deref())
            ),
            NarrativeEvent::LookupFailed { reason } => {
                format!("{} ({}).", labels.lookup_failed, reason)
            }
        }
    }

    /// Render as an output line: events are bulleted, notes are not.
    pub fn line(&self, language: Language) -> String {
        match self {
            NarrativeEvent::LookupFailed { .. } => self.render(language),
            _ => format!("- {}", self.render(language)),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Run-scoped "last known" values and distance bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeState {
    pub last_road: Option<String>,
    pub last_locality: Option<String>,
    pub last_district: Option<String>,
    pub cumulative_distance_m: f64,
    /// Only ever grows, by the section length, one step per marker.
    pub next_section_boundary_m: f64,
}

impl NarrativeState {
    pub fn new(config: &NarrativeConfig) -> Self {
        Self {
            last_road: None,
            last_locality: None,
            last_district: None,
            cumulative_distance_m: 0.0,
            next_section_boundary_m: config.first_section_boundary(),
        }
    }

    pub fn advance(mut self, distance_m: f64) -> Self {
        self.cumulative_distance_m += distance_m;
        self
    }

    pub fn section_due(&self) -> bool {
        self.cumulative_distance_m >= self.next_section_boundary_m
    }

    /// Emit a section marker and move the boundary forward by one section.
    ///
    /// The marker's locality/district come from the refinement lookup when it
    /// resolved them, else from the street-level lookup, and overwrite the
    /// last-known values (even with nothing).
    pub fn enter_section(
        mut self,
        fine: &AddressPicks,
        refined: Option<&AddressPicks>,
        section_length_m: f64,
    ) -> (Self, NarrativeEvent) {
        let km = (self.next_section_boundary_m / 1000.0).floor() as u64;
        let locality = refined
            .and_then(|r| r.locality.clone())
            .or_else(|| fine.locality.clone());
        let district = refined
            .and_then(|r| r.district.clone())
            .or_else(|| fine.district.clone());

        self.next_section_boundary_m += section_length_m;
        self.last_locality = locality.clone();
        self.last_district = district.clone();

        (self, NarrativeEvent::Section { km, locality, district })
    }

    /// Seed the last-known values from the first sample; emit "Start" if asked.
    ///
    /// The Start line always shows the street-level values. A refinement only
    /// updates the last-known locality/district, so it surfaces later in road
    /// change comparisons and in "Finish".
    pub fn start(
        mut self,
        fine: &AddressPicks,
        refined: Option<&AddressPicks>,
        emit: bool,
    ) -> (Self, Option<NarrativeEvent>) {
        if fine.road.is_some() {
            self.last_road = fine.road.clone();
        }
        if fine.locality.is_some() {
            self.last_locality = fine.locality.clone();
        }
        if fine.district.is_some() {
            self.last_district = fine.district.clone();
        }

        if let Some(refined) = refined {
            if refined.locality.is_some() {
                self.last_locality = refined.locality.clone();
            }
            if refined.district.is_some() {
                self.last_district = refined.district.clone();
            }
        }

        let event = emit.then(|| NarrativeEvent::Start {
            road: fine.road.clone(),
            locality: fine.locality.clone(),
            district: fine.district.clone(),
        });
        (self, event)
    }

    /// Emit "Road change" when the road differs from the last-known one.
    ///
    /// Locality and district are compared independently; only the changed ones
    /// are reported and updated. The last-known road is updated whenever a road
    /// was found.
    pub fn road_change(mut self, fine: &AddressPicks) -> (Self, Option<NarrativeEvent>) {
        let Some(road) = fine.road.clone() else {
            return (self, None);
        };

        let mut event = None;
        if self.last_road.as_deref() != Some(road.as_str()) {
            let locality = fine
                .locality
                .clone()
                .filter(|l| self.last_locality.as_ref() != Some(l));
            let district = fine
                .district
                .clone()
                .filter(|d| self.last_district.as_ref() != Some(d));

            if locality.is_some() {
                self.last_locality = locality.clone();
            }
            if district.is_some() {
                self.last_district = district.clone();
            }

            event = Some(NarrativeEvent::RoadChange {
                road: road.clone(),
                locality,
                district,
            });
        }

        self.last_road = Some(road);
        (self, event)
    }

    pub fn finish(&self) -> NarrativeEvent {
        NarrativeEvent::Finish {
            road: self.last_road.clone(),
            locality: self.last_locality.clone(),
            district: self.last_district.clone(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Result of one narrative run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    /// Events in the order they were detected.
    pub events: Vec<NarrativeEvent>,
    /// Number of sampled (geocoded) points.
    pub sample_count: usize,
    /// Distance along the sampled points in meters.
    pub sampled_distance_m: f64,
}

impl Narrative {
    pub fn lines(&self, language: Language) -> Vec<String> {
        self.events.iter().map(|e| e.line(language)).collect()
    }
}

/// Drives one run over already-sampled points.
///
/// Owns the request pacer: every provider call, street-level or refinement,
/// waits for its slot first.
pub struct NarrativeBuilder<'a, P, L> {
    config: &'a NarrativeConfig,
    point_geocoder: &'a P,
    locality_geocoder: &'a L,
    pacer: RequestPacer,
}

impl<'a, P: ReverseGeocoder, L: ReverseGeocoder> NarrativeBuilder<'a, P, L> {
    pub fn new(config: &'a NarrativeConfig, point_geocoder: &'a P, locality_geocoder: &'a L) -> Self {
        Self {
            config,
            point_geocoder,
            locality_geocoder,
            pacer: RequestPacer::new(config.request_interval),
        }
    }

    pub async fn run(mut self, samples: &[GpsPoint]) -> Narrative {
        let start = Instant::now();
        let total = samples.len();
        let mut state = NarrativeState::new(self.config);
        let mut events = Vec::new();

        for (idx, point) in samples.iter().enumerate() {
            if idx > 0 {
                state = state.advance(haversine_distance(&samples[idx - 1], point));
            }

            let (next, step_events) = self.step(state, idx, point).await;
            state = next;
            events.extend(step_events);

            debug!(
                "[Narrative] {}/{} samples, {:.2} km, {} events",
                idx + 1,
                total,
                state.cumulative_distance_m / 1000.0,
                events.len()
            );
        }

        if self.config.include_start_finish && !samples.is_empty() {
            events.push(state.finish());
        }

        info!(
            "[Narrative] {} samples -> {} events, {} requests in {:.1}s",
            total,
            events.len(),
            self.pacer.dispatched_count(),
            start.elapsed().as_secs_f64()
        );

        Narrative {
            events,
            sample_count: total,
            sampled_distance_m: state.cumulative_distance_m,
        }
    }

    /// Process one sample: state in, state and events out.
    async fn step(
        &mut self,
        state: NarrativeState,
        idx: usize,
        point: &GpsPoint,
    ) -> (NarrativeState, Vec<NarrativeEvent>) {
        let mut events = Vec::new();

        self.pacer.wait_for_slot().await;
        let fine = match self.point_geocoder.reverse(point, Precision::STREET).await {
            Ok(result) => result.picks(),
            Err(e) => {
                warn!(
                    "[Narrative] Lookup failed for sample {} ({:.6}, {:.6}): {}",
                    idx, point.latitude, point.longitude, e
                );
                events.push(NarrativeEvent::LookupFailed { reason: e.to_string() });
                return (state, events);
            }
        };

        let mut state = state;
        if state.section_due() {
            let refined = self.refine(point).await;
            let (next, event) =
                state.enter_section(&fine, refined.as_ref(), self.config.section_length_m);
            state = next;
            events.push(event);
        }

        if idx == 0 {
            let refined = if self.config.include_start_finish {
                self.refine(point).await
            } else {
                None
            };
            let (next, event) = state.start(&fine, refined.as_ref(), self.config.include_start_finish);
            events.extend(event);
            return (next, events);
        }

        let (next, event) = state.road_change(&fine);
        events.extend(event);
        (next, events)
    }

    /// Best-effort locality lookup; failures are logged and ignored.
    async fn refine(&mut self, point: &GpsPoint) -> Option<AddressPicks> {
        let precision = self.config.locality_precision?;

        self.pacer.wait_for_slot().await;
        match self.locality_geocoder.reverse(point, precision).await {
            Ok(result) => Some(result.picks()),
            Err(e) => {
                warn!(
                    "[Narrative] Locality refinement failed at ({:.6}, {:.6}): {}",
                    point.latitude, point.longitude, e
                );
                None
            }
        }
    }
}

/// Downsample a track and narrate it.
///
/// Fails only when `points` is empty; individual lookup failures end up as
/// [`NarrativeEvent::LookupFailed`] lines.
pub async fn describe_track<P: ReverseGeocoder, L: ReverseGeocoder>(
    points: &[GpsPoint],
    config: &NarrativeConfig,
    point_geocoder: &P,
    locality_geocoder: &L,
) -> Result<Narrative> {
    if points.is_empty() {
        return Err(Error::NoPoints);
    }

    let samples = sample_points(points, config.max_samples, config.min_spacing_m);
    Ok(NarrativeBuilder::new(config, point_geocoder, locality_geocoder)
        .run(&samples)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;
    use crate::geocode::{Address, GeocodeResult};
    use std::cell::Cell;
    use std::time::Duration;

    const STEP_DEG: f64 = 0.001; // ~111m along a meridian

    /// Geocoder answering from a closure over the sample index.
    struct FnGeocoder<F> {
        f: F,
        calls: Cell<usize>,
    }

    impl<F> FnGeocoder<F>
    where
        F: Fn(usize, Precision) -> std::result::Result<GeocodeResult, GeocodeError>,
    {
        fn new(f: F) -> Self {
            Self { f, calls: Cell::new(0) }
        }
    }

    impl<F> ReverseGeocoder for FnGeocoder<F>
    where
        F: Fn(usize, Precision) -> std::result::Result<GeocodeResult, GeocodeError>,
    {
        async fn reverse(
            &self,
            point: &GpsPoint,
            precision: Precision,
        ) -> std::result::Result<GeocodeResult, GeocodeError> {
            self.calls.set(self.calls.get() + 1);
            let idx = ((point.latitude - 52.0) / STEP_DEG).round() as usize;
            (self.f)(idx, precision)
        }
    }

    fn track(n: usize) -> Vec<GpsPoint> {
        (0..n)
            .map(|i| GpsPoint::new(52.0 + i as f64 * STEP_DEG, 13.0))
            .collect()
    }

    fn result(pairs: &[(&str, &str)]) -> GeocodeResult {
        GeocodeResult {
            address: pairs.iter().copied().collect::<Address>(),
            name: None,
            category: None,
        }
    }

    fn test_config() -> NarrativeConfig {
        NarrativeConfig {
            language: Language::English,
            request_interval: Duration::ZERO,
            ..NarrativeConfig::default()
        }
    }

    fn picks(road: Option<&str>, locality: Option<&str>, district: Option<&str>) -> AddressPicks {
        AddressPicks {
            road: road.map(String::from),
            locality: locality.map(String::from),
            district: district.map(String::from),
        }
    }

    fn rendered(narrative: &Narrative) -> Vec<String> {
        narrative
            .events
            .iter()
            .map(|e| e.render(Language::English))
            .collect()
    }

    #[tokio::test]
    async fn test_uniform_track_is_start_and_finish() {
        let geocoder = FnGeocoder::new(|_, _| {
            Ok(result(&[("road", "Main Street"), ("city", "Springfield")]))
        });
        let config = test_config();

        let narrative = describe_track(&track(10), &config, &geocoder, &geocoder)
            .await
            .unwrap();

        assert_eq!(
            rendered(&narrative),
            vec![
                "Start: Main Street (Place: Springfield)",
                "Finish: Main Street (Place: Springfield)",
            ]
        );
        assert_eq!(narrative.sample_count, 10);
    }

    #[tokio::test]
    async fn test_section_then_road_change_order() {
        // 40 samples ~111m apart: section at ~3km (sample 27), road and town change at 30
        let geocoder = FnGeocoder::new(|idx, _| {
            if idx < 30 {
                Ok(result(&[("road", "Main Street"), ("city", "Springfield")]))
            } else {
                Ok(result(&[("road", "Elm Street"), ("city", "Shelbyville")]))
            }
        });
        let config = test_config();

        let narrative = describe_track(&track(40), &config, &geocoder, &geocoder)
            .await
            .unwrap();

        assert_eq!(
            rendered(&narrative),
            vec![
                "Start: Main Street (Place: Springfield)",
                "Section: from km 3 (Place: Springfield)",
                "Road change: Elm Street (Place: Shelbyville)",
                "Finish: Elm Street (Place: Shelbyville)",
            ]
        );
        assert!(narrative.sampled_distance_m > 4000.0);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_last_known_state() {
        let point_geocoder = FnGeocoder::new(|idx, _| {
            if idx == 5 {
                Err(GeocodeError::Status(503))
            } else {
                Ok(result(&[("road", "Main Street"), ("city", "Springfield")]))
            }
        });
        let config = test_config();

        let narrative = describe_track(&track(10), &config, &point_geocoder, &point_geocoder)
            .await
            .unwrap();

        assert_eq!(
            rendered(&narrative),
            vec![
                "Start: Main Street (Place: Springfield)",
                "Note: reverse geocoding failed (HTTP 503).",
                "Finish: Main Street (Place: Springfield)",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_still_advances_distance() {
        // Every lookup after the first fails; the distance must still cover the track
        let geocoder = FnGeocoder::new(|idx, _| {
            if idx == 0 {
                Ok(result(&[("road", "Main Street")]))
            } else {
                Err(GeocodeError::Decode("truncated".into()))
            }
        });
        let config = NarrativeConfig {
            include_start_finish: false,
            ..test_config()
        };

        let points = track(5);
        let narrative = describe_track(&points, &config, &geocoder, &geocoder)
            .await
            .unwrap();

        assert_eq!(narrative.events.len(), 4);
        assert!(narrative
            .events
            .iter()
            .all(|e| matches!(e, NarrativeEvent::LookupFailed { .. })));
        let expected = crate::geo_utils::polyline_length(&points);
        assert!((narrative.sampled_distance_m - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_refinement_failure_is_swallowed() {
        let point_geocoder = FnGeocoder::new(|_, _| {
            Ok(result(&[("road", "Main Street"), ("town", "Teltow"), ("quarter", "Seehof")]))
        });
        let locality_geocoder = FnGeocoder::new(|_, _| Err(GeocodeError::Status(500)));
        let config = test_config();

        let narrative = describe_track(&track(40), &config, &point_geocoder, &locality_geocoder)
            .await
            .unwrap();

        assert_eq!(
            rendered(&narrative),
            vec![
                "Start: Main Street (Place: Teltow, District: Seehof)",
                "Section: from km 3 (Place: Teltow, District: Seehof)",
                "Finish: Main Street (Place: Teltow, District: Seehof)",
            ]
        );
        // One refinement at the start, one at the section
        assert_eq!(locality_geocoder.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_refinement_reaches_finish_but_not_start() {
        let point_geocoder = FnGeocoder::new(|_, precision| {
            assert_eq!(precision, Precision::STREET);
            Ok(result(&[("road", "Dorfstraße"), ("village", "Kleinmachnow")]))
        });
        let locality_geocoder = FnGeocoder::new(|_, precision| {
            assert_eq!(precision, Precision::CITY);
            Ok(result(&[("town", "Potsdam-Mittelmark"), ("district", "Dreilinden")]))
        });
        let config = test_config();

        let narrative = describe_track(&track(3), &config, &point_geocoder, &locality_geocoder)
            .await
            .unwrap();

        assert_eq!(
            rendered(&narrative),
            vec![
                "Start: Dorfstraße (Place: Kleinmachnow)",
                "Finish: Dorfstraße (Place: Potsdam-Mittelmark, District: Dreilinden)",
            ]
        );
    }

    #[tokio::test]
    async fn test_locality_precision_none_skips_refinement() {
        let geocoder = FnGeocoder::new(|_, _| Ok(result(&[("road", "Main Street")])));
        let locality_geocoder = FnGeocoder::new(|_, _| Ok(result(&[("city", "Nowhere")])));
        let config = NarrativeConfig {
            locality_precision: None,
            ..test_config()
        };

        let narrative = describe_track(&track(40), &config, &geocoder, &locality_geocoder)
            .await
            .unwrap();

        assert_eq!(locality_geocoder.calls.get(), 0);
        assert_eq!(geocoder.calls.get(), 40);
        assert_eq!(
            rendered(&narrative),
            vec!["Start: Main Street", "Section: from km 3", "Finish: Main Street"]
        );
    }

    #[tokio::test]
    async fn test_start_finish_disabled() {
        let geocoder = FnGeocoder::new(|idx, _| {
            let road = if idx < 3 { "A-Weg" } else { "B-Weg" };
            Ok(result(&[("road", road)]))
        });
        let locality_geocoder = FnGeocoder::new(|_, _| Ok(result(&[("city", "Nowhere")])));
        let config = NarrativeConfig {
            include_start_finish: false,
            ..test_config()
        };

        let narrative = describe_track(&track(6), &config, &geocoder, &locality_geocoder)
            .await
            .unwrap();

        assert_eq!(rendered(&narrative), vec!["Road change: B-Weg"]);
        assert_eq!(locality_geocoder.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_german_lines() {
        let geocoder = FnGeocoder::new(|idx, _| {
            if idx == 1 {
                Err(GeocodeError::Status(429))
            } else {
                Ok(result(&[("road", "Hauptstraße"), ("city", "Berlin"), ("suburb", "Mitte")]))
            }
        });
        let config = NarrativeConfig {
            language: Language::German,
            ..test_config()
        };

        let narrative = describe_track(&track(3), &config, &geocoder, &geocoder)
            .await
            .unwrap();

        // "suburb" is a locality key, never a district key
        assert_eq!(
            narrative.lines(config.language),
            vec![
                "- Start: Hauptstraße (Ort: Berlin)",
                "Hinweis: Reverse-Geocoding fehlgeschlagen (HTTP 429).",
                "- Ziel: Hauptstraße (Ort: Berlin)",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_track_is_error() {
        let geocoder = FnGeocoder::new(|_, _| Ok(GeocodeResult::default()));
        let err = describe_track(&[], &test_config(), &geocoder, &geocoder)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPoints));
        assert_eq!(geocoder.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_single_point_track() {
        let geocoder = FnGeocoder::new(|_, _| Ok(result(&[("road", "Ring")])));
        let narrative = describe_track(&track(1), &test_config(), &geocoder, &geocoder)
            .await
            .unwrap();
        assert_eq!(rendered(&narrative), vec!["Start: Ring", "Finish: Ring"]);
        assert_eq!(narrative.sampled_distance_m, 0.0);
    }

    #[test]
    fn test_start_omits_empty_parenthetical() {
        let state = NarrativeState::new(&test_config());
        let (state, event) = state.start(&picks(None, None, None), None, true);
        assert_eq!(event.unwrap().render(Language::English), "Start");
        assert_eq!(state.finish().render(Language::German), "Ziel");
    }

    #[test]
    fn test_start_line_uses_street_level_places() {
        let state = NarrativeState::new(&test_config());
        let fine = picks(Some("Dorfstr"), Some("Fine"), None);
        let refined = picks(None, Some("Coarse"), Some("Nord"));

        let (state, event) = state.start(&fine, Some(&refined), true);
        assert_eq!(event.unwrap().render(Language::German), "Start: Dorfstr (Ort: Fine)");
        assert_eq!(state.last_locality.as_deref(), Some("Coarse"));
        assert_eq!(state.last_district.as_deref(), Some("Nord"));
        assert_eq!(
            state.finish().render(Language::German),
            "Ziel: Dorfstr (Ort: Coarse, Ortsteil: Nord)"
        );
    }

    #[test]
    fn test_start_without_emit_still_seeds() {
        let state = NarrativeState::new(&test_config());
        let (state, event) = state.start(&picks(Some("Ring"), Some("Berlin"), None), None, false);
        assert!(event.is_none());
        assert_eq!(state.last_road.as_deref(), Some("Ring"));
        assert_eq!(state.last_locality.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_road_change_reports_only_changed_places() {
        let state = NarrativeState {
            last_road: Some("Ring".into()),
            last_locality: Some("Berlin".into()),
            last_district: Some("Mitte".into()),
            cumulative_distance_m: 0.0,
            next_section_boundary_m: 3000.0,
        };

        let (state, event) = state.road_change(&picks(Some("Allee"), Some("Berlin"), Some("Pankow")));
        assert_eq!(
            event,
            Some(NarrativeEvent::RoadChange {
                road: "Allee".into(),
                locality: None,
                district: Some("Pankow".into()),
            })
        );
        assert_eq!(state.last_road.as_deref(), Some("Allee"));
        assert_eq!(state.last_district.as_deref(), Some("Pankow"));
    }

    #[test]
    fn test_same_road_no_event_and_places_untouched() {
        let state = NarrativeState {
            last_road: Some("Ring".into()),
            last_locality: Some("Berlin".into()),
            last_district: None,
            cumulative_distance_m: 0.0,
            next_section_boundary_m: 3000.0,
        };

        let (state, event) = state.road_change(&picks(Some("Ring"), Some("Potsdam"), Some("Babelsberg")));
        assert!(event.is_none());
        assert_eq!(state.last_locality.as_deref(), Some("Berlin"));
        assert_eq!(state.last_district, None);
    }

    #[test]
    fn test_missing_road_changes_nothing() {
        let state = NarrativeState::new(&test_config());
        let before = state.clone();
        let (state, event) = state.road_change(&picks(None, Some("Potsdam"), None));
        assert!(event.is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn test_section_boundary_is_monotonic() {
        let config = test_config();
        let state = NarrativeState::new(&config).advance(7_000.0);
        assert!(state.section_due());

        // One marker per call, even when several boundaries were passed
        let (state, event) = state.enter_section(&picks(None, Some("Werder"), None), None, 3000.0);
        assert_eq!(event.render(Language::English), "Section: from km 3 (Place: Werder)");
        assert_eq!(state.next_section_boundary_m, 6000.0);
        assert_eq!(state.last_locality.as_deref(), Some("Werder"));

        let (state, event) = state.enter_section(&picks(None, None, None), None, 3000.0);
        assert_eq!(event.render(Language::English), "Section: from km 6");
        assert_eq!(state.next_section_boundary_m, 9000.0);
        assert_eq!(state.last_locality, None);
        assert!(!state.section_due());
    }

    #[test]
    fn test_sections_disabled_never_due() {
        let config = NarrativeConfig {
            section_length_m: 0.0,
            ..test_config()
        };
        let state = NarrativeState::new(&config).advance(1e9);
        assert!(!state.section_due());
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("de".parse::<Language>(), Ok(Language::German));
        assert_eq!("English".parse::<Language>(), Ok(Language::English));
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::English.to_string(), "en");
    }
}
