//! Report assembly.
//!
//! Bundles a narrative with track statistics and optional telemetry, and
//! renders it as the plain-text draft or as JSON.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::geo_utils::{compute_bounds, polyline_length};
use crate::narrative::{Language, Narrative, NarrativeEvent};
use crate::telemetry::{HeadlineSummary, Telemetry};
use crate::{Bounds, GpsPoint};

struct HeaderText {
    title: &'static str,
    intro: &'static [&'static str],
    raw_data: &'static str,
    points: &'static str,
    distance: &'static str,
    source: &'static str,
    key_figures: &'static str,
}

const GERMAN_HEADER: HeaderText = HeaderText {
    title: "Rohfassung Wegbeschreibung",
    intro: &[
        "Hinweis: Diese Liste ist eine Rohfassung. Bitte zu einer",
        "gut lesenden Wegbeschreibung zusammenfassen.",
        "",
        "Format: Stichpunkte mit Straßenwechseln und Ortsangaben.",
        "Abschnitte: automatisch nach Distanz gegliedert.",
    ],
    raw_data: "Rohdaten",
    points: "Trackpunkte",
    distance: "Distanz",
    source: "Quelle",
    key_figures: "Eckdaten",
};

const ENGLISH_HEADER: HeaderText = HeaderText {
    title: "Route description draft",
    intro: &[
        "Note: this list is a raw draft. Please condense it into a",
        "readable route description.",
        "",
        "Format: bullet points with road changes and place names.",
        "Sections: split automatically by distance.",
    ],
    raw_data: "Raw data",
    points: "Track points",
    distance: "Distance",
    source: "Source",
    key_figures: "Key figures",
};

fn header_text(language: Language) -> &'static HeaderText {
    match language {
        Language::German => &GERMAN_HEADER,
        Language::English => &ENGLISH_HEADER,
    }
}

/// Everything the writers persist for one track.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    /// File name the track was read from.
    pub source: String,
    pub language: Language,
    /// Points in the full track.
    pub track_points: usize,
    /// Points that were geocoded.
    pub sample_count: usize,
    /// Length of the full track in meters.
    pub distance_m: f64,
    pub bounds: Option<Bounds>,
    pub lines: Vec<String>,
    pub events: Vec<NarrativeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<HeadlineSummary>,
    /// Every telemetry field rendered, keyed `kind.field`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<BTreeMap<String, String>>,
}

impl RouteReport {
    pub fn new(
        source: &str,
        points: &[GpsPoint],
        narrative: &Narrative,
        telemetry: &Telemetry,
        language: Language,
    ) -> Self {
        let summary = telemetry.summary();
        let headline = summary
            .as_ref()
            .map(HeadlineSummary::from_summary)
            .filter(|h| !h.is_empty());

        Self {
            source: source.to_string(),
            language,
            track_points: points.len(),
            sample_count: narrative.sample_count,
            distance_m: polyline_length(points),
            bounds: compute_bounds(points),
            lines: narrative.lines(language),
            events: narrative.events.clone(),
            headline,
            telemetry: summary.map(|s| s.rendered()),
        }
    }

    /// The plain-text draft: header, key figures, then one line per event.
    pub fn render_text(&self) -> String {
        let text = header_text(self.language);
        let mut out = String::new();

        let _ = writeln!(out, "{}", text.title);
        let _ = writeln!(out, "{}", "=".repeat(text.title.chars().count()));
        let _ = writeln!(out);
        for line in text.intro {
            let _ = writeln!(out, "{}", line);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}: {}={}, Samples={}, {}≈{:.2} km",
            text.raw_data,
            text.points,
            self.track_points,
            self.sample_count,
            text.distance,
            self.distance_m / 1000.0
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{}: {}", text.source, self.source);
        let _ = writeln!(out);

        if let Some(headline) = &self.headline {
            let _ = writeln!(out, "{}:", text.key_figures);
            for line in headline.lines(self.language) {
                let _ = writeln!(out, "  {}", line);
            }
            let _ = writeln!(out);
        }

        for line in &self.lines {
            let _ = writeln!(out, "{}", line);
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{TelemetryField, TelemetryMessage};

    fn sample_narrative() -> Narrative {
        Narrative {
            events: vec![
                NarrativeEvent::Start {
                    road: Some("Hauptstraße".into()),
                    locality: Some("Berlin".into()),
                    district: None,
                },
                NarrativeEvent::LookupFailed { reason: "HTTP 503".into() },
                NarrativeEvent::Finish {
                    road: Some("Hauptstraße".into()),
                    locality: Some("Berlin".into()),
                    district: None,
                },
            ],
            sample_count: 3,
            sampled_distance_m: 222.4,
        }
    }

    fn points() -> Vec<GpsPoint> {
        vec![
            GpsPoint::new(52.000, 13.0),
            GpsPoint::new(52.001, 13.0),
            GpsPoint::new(52.002, 13.0),
            GpsPoint::new(52.010, 13.0),
        ]
    }

    #[test]
    fn test_render_text_german() {
        let report = RouteReport::new(
            "ride.gpx",
            &points(),
            &sample_narrative(),
            &Telemetry::Absent,
            Language::German,
        );
        let text = report.render_text();

        assert!(text.starts_with("Rohfassung Wegbeschreibung\n==========================\n\n"));
        assert!(text.contains("Rohdaten: Trackpunkte=4, Samples=3, Distanz≈1.11 km\n"));
        assert!(text.contains("Quelle: ride.gpx\n"));
        assert!(!text.contains("Eckdaten"));
        assert!(text.ends_with(
            "- Start: Hauptstraße (Ort: Berlin)\n\
             Hinweis: Reverse-Geocoding fehlgeschlagen (HTTP 503).\n\
             - Ziel: Hauptstraße (Ort: Berlin)\n"
        ));
    }

    #[test]
    fn test_render_text_with_headline() {
        let telemetry = Telemetry::Present(vec![TelemetryMessage::new(
            "session",
            vec![TelemetryField::number("total_ascent", 320.0, "m")],
        )]);
        let report = RouteReport::new(
            "ride.fit",
            &points(),
            &sample_narrative(),
            &telemetry,
            Language::English,
        );
        let text = report.render_text();

        assert!(text.starts_with("Route description draft\n"));
        assert!(text.contains("Key figures:\n  Ascent: 320 m\n\n"));
        assert!(text.contains("- Finish: Hauptstraße (Place: Berlin)"));
        assert_eq!(
            report.telemetry.as_ref().unwrap()["session.total_ascent"],
            "320.0 m"
        );
    }

    #[test]
    fn test_json_shape() {
        let report = RouteReport::new(
            "ride.gpx",
            &points(),
            &sample_narrative(),
            &Telemetry::Absent,
            Language::English,
        );
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["source"], "ride.gpx");
        assert_eq!(value["language"], "en");
        assert_eq!(value["track_points"], 4);
        assert_eq!(value["events"][0]["kind"], "start");
        assert_eq!(value["events"][1]["reason"], "HTTP 503");
        assert_eq!(value["lines"][2], "- Finish: Hauptstraße (Place: Berlin)");
        assert_eq!(value["bounds"]["max_lat"], 52.01);
        assert!(value.get("headline").is_none());
        assert!(value.get("telemetry").is_none());
    }
}
