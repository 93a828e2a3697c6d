//! Narrate a synthetic track without touching the network.
//!
//! Run with: cargo run --example narrate_offline

use std::time::Duration;

use track_narrator::{
    describe_track, Address, GeocodeError, GeocodeResult, GpsPoint, Language, NarrativeConfig,
    Precision, ReverseGeocoder, RouteReport, Telemetry,
};

/// Answers from a table of latitude bands: (south edge, road, locality, district).
struct BandGeocoder {
    bands: Vec<(f64, &'static str, &'static str, Option<&'static str>)>,
}

impl ReverseGeocoder for BandGeocoder {
    async fn reverse(
        &self,
        point: &GpsPoint,
        precision: Precision,
    ) -> Result<GeocodeResult, GeocodeError> {
        let (_, road, locality, district) = self
            .bands
            .iter()
            .rev()
            .find(|(edge, ..)| point.latitude >= *edge)
            .copied()
            .ok_or(GeocodeError::Status(404))?;

        let mut address = Address::new();
        if precision > Precision::CITY {
            address.insert("road", road);
        }
        address.insert("town", locality);
        if let Some(district) = district {
            address.insert("suburb", district);
        }
        Ok(GeocodeResult {
            address,
            ..GeocodeResult::default()
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 12 km due north, one point every ~55 m
    let track: Vec<GpsPoint> = (0..220)
        .map(|i| GpsPoint::new(48.00 + i as f64 * 0.0005, 11.50))
        .collect();

    let geocoder = BandGeocoder {
        bands: vec![
            (48.00, "Hauptstraße", "Unterdorf", None),
            (48.02, "Waldweg", "Unterdorf", Some("Am Forst")),
            (48.05, "Waldweg", "Oberdorf", None),
            (48.08, "Bahnhofstraße", "Oberdorf", Some("Bahnhofsviertel")),
        ],
    };

    for language in [Language::German, Language::English] {
        let config = NarrativeConfig {
            max_samples: 60,
            language,
            request_interval: Duration::ZERO,
            ..NarrativeConfig::default()
        };

        let narrative = match describe_track(&track, &config, &geocoder, &geocoder).await {
            Ok(n) => n,
            Err(e) => {
                eprintln!("narration failed: {}", e);
                return;
            }
        };

        let report = RouteReport::new("synthetic.gpx", &track, &narrative, &Telemetry::Absent, language);
        println!("{}", report.render_text());
    }
}
