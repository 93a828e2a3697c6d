//! Track file readers.
//!
//! GPX files yield positions only. FIT files yield positions from `record`
//! messages plus every decoded message as telemetry.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::telemetry::{Telemetry, TelemetryField, TelemetryMessage, TelemetryValue};
use crate::GpsPoint;

/// Extensions [`newest_track`] and [`read_track`] accept, lowercase.
pub const TRACK_EXTENSIONS: &[&str] = &["gpx", "fit"];

const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Positions and telemetry decoded from one file.
#[derive(Debug, Clone, Default)]
pub struct TrackData {
    pub points: Vec<GpsPoint>,
    pub telemetry: Telemetry,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Read a `.gpx` or `.fit` file, chosen by extension.
pub fn read_track(path: &Path) -> Result<TrackData> {
    let ext = extension_of(path).unwrap_or_default();
    let bytes = fs::read(path)?;
    let data = match ext.as_str() {
        "gpx" => TrackData {
            points: read_gpx(&bytes)?,
            telemetry: Telemetry::Absent,
        },
        "fit" => read_fit(&bytes)?,
        other => {
            return Err(Error::Source(format!(
                "unsupported file type '{}': {}",
                other,
                path.display()
            )))
        }
    };
    info!(
        "[Reader] {}: {} points, telemetry {}",
        path.display(),
        data.points.len(),
        if matches!(data.telemetry, Telemetry::Present(_)) { "present" } else { "absent" }
    );
    Ok(data)
}

/// Track points in document order, or route points if the file has no
/// track points. Waypoints are ignored.
pub fn read_gpx(bytes: &[u8]) -> Result<Vec<GpsPoint>> {
    let gpx = gpx::read(Cursor::new(bytes)).map_err(|e| Error::Source(format!("GPX: {}", e)))?;

    let to_point = |w: &gpx::Waypoint| {
        let p = w.point();
        GpsPoint::new(p.y(), p.x())
    };

    let track_points: Vec<GpsPoint> = gpx
        .tracks
        .iter()
        .flat_map(|t| t.segments.iter())
        .flat_map(|s| s.points.iter())
        .map(to_point)
        .collect();

    if !track_points.is_empty() {
        return Ok(track_points);
    }

    let route_points: Vec<GpsPoint> = gpx
        .routes
        .iter()
        .flat_map(|r| r.points.iter())
        .map(to_point)
        .collect();
    debug!("[Reader] No track points, {} route points", route_points.len());
    Ok(route_points)
}

/// Positions from `record` messages and every message as telemetry.
///
/// Records without both `position_lat` and `position_long`, or with an
/// out-of-range position, contribute telemetry but no position.
pub fn read_fit(bytes: &[u8]) -> Result<TrackData> {
    use fitparser::profile::MesgNum;

    let records = fitparser::from_bytes(bytes).map_err(|e| Error::Source(format!("FIT: {}", e)))?;

    let mut points = Vec::new();
    let mut messages = Vec::with_capacity(records.len());

    for record in &records {
        let is_record = record.kind() == MesgNum::Record;
        let kind = record.kind().to_string();
        let mut lat = None;
        let mut lng = None;
        let mut fields = Vec::with_capacity(record.fields().len());

        for field in record.fields() {
            let value = fit_value_to_telemetry(field.value());
            if is_record {
                match field.name() {
                    "position_lat" => lat = value.as_f64().map(semicircles_to_degrees),
                    "position_long" => lng = value.as_f64().map(semicircles_to_degrees),
                    _ => {}
                }
            }
            let units = field.units();
            fields.push(TelemetryField {
                name: field.name().to_string(),
                value,
                units: (!units.is_empty()).then(|| units.to_string()),
            });
        }

        if let (Some(lat), Some(lng)) = (lat, lng) {
            let point = GpsPoint::new(lat, lng);
            if point.is_valid() {
                points.push(point);
            }
        }
        messages.push(TelemetryMessage { kind, fields });
    }

    debug!("[Reader] FIT: {} messages, {} positions", messages.len(), points.len());
    Ok(TrackData {
        points,
        telemetry: Telemetry::Present(messages),
    })
}

fn semicircles_to_degrees(value: f64) -> f64 {
    value * SEMICIRCLES_TO_DEGREES
}

fn fit_value_to_f64(value: &fitparser::Value) -> Option<f64> {
    use fitparser::Value;
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::SInt8(v) => Some(*v as f64),
        Value::UInt8(v) | Value::UInt8z(v) | Value::Byte(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt16(v) | Value::UInt16z(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt32(v) | Value::UInt32z(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::UInt64(v) | Value::UInt64z(v) => Some(*v as f64),
        Value::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}

fn fit_value_to_telemetry(value: &fitparser::Value) -> TelemetryValue {
    match fit_value_to_f64(value) {
        Some(v) if v.is_finite() => TelemetryValue::Number(v),
        _ => TelemetryValue::Text(value.to_string()),
    }
}

/// The most recently modified `.gpx` or `.fit` file directly inside `dir`.
pub fn newest_track(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::Source(format!("inbox directory not found: {}", dir.display())));
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let accepted = extension_of(&path)
            .map(|e| TRACK_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false);
        if !accepted || !path.is_file() {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| Error::Source(format!("no .gpx or .fit files in {}", dir.display())))
}
