//! Telemetry summaries for FIT-style message streams.
//!
//! Two views over the same stream:
//! - [`TelemetrySummary`]: one [`FieldSummary`] per (message kind, field name),
//!   accumulated over the whole stream, for the debug dump
//! - [`HeadlineSummary`]: a handful of session figures (duration, climbing,
//!   speed, heart rate, temperature...) for the report header
//!
//! Values are expected in the units FIT decoders produce after scaling:
//! seconds, meters, meters per second, degrees Celsius.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::narrative::Language;

/// Distinct non-numeric values remembered per field.
pub const MAX_DISTINCT_VALUES: usize = 5;

// ============================================================================
// Input
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Text(String),
}

impl TelemetryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TelemetryValue::Number(v) => Some(*v),
            TelemetryValue::Text(_) => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Number(v) => write!(f, "{}", v),
            TelemetryValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryField {
    pub name: String,
    pub value: TelemetryValue,
    pub units: Option<String>,
}

impl TelemetryField {
    pub fn number(name: &str, value: f64, units: &str) -> Self {
        Self {
            name: name.to_string(),
            value: TelemetryValue::Number(value),
            units: (!units.is_empty()).then(|| units.to_string()),
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: TelemetryValue::Text(value.to_string()),
            units: None,
        }
    }
}

/// One decoded message, e.g. a `record` sample or the `session` totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub kind: String,
    pub fields: Vec<TelemetryField>,
}

impl TelemetryMessage {
    pub fn new(kind: &str, fields: Vec<TelemetryField>) -> Self {
        Self {
            kind: kind.to_string(),
            fields,
        }
    }
}

/// Telemetry attached to a track. GPX tracks carry none.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Telemetry {
    #[default]
    Absent,
    Present(Vec<TelemetryMessage>),
}

impl Telemetry {
    pub fn summary(&self) -> Option<TelemetrySummary> {
        match self {
            Telemetry::Absent => None,
            Telemetry::Present(messages) => Some(TelemetrySummary::from_messages(messages)),
        }
    }
}

// ============================================================================
// Per-field aggregation
// ============================================================================

/// Running statistics for one (message kind, field name) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub count: u64,
    pub numeric_count: u64,
    pub total: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last_value: Option<TelemetryValue>,
    pub unit: Option<String>,
    /// Up to [`MAX_DISTINCT_VALUES`] distinct non-numeric values, first seen first.
    pub distinct_values: Vec<String>,
    /// More distinct values were seen than were kept.
    pub distinct_truncated: bool,
}

impl FieldSummary {
    pub fn observe(&mut self, value: &TelemetryValue, unit: Option<&str>) {
        self.count += 1;
        if self.unit.is_none() {
            self.unit = unit.filter(|u| !u.is_empty()).map(str::to_string);
        }

        match value {
            TelemetryValue::Number(v) => {
                self.numeric_count += 1;
                self.total += v;
                self.min = Some(self.min.map_or(*v, |m| m.min(*v)));
                self.max = Some(self.max.map_or(*v, |m| m.max(*v)));
            }
            TelemetryValue::Text(s) => {
                if !self.distinct_values.iter().any(|d| d == s) {
                    if self.distinct_values.len() < MAX_DISTINCT_VALUES {
                        self.distinct_values.push(s.clone());
                    } else {
                        self.distinct_truncated = true;
                    }
                }
            }
        }
        self.last_value = Some(value.clone());
    }

    pub fn average(&self) -> Option<f64> {
        (self.numeric_count > 0).then(|| self.total / self.numeric_count as f64)
    }

    /// Last observed value if it was numeric.
    pub fn last_number(&self) -> Option<f64> {
        self.last_value.as_ref().and_then(TelemetryValue::as_f64)
    }

    fn unit_suffix(&self) -> String {
        self.unit
            .as_deref()
            .map(|u| format!(" {}", u))
            .unwrap_or_default()
    }

    /// Human-readable summary.
    ///
    /// ```
    /// use track_narrator::{FieldSummary, TelemetryValue};
    ///
    /// let mut altitude = FieldSummary::default();
    /// altitude.observe(&TelemetryValue::Number(10.0), Some("m"));
    /// altitude.observe(&TelemetryValue::Number(20.0), Some("m"));
    /// assert_eq!(altitude.render(), "min=10.0, max=20.0, avg=15.00 m");
    /// ```
    pub fn render(&self) -> String {
        match (self.min, self.max, self.average()) {
            (Some(min), Some(max), Some(avg)) if self.numeric_count > 1 => {
                format!("min={:?}, max={:?}, avg={:.2}{}", min, max, avg, self.unit_suffix())
            }
            (Some(value), _, _) if self.numeric_count == 1 => {
                format!("{:?}{}", value, self.unit_suffix())
            }
            _ if !self.distinct_values.is_empty() => {
                let mut out = self.distinct_values.join(", ");
                if self.distinct_truncated {
                    out.push_str(", …");
                }
                out
            }
            _ => self
                .last_value
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Field summaries for a whole stream, keyed by message kind then field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetrySummary {
    fields: BTreeMap<String, BTreeMap<String, FieldSummary>>,
}

impl TelemetrySummary {
    pub fn from_messages<'a, I>(messages: I) -> Self
    where
        I: IntoIterator<Item = &'a TelemetryMessage>,
    {
        let mut summary = Self::default();
        for message in messages {
            summary.observe(message);
        }
        summary
    }

    pub fn observe(&mut self, message: &TelemetryMessage) {
        let by_field = self.fields.entry(message.kind.clone()).or_default();
        for field in &message.fields {
            by_field
                .entry(field.name.clone())
                .or_default()
                .observe(&field.value, field.units.as_deref());
        }
    }

    pub fn get(&self, kind: &str, field: &str) -> Option<&FieldSummary> {
        self.fields.get(kind)?.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every field rendered, keyed `kind.field`.
    pub fn rendered(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .flat_map(|(kind, by_field)| {
                by_field
                    .iter()
                    .map(move |(name, summary)| (format!("{}.{}", kind, name), summary.render()))
            })
            .collect()
    }
}

// ============================================================================
// Headline
// ============================================================================

struct HeadlineField {
    key: &'static str,
    de: &'static str,
    en: &'static str,
}

const HEADLINE_FIELDS: &[HeadlineField] = &[
    HeadlineField { key: "elapsed_time", de: "Gesamtzeit", en: "Elapsed time" },
    HeadlineField { key: "timer_time", de: "Bewegungszeit", en: "Timer time" },
    HeadlineField { key: "distance", de: "Distanz", en: "Distance" },
    HeadlineField { key: "ascent", de: "Anstieg", en: "Ascent" },
    HeadlineField { key: "descent", de: "Abstieg", en: "Descent" },
    HeadlineField { key: "max_grade", de: "Max. Steigung", en: "Max grade" },
    HeadlineField { key: "max_altitude", de: "Max. Höhe", en: "Max altitude" },
    HeadlineField { key: "avg_speed", de: "Ø Geschwindigkeit", en: "Avg speed" },
    HeadlineField { key: "max_speed", de: "Max. Geschwindigkeit", en: "Max speed" },
    HeadlineField { key: "avg_power", de: "Ø Leistung", en: "Avg power" },
    HeadlineField { key: "avg_heart_rate", de: "Ø Puls", en: "Avg heart rate" },
    HeadlineField { key: "max_heart_rate", de: "Max. Puls", en: "Max heart rate" },
    HeadlineField { key: "avg_cadence", de: "Ø Trittfrequenz", en: "Avg cadence" },
    HeadlineField { key: "temperature", de: "Temperatur", en: "Temperature" },
];

fn format_duration(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Curated session figures, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlineSummary {
    entries: Vec<(&'static str, String)>,
}

impl HeadlineSummary {
    /// Pick the headline figures out of a field summary table.
    ///
    /// Session totals come from the `session` message. Temperature prefers the
    /// per-sample `record.temperature` statistics and falls back to the
    /// session's min/max/avg temperature fields.
    pub fn from_summary(summary: &TelemetrySummary) -> Self {
        let session = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| summary.get("session", name).and_then(FieldSummary::last_number))
        };

        let mut values: BTreeMap<&'static str, String> = BTreeMap::new();
        let mut put = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                values.insert(key, value);
            }
        };

        put("elapsed_time", session(&["total_elapsed_time"]).map(format_duration));
        put("timer_time", session(&["total_timer_time"]).map(format_duration));
        put("distance", session(&["total_distance"]).map(|m| format!("{:.2} km", m / 1000.0)));
        put("ascent", session(&["total_ascent"]).map(|m| format!("{:.0} m", m)));
        put("descent", session(&["total_descent"]).map(|m| format!("{:.0} m", m)));
        put("max_grade", session(&["max_pos_grade"]).map(|g| format!("{:.1} %", g)));
        put(
            "max_altitude",
            session(&["enhanced_max_altitude", "max_altitude"]).map(|m| format!("{:.0} m", m)),
        );
        put(
            "avg_speed",
            session(&["enhanced_avg_speed", "avg_speed"]).map(|v| format!("{:.1} km/h", v * 3.6)),
        );
        put(
            "max_speed",
            session(&["enhanced_max_speed", "max_speed"]).map(|v| format!("{:.1} km/h", v * 3.6)),
        );
        put("avg_power", session(&["avg_power"]).map(|w| format!("{:.0} W", w)));
        put("avg_heart_rate", session(&["avg_heart_rate"]).map(|b| format!("{:.0} bpm", b)));
        put("max_heart_rate", session(&["max_heart_rate"]).map(|b| format!("{:.0} bpm", b)));
        put("avg_cadence", session(&["avg_cadence"]).map(|c| format!("{:.0} rpm", c)));
        put("temperature", Self::temperature(summary));

        let entries = HEADLINE_FIELDS
            .iter()
            .filter_map(|f| values.remove(f.key).map(|v| (f.key, v)))
            .collect();
        Self { entries }
    }

    fn temperature(summary: &TelemetrySummary) -> Option<String> {
        if let Some(record) = summary.get("record", "temperature") {
            if let (Some(min), Some(max), Some(avg)) = (record.min, record.max, record.average()) {
                return Some(format!("min={:.0}, max={:.0}, avg={:.1} °C", min, max, avg));
            }
        }

        let parts: Vec<String> = [("min", "min_temperature"), ("max", "max_temperature"), ("avg", "avg_temperature")]
            .iter()
            .filter_map(|(label, field)| {
                summary
                    .get("session", field)
                    .and_then(FieldSummary::last_number)
                    .map(|v| format!("{}={:.0}", label, v))
            })
            .collect();

        (!parts.is_empty()).then(|| format!("{} °C", parts.join(", ")))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(key, value)` pairs in display order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// "Label: value" lines for the report header.
    pub fn lines(&self, language: Language) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                let field = HEADLINE_FIELDS.iter().find(|f| f.key == *key)?;
                let label = match language {
                    Language::German => field.de,
                    Language::English => field.en,
                };
                Some(format!("{}: {}", label, value))
            })
            .collect()
    }
}

impl Serialize for HeadlineSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
