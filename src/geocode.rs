//! Reverse geocoding against Nominatim or Photon.
//!
//! Both providers are normalized to one [`Address`] schema keyed by the
//! Nominatim address vocabulary. The gateway itself is stateless: it makes
//! exactly one request per call, never retries, and never falls back to the
//! other provider. Pacing between requests is the caller's job, see
//! [`RequestPacer`].

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::GeocodeError;
use crate::GpsPoint;

/// Address keys that name a road, in priority order.
pub const ROAD_KEYS: &[&str] = &[
    "road", "pedestrian", "cycleway", "path", "footway", "steps", "track", "bridleway",
];

/// Address keys that name a city-level place, in priority order.
pub const LOCALITY_KEYS: &[&str] = &["city", "town", "village", "suburb", "hamlet", "municipality"];

/// Address keys that name a sub-city district, in priority order.
pub const DISTRICT_KEYS: &[&str] = &[
    "neighbourhood",
    "quarter",
    "locality",
    "borough",
    "city_district",
    "district",
    "municipality",
    "isolated_dwelling",
];

/// Photon property -> address key.
const PHOTON_FIELDS: &[(&str, &str)] = &[
    ("street", "road"),
    ("city", "city"),
    ("district", "district"),
    ("locality", "locality"),
    ("postcode", "postcode"),
    ("county", "county"),
    ("state", "state"),
    ("country", "country"),
];

pub const DEFAULT_USER_AGENT: &str = "track2text/1.0 (local script; contact: none)";
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const PHOTON_URL: &str = "https://photon.komoot.io";

// ============================================================================
// Address schema
// ============================================================================

/// How fine-grained the returned place should be, as a map zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precision(pub u8);

impl Precision {
    /// Road-level lookups.
    pub const STREET: Precision = Precision(18);
    /// Locality refinement lookups.
    pub const CITY: Precision = Precision(12);

    pub fn zoom(self) -> u8 {
        self.0
    }
}

/// Address components keyed by the Nominatim address vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(BTreeMap<String, String>);

impl Address {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First value present among `keys`, checked in order.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn road(&self) -> Option<&str> {
        self.first_of(ROAD_KEYS)
    }

    pub fn locality(&self) -> Option<&str> {
        self.first_of(LOCALITY_KEYS)
    }

    pub fn district(&self) -> Option<&str> {
        self.first_of(DISTRICT_KEYS)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Address {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Road, locality and district picked from one address.
///
/// Each category is picked independently; a missing road does not block the
/// locality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPicks {
    pub road: Option<String>,
    pub locality: Option<String>,
    pub district: Option<String>,
}

impl From<&Address> for AddressPicks {
    fn from(address: &Address) -> Self {
        Self {
            road: address.road().map(str::to_string),
            locality: address.locality().map(str::to_string),
            district: address.district().map(str::to_string),
        }
    }
}

/// Normalized response of one reverse lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub address: Address,
    pub name: Option<String>,
    pub category: Option<String>,
}

impl GeocodeResult {
    pub fn picks(&self) -> AddressPicks {
        AddressPicks::from(&self.address)
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Anything that can turn a coordinate into an address.
pub trait ReverseGeocoder {
    fn reverse(
        &self,
        point: &GpsPoint,
        precision: Precision,
    ) -> impl Future<Output = Result<GeocodeResult, GeocodeError>>;
}

/// Supported reverse-geocoding services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderKind {
    /// Address components come back in the target vocabulary.
    Nominatim,
    /// GeoJSON features whose properties are remapped.
    Photon,
}

impl FromStr for GeocoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominatim" => Ok(GeocoderKind::Nominatim),
            "photon" => Ok(GeocoderKind::Photon),
            other => Err(format!("unknown geocoder '{}' (expected nominatim or photon)", other)),
        }
    }
}

impl fmt::Display for GeocoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocoderKind::Nominatim => write!(f, "nominatim"),
            GeocoderKind::Photon => write!(f, "photon"),
        }
    }
}

/// Connection settings shared by both providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Sent as `User-Agent` on every request, as the public services require.
    pub user_agent: String,
    pub nominatim_url: String,
    pub photon_url: String,
    pub timeout: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nominatim_url: NOMINATIM_URL.to_string(),
            photon_url: PHOTON_URL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: BTreeMap<String, Value>,
    name: Option<String>,
    category: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotonResponse {
    #[serde(default)]
    features: Vec<PhotonFeature>,
}

#[derive(Debug, Deserialize)]
struct PhotonFeature {
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a Nominatim `jsonv2` reverse response.
///
/// A response without an address (e.g. `{"error": "Unable to geocode"}`)
/// yields an empty result.
pub fn parse_nominatim(body: &[u8]) -> Result<GeocodeResult, GeocodeError> {
    let data: NominatimResponse = serde_json::from_slice(body)?;
    if let Some(error) = &data.error {
        debug!("[Nominatim] No address: {}", error);
    }

    let address = data
        .address
        .iter()
        .filter_map(|(k, v)| value_to_string(v).map(|v| (k.clone(), v)))
        .collect();

    Ok(GeocodeResult {
        address,
        name: data.name.filter(|n| !n.is_empty()),
        category: data.category,
    })
}

/// Parse a Photon reverse response, remapping the first feature.
///
/// An empty feature list yields an empty result.
pub fn parse_photon(body: &[u8]) -> Result<GeocodeResult, GeocodeError> {
    let data: PhotonResponse = serde_json::from_slice(body)?;
    let Some(feature) = data.features.into_iter().next() else {
        return Ok(GeocodeResult::default());
    };

    let props = &feature.properties;
    let address = PHOTON_FIELDS
        .iter()
        .filter_map(|(from, to)| props.get(*from).and_then(value_to_string).map(|v| (*to, v)))
        .collect();

    Ok(GeocodeResult {
        address,
        name: props.get("name").and_then(value_to_string),
        category: props.get("osm_key").and_then(value_to_string),
    })
}

/// HTTP reverse geocoder for one provider, chosen at construction.
#[cfg(feature = "http")]
pub struct Geocoder {
    kind: GeocoderKind,
    client: reqwest::Client,
    config: GeocoderConfig,
}

#[cfg(feature = "http")]
impl Geocoder {
    pub fn new(kind: GeocoderKind, config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            kind,
            client,
            config: config.clone(),
        })
    }

    pub fn kind(&self) -> GeocoderKind {
        self.kind
    }

    /// Look up one point. Exactly one request, no retry.
    pub async fn lookup(
        &self,
        point: &GpsPoint,
        precision: Precision,
    ) -> Result<GeocodeResult, GeocodeError> {
        let lat = format!("{:.7}", point.latitude);
        let lon = format!("{:.7}", point.longitude);

        match self.kind {
            GeocoderKind::Nominatim => {
                let url = format!("{}/reverse", self.config.nominatim_url.trim_end_matches('/'));
                let zoom = precision.zoom().to_string();
                let body = self
                    .fetch(
                        &url,
                        &[
                            ("format", "jsonv2"),
                            ("lat", &lat),
                            ("lon", &lon),
                            ("zoom", &zoom),
                            ("addressdetails", "1"),
                            ("extratags", "1"),
                            ("namedetails", "1"),
                        ],
                    )
                    .await?;
                parse_nominatim(&body)
            }
            GeocoderKind::Photon => {
                // Photon has no zoom parameter; it always answers with the nearest feature
                let url = format!("{}/reverse", self.config.photon_url.trim_end_matches('/'));
                let body = self.fetch(&url, &[("lat", &lat), ("lon", &lon)]).await?;
                parse_photon(&body)
            }
        }
    }

    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, GeocodeError> {
        let req_start = Instant::now();

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.config.user_agent.as_str())
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await?;
        debug!(
            "[{}] {} -> {} bytes in {:?}",
            self.kind,
            url,
            bytes.len(),
            req_start.elapsed()
        );

        Ok(bytes.to_vec())
    }
}

#[cfg(feature = "http")]
impl ReverseGeocoder for Geocoder {
    async fn reverse(
        &self,
        point: &GpsPoint,
        precision: Precision,
    ) -> Result<GeocodeResult, GeocodeError> {
        self.lookup(point, precision).await
    }
}

// ============================================================================
// Pacing
// ============================================================================

/// Spaces out when requests START.
///
/// Each call to [`wait_for_slot`](RequestPacer::wait_for_slot) reserves the
/// next slot `interval` after the previous one and sleeps until it opens. The
/// first slot opens immediately.
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    next_dispatch: Option<Instant>,
    dispatched_count: u32,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: None,
            dispatched_count: 0,
        }
    }

    /// Wait for our dispatch slot. Returns the 1-based request number.
    pub async fn wait_for_slot(&mut self) -> u32 {
        let now = Instant::now();
        let dispatch_at = match self.next_dispatch {
            Some(next) if next > now => next,
            _ => now,
        };

        self.next_dispatch = Some(dispatch_at + self.interval);
        self.dispatched_count += 1;

        let wait = dispatch_at.saturating_duration_since(now);
        if !wait.is_zero() {
            debug!("[Pacer #{}] Waiting {:?} for slot", self.dispatched_count, wait);
            tokio::time::sleep(wait).await;
        }

        self.dispatched_count
    }

    pub fn dispatched_count(&self) -> u32 {
        self.dispatched_count
    }
}
