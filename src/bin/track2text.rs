//! track2text: write a route description draft for a GPX or FIT track.
//!
//! Reads the given file, or the newest `.gpx`/`.fit` in the inbox directory,
//! and writes `<stem>.txt` next to it.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueHint};
use log::{info, warn};

use track_narrator::reader::{newest_track, read_track};
use track_narrator::{
    describe_track, Bounds, Geocoder, GeocoderConfig, GeocoderKind, Language, NarrativeConfig,
    Precision, RouteReport,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn a GPS track into a route description draft", long_about = None)]
struct Cli {
    /// Track file (.gpx or .fit). Defaults to the newest file in --inbox.
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Directory searched when no input file is given
    #[arg(long, default_value = "inbox", value_hint = ValueHint::DirPath)]
    inbox: PathBuf,

    /// Also write the report as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    json: Option<PathBuf>,

    /// Upper bound on geocoded samples
    #[arg(long, env = "TRACK2TEXT_MAX_SAMPLES", default_value_t = 200)]
    max_samples: usize,

    /// Initial minimum distance between samples in meters (grows until the cap is met)
    #[arg(long, env = "TRACK2TEXT_MIN_SPACING_M", default_value_t = 50.0)]
    min_spacing: f64,

    /// Section marker spacing in km (0 disables)
    #[arg(long, env = "TRACK2TEXT_SECTION_KM", default_value_t = 3.0)]
    section_km: f64,

    /// Zoom for locality refinement lookups (0 disables)
    #[arg(long, env = "TRACK2TEXT_LOCALITY_ZOOM", default_value_t = 12)]
    locality_zoom: u8,

    /// Emit start and finish lines
    #[arg(
        long,
        env = "TRACK2TEXT_INCLUDE_START_GOAL",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    include_start_goal: bool,

    /// Provider for per-sample lookups (nominatim or photon)
    #[arg(long, env = "TRACK2TEXT_GEOCODER", default_value = "nominatim")]
    geocoder: GeocoderKind,

    /// Provider for locality refinement lookups
    #[arg(long, env = "TRACK2TEXT_LOCALITY_GEOCODER", default_value = "photon")]
    locality_geocoder: GeocoderKind,

    #[arg(long, env = "NOMINATIM_USER_AGENT", default_value = track_narrator::geocode::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Output language (de or en)
    #[arg(long, env = "TRACK2TEXT_LANGUAGE", default_value = "de")]
    language: Language,

    /// Seconds between provider requests
    #[arg(long, default_value_t = 1.0)]
    request_interval: f64,

    /// Enable debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn narrative_config(&self) -> Result<NarrativeConfig> {
        if !(self.request_interval >= 0.0 && self.request_interval.is_finite()) {
            bail!("--request-interval must be a non-negative number of seconds");
        }
        if !(self.min_spacing > 0.0 && self.min_spacing.is_finite()) {
            bail!("--min-spacing must be a positive number of meters");
        }
        Ok(NarrativeConfig {
            max_samples: self.max_samples,
            min_spacing_m: self.min_spacing,
            section_length_m: self.section_km * 1000.0,
            locality_precision: (self.locality_zoom > 0).then_some(Precision(self.locality_zoom)),
            include_start_finish: self.include_start_goal,
            language: self.language,
            request_interval: Duration::from_secs_f64(self.request_interval),
            ..NarrativeConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = cli.narrative_config()?;

    let input = match &cli.input {
        Some(path) => path.clone(),
        None => newest_track(&cli.inbox)
            .with_context(|| format!("no input given and inbox {} unusable", cli.inbox.display()))?,
    };

    let track = read_track(&input).with_context(|| format!("failed to read {}", input.display()))?;
    let Some(bounds) = Bounds::from_points(&track.points) else {
        bail!("no track or route points found in {}", input.display());
    };
    let center = bounds.center();
    info!(
        "[track2text] {} points around ({:.4}, {:.4})",
        track.points.len(),
        center.latitude,
        center.longitude
    );

    let geocoder_config = GeocoderConfig {
        user_agent: cli.user_agent.clone(),
        ..GeocoderConfig::default()
    };
    let point_geocoder = Geocoder::new(cli.geocoder, &geocoder_config)?;
    let locality_geocoder = Geocoder::new(cli.locality_geocoder, &geocoder_config)?;
    info!(
        "[track2text] {} -> geocoder {}, locality geocoder {}",
        input.display(),
        point_geocoder.kind(),
        locality_geocoder.kind()
    );

    let narrative = describe_track(&track.points, &config, &point_geocoder, &locality_geocoder).await?;
    let failures = narrative
        .events
        .iter()
        .filter(|e| matches!(e, track_narrator::NarrativeEvent::LookupFailed { .. }))
        .count();
    if failures > 0 {
        warn!("[track2text] {} of {} lookups failed", failures, narrative.sample_count);
    }

    let source = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let report = RouteReport::new(&source, &track.points, &narrative, &track.telemetry, config.language);

    let out_path = input.with_extension("txt");
    fs::write(&out_path, report.render_text())
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    if let Some(json_path) = &cli.json {
        fs::write(json_path, report.to_json()?)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        info!("[track2text] JSON written to {}", json_path.display());
    }

    println!("{}", out_path.display());
    Ok(())
}
