//! Adaptive spatial downsampling.
//!
//! Thins a dense track to a bounded number of representative points by greedy
//! minimum-spacing filtering. When a pass keeps too many points the spacing is
//! multiplied by [`SPACING_GROWTH`] and the *original* track is scanned again,
//! so the kept set is always the current spacing applied to the raw input.
//!
//! This bounds the number of reverse-geocoding calls a narrative run makes; it
//! is not a shape-preserving simplification like Douglas-Peucker.

use log::{debug, info};
use crate::geo_utils::haversine_distance;
use crate::GpsPoint;

/// Factor applied to the spacing after a pass that exceeded the cap.
pub const SPACING_GROWTH: f64 = 1.5;

/// Keep every point at least `min_spacing_m` away from the previously kept one.
///
/// The first point is always kept. The last point is appended if the scan
/// dropped it, so the result always ends with a point equal to the input's
/// last point. Returns an empty vector for empty input.
///
/// # Example
/// ```
/// use track_narrator::{GpsPoint, downsample};
///
/// let track = vec![
///     GpsPoint::new(0.0, 0.0),
///     GpsPoint::new(0.0001, 0.0), // ~11m from the first point
///     GpsPoint::new(0.001, 0.0),  // ~111m from the first point
/// ];
///
/// let kept = downsample(&track, 50.0);
/// assert_eq!(kept, vec![track[0], track[2]]);
/// ```
pub fn downsample(points: &[GpsPoint], min_spacing_m: f64) -> Vec<GpsPoint> {
    let Some((&first, rest)) = points.split_first() else {
        return Vec::new();
    };

    let mut kept = vec![first];
    let mut last = first;
    for &p in rest {
        if haversine_distance(&last, &p) >= min_spacing_m {
            kept.push(p);
            last = p;
        }
    }

    // Force the final point
    if let Some(&end) = points.last() {
        if kept.last() != Some(&end) {
            kept.push(end);
        }
    }

    kept
}

/// Downsample a track to at most `max_samples` points (best effort).
///
/// Starts at `min_spacing_m` and grows the spacing by [`SPACING_GROWTH`] until
/// the cap is met. Every pass rescans the full input.
///
/// The cap cannot always be met. The last pass is returned even if it is over
/// `max_samples` when no larger spacing can change the result: the pass kept
/// only the first and the forced last point (e.g. a cap of 1), or growing the
/// spacing does not increase it (zero, negative, infinite or NaN spacing).
pub fn sample_points(points: &[GpsPoint], max_samples: usize, min_spacing_m: f64) -> Vec<GpsPoint> {
    let mut spacing = min_spacing_m;
    let mut sampled = downsample(points, spacing);
    let mut passes = 1u32;

    while sampled.len() > max_samples {
        let grown = spacing * SPACING_GROWTH;
        if sampled.len() <= 2 || grown.is_nan() || grown <= spacing {
            debug!(
                "[Sampling] Fixed point reached at {} samples (cap {}), spacing {:.1}m",
                sampled.len(), max_samples, spacing
            );
            break;
        }
        spacing = grown;
        sampled = downsample(points, spacing);
        passes += 1;
    }

    info!(
        "[Sampling] {} points -> {} samples (spacing {:.1}m after {} passes)",
        points.len(), sampled.len(), spacing, passes
    );

    sampled
}
