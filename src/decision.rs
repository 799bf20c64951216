//! # Decision Policy
//!
//! Decides, before any encoding happens, whether a file is worth touching.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. below the profile's size floor → [`Decision::TooSmall`]
//! 2. probe unknown → [`Decision::NeedsWork`]
//! 3. codec missing or different from the target codec → `NeedsWork`
//! 4. resolution more than 10% over the cap → `NeedsWork`
//! 5. bitrate at or under target (plus tolerance) and duration within the
//!    limit → [`Decision::AlreadyOptimal`]
//! 6. density heuristic under threshold → `AlreadyOptimal`
//! 7. otherwise `NeedsWork`
//!
//! Explicit codec and size signals dominate; the density heuristic is only a
//! fallback for when direct metadata is inconclusive.

use crate::probe::ProbeResult;
use crate::profile::{MediaKind, MediaProfile};
use std::fmt;
use tracing::debug;

/// Slack allowed on the duration limit, in seconds
const DURATION_SLACK_SECS: f64 = 1.0;

/// Outcome of the decision policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AlreadyOptimal,
    TooSmall,
    NeedsWork,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyOptimal => f.write_str("already optimized"),
            Self::TooSmall => f.write_str("too small"),
            Self::NeedsWork => f.write_str("needs work"),
        }
    }
}

/// Decide whether a file of `original_size` bytes needs re-encoding.
pub fn decide(original_size: u64, probe: Option<&ProbeResult>, profile: &MediaProfile) -> Decision {
    if profile.is_below_floor(original_size) {
        return Decision::TooSmall;
    }

    let Some(info) = probe else {
        debug!("Probe unknown, assuming work is needed");
        return Decision::NeedsWork;
    };

    if let Some(target) = &profile.target_codec {
        if info.codec.as_deref() != Some(target.as_str()) {
            debug!("Codec {:?} is not {}", info.codec, target);
            return Decision::NeedsWork;
        }
    }

    if let (Some(max), Some(resolution)) = (&profile.max_resolution, &info.resolution) {
        if resolution.exceeds(max) {
            debug!("Resolution {} exceeds {}", resolution, max);
            return Decision::NeedsWork;
        }
    }

    if let (Some(target_bps), Some(bitrate)) = (profile.target_bitrate(), info.bitrate) {
        let within_bitrate =
            u128::from(bitrate) * 100 <= u128::from(target_bps) * u128::from(100 + profile.tolerance_percent);
        if within_bitrate && duration_within_limit(info.duration, profile.max_duration_secs) {
            return Decision::AlreadyOptimal;
        }
    }

    if let Some(density) = density(original_size, info, profile.kind) {
        if let Some(rule) = &profile.density {
            if rule.applies_to(info.pixel_format.as_deref()) && density < rule.max_density {
                debug!("Density {:.4} under {}", density, rule.max_density);
                return Decision::AlreadyOptimal;
            }
        }
    }

    Decision::NeedsWork
}

fn duration_within_limit(duration: Option<f64>, limit: Option<f64>) -> bool {
    match limit {
        None => true,
        Some(max) => duration.map_or(false, |d| d <= max + DURATION_SLACK_SECS),
    }
}

/// Bytes per pixel (image) or bytes per pixel per second (video).
///
/// `None` whenever an input is unknown or zero; audio has no density.
pub fn density(size: u64, info: &ProbeResult, kind: MediaKind) -> Option<f64> {
    let pixels = info.resolution?.pixels();
    if pixels == 0 {
        return None;
    }

    match kind {
        MediaKind::Image => Some(size as f64 / pixels as f64),
        MediaKind::Video => {
            let duration = info.duration.filter(|d| *d > 0.0)?;
            Some(size as f64 / (pixels as f64 * duration))
        }
        MediaKind::Audio => None,
    }
}
