//! # Acceptance Policy
//!
//! Decides whether an encoded candidate replaces the original.
//!
//! A candidate is accepted when it saves at least `min_savings_percent` of
//! the original size. The comparison is strict and done in integer arithmetic:
//! an output of exactly `original × (1 − p/100)` is rejected.
//!
//! Profiles that accept format conversion also keep a candidate that is only
//! marginally smaller when it moves the file to the canonical format. A
//! candidate that is not smaller than the original is never accepted.

use crate::encode::EncodeOutcome;
use crate::probe::ProbeResult;
use crate::profile::{lowercase_extension, MediaProfile};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    /// Saved at least the profile's minimum
    Compressed,
    /// Moved to the canonical format
    Converted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoImprovement,
    EncoderError,
}

/// Outcome of the acceptance policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Replace(ReplaceReason),
    Reject(RejectReason),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(ReplaceReason::Compressed) => f.write_str("compressed"),
            Self::Replace(ReplaceReason::Converted) => f.write_str("converted"),
            Self::Reject(RejectReason::NoImprovement) => f.write_str("no improvement"),
            Self::Reject(RejectReason::EncoderError) => f.write_str("encoder error"),
        }
    }
}

/// Judge an encode outcome against the original size.
pub fn accept(original_size: u64, outcome: &EncodeOutcome, profile: &MediaProfile, is_format_conversion: bool) -> Verdict {
    let output_size = match outcome {
        EncodeOutcome::Encoded { size, .. } => *size,
        EncodeOutcome::Failed { .. } => return Verdict::Reject(RejectReason::EncoderError),
    };

    if meets_savings(original_size, output_size, profile.min_savings_percent) {
        return Verdict::Replace(ReplaceReason::Compressed);
    }

    if profile.accept_format_conversion && is_format_conversion && output_size < original_size {
        return Verdict::Replace(ReplaceReason::Converted);
    }

    Verdict::Reject(RejectReason::NoImprovement)
}

/// `output < original × (1 − percent/100)`, without floating point
pub fn meets_savings(original_size: u64, output_size: u64, percent: u32) -> bool {
    let percent = u128::from(percent.min(100));
    u128::from(output_size) * 100 < u128::from(original_size) * (100 - percent)
}

/// Whether re-encoding `path` moves it to the profile's canonical format.
///
/// True when the extension differs from the canonical one, or the probed
/// codec is known and differs from the target codec.
pub fn is_format_conversion(path: &Path, probe: Option<&ProbeResult>, profile: &MediaProfile) -> bool {
    let extension_changes = match &profile.canonical_extension {
        Some(canonical) => lowercase_extension(path).as_deref() != Some(canonical.as_str()),
        None => false,
    };

    let codec_changes = match (&profile.target_codec, probe.and_then(|p| p.codec.as_deref())) {
        (Some(target), Some(codec)) => codec != target,
        _ => false,
    };

    extension_changes || codec_changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::new_temp_output;
    use tempfile::TempDir;

    fn encoded(dir: &TempDir, size: u64) -> EncodeOutcome {
        let output = new_temp_output(dir.path(), "bin").unwrap();
        EncodeOutcome::Encoded { output, size }
    }

    #[test]
    fn test_threshold_boundary() {
        let dir = TempDir::new().unwrap();
        let profile = MediaProfile::default_image();

        // 3% of 1000 → exactly 970 is not enough
        assert_eq!(
            accept(1000, &encoded(&dir, 970), &profile, false),
            Verdict::Reject(RejectReason::NoImprovement)
        );
        assert_eq!(
            accept(1000, &encoded(&dir, 969), &profile, false),
            Verdict::Replace(ReplaceReason::Compressed)
        );
    }

    #[test]
    fn test_failed_encode_is_encoder_error() {
        let outcome = EncodeOutcome::Failed {
            reason: "Invalid data found when processing input".into(),
        };
        let verdict = accept(1000, &outcome, &MediaProfile::default_audio(), true);
        assert_eq!(verdict, Verdict::Reject(RejectReason::EncoderError));
    }

    #[test]
    fn test_conversion_carve_out() {
        let dir = TempDir::new().unwrap();
        let audio = MediaProfile::default_audio();

        // 2% smaller, under the 5% minimum, but it turns a wav into mp3
        assert_eq!(
            accept(1000, &encoded(&dir, 980), &audio, true),
            Verdict::Replace(ReplaceReason::Converted)
        );
        assert_eq!(
            accept(1000, &encoded(&dir, 980), &audio, false),
            Verdict::Reject(RejectReason::NoImprovement)
        );
        // never grows, even when converting
        assert_eq!(
            accept(1000, &encoded(&dir, 1000), &audio, true),
            Verdict::Reject(RejectReason::NoImprovement)
        );
    }

    #[test]
    fn test_conversion_requires_profile_opt_in() {
        let dir = TempDir::new().unwrap();
        let image = MediaProfile::default_image();
        assert_eq!(
            accept(1000, &encoded(&dir, 990), &image, true),
            Verdict::Reject(RejectReason::NoImprovement)
        );
    }

    #[test]
    fn test_meets_savings_edges() {
        assert!(!meets_savings(0, 0, 3));
        assert!(meets_savings(100, 99, 0));
        assert!(!meets_savings(100, 100, 0));
        assert!(!meets_savings(u64::MAX, u64::MAX - 1, 1));
    }

    #[test]
    fn test_is_format_conversion() {
        let audio = MediaProfile::default_audio();
        assert!(is_format_conversion(Path::new("a/song.wav"), None, &audio));
        assert!(!is_format_conversion(Path::new("a/song.MP3"), None, &audio));

        let vorbis_in_mp3 = ProbeResult {
            codec: Some("vorbis".into()),
            ..Default::default()
        };
        assert!(is_format_conversion(Path::new("a/song.mp3"), Some(&vorbis_in_mp3), &audio));

        let image = MediaProfile::default_image();
        assert!(!is_format_conversion(Path::new("a/photo.png"), None, &image));
    }
}
