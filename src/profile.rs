//! # Media Profiles
//!
//! One immutable [`MediaProfile`] per media kind describes the target encoding
//! and the thresholds used to decide whether a file is already normalized.
//! Profiles are built once at startup (defaults or config file), validated,
//! and then only ever borrowed.
//!
//! Default values:
//!
//! | kind  | target                      | floor  | savings | canonical |
//! |-------|-----------------------------|--------|---------|-----------|
//! | image | `-q:v 10`, PNG level 9      | 500 KB | 3 %     | source    |
//! | audio | 64 kbit/s, 60 s, 3 s fades  | none   | 5 %     | `.mp3`    |
//! | video | libx264 CRF 23, 1920x1080   | none   | 10 %    | `.mp4`    |

use crate::error::OptimizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Media class handled by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Audio, MediaKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// True when either side is more than 10% over `max`.
    pub fn exceeds(&self, max: &Resolution) -> bool {
        let over = |value: u32, limit: u32| limit > 0 && f64::from(value) > f64::from(limit) * 1.1;
        over(self.width, max.width) || over(self.height, max.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// "Already well compressed" heuristic.
///
/// For images the density is bytes per pixel, for video bytes per pixel per
/// second. The thresholds are empirical and should be treated as tunable
/// policy; they are not derived from any codec property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRule {
    pub max_density: f64,
    /// Pixel formats the rule applies to. Empty means any.
    #[serde(default)]
    pub pixel_formats: Vec<String>,
}

impl DensityRule {
    pub fn applies_to(&self, pixel_format: Option<&str>) -> bool {
        if self.pixel_formats.is_empty() {
            return true;
        }
        pixel_format.map_or(false, |fmt| self.pixel_formats.iter().any(|p| p == fmt))
    }
}

/// Kind-specific encoder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EncodeTarget {
    Image {
        /// ffmpeg `-q:v`, 2 = best, 31 = worst
        jpeg_quality: u8,
        /// ffmpeg PNG `-compression_level`, 0-9
        png_compression_level: u8,
    },
    Audio {
        bitrate: String,
    },
    Video {
        codec: String,
        crf: u8,
        preset: String,
        fps: Option<u32>,
        audio_bitrate: String,
    },
}

/// Immutable per-kind configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProfile {
    pub kind: MediaKind,
    /// Lowercase extensions picked up by the directory scan
    pub extensions: Vec<String>,
    /// Scan roots, relative to the site root
    pub roots: Vec<PathBuf>,
    pub target: EncodeTarget,
    /// Codec name as reported by ffprobe for already-normalized files
    pub target_codec: Option<String>,
    /// Extension every output is renamed to. `None` keeps the source extension.
    pub canonical_extension: Option<String>,
    pub max_resolution: Option<Resolution>,
    pub max_duration_secs: Option<f64>,
    #[serde(default)]
    pub fade_in_secs: f64,
    #[serde(default)]
    pub fade_out_secs: f64,
    pub min_savings_percent: u32,
    pub tolerance_percent: u32,
    pub min_file_size: Option<u64>,
    pub density: Option<DensityRule>,
    /// Accept a smaller output even below `min_savings_percent` when it
    /// converts the file to the canonical format.
    pub accept_format_conversion: bool,
}

impl MediaProfile {
    pub fn default_image() -> Self {
        Self {
            kind: MediaKind::Image,
            extensions: exts(&["jpg", "jpeg", "png"]),
            roots: paths(&["src/resources/images", "src/blogs", "src/bio", "src/poems"]),
            target: EncodeTarget::Image {
                jpeg_quality: 10,
                png_compression_level: 9,
            },
            target_codec: None,
            canonical_extension: None,
            max_resolution: None,
            max_duration_secs: None,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            min_savings_percent: 3,
            tolerance_percent: 2,
            min_file_size: Some(500 * 1024),
            density: Some(DensityRule {
                max_density: 0.3,
                pixel_formats: vec!["yuvj420p".to_string(), "yuv420p".to_string()],
            }),
            accept_format_conversion: false,
        }
    }

    pub fn default_audio() -> Self {
        Self {
            kind: MediaKind::Audio,
            extensions: exts(&["mp3", "wav", "ogg", "flac", "m4a", "aac"]),
            roots: paths(&["src/poems", "src/bio", "src/resources/audio", "src/blogs"]),
            target: EncodeTarget::Audio {
                bitrate: "64k".to_string(),
            },
            target_codec: Some("mp3".to_string()),
            canonical_extension: Some("mp3".to_string()),
            max_resolution: None,
            max_duration_secs: Some(60.0),
            fade_in_secs: 3.0,
            fade_out_secs: 3.0,
            min_savings_percent: 5,
            tolerance_percent: 10,
            min_file_size: None,
            density: None,
            accept_format_conversion: true,
        }
    }

    pub fn default_video() -> Self {
        Self {
            kind: MediaKind::Video,
            extensions: exts(&["mp4", "avi", "mov", "webm", "mkv", "flv", "wmv"]),
            roots: paths(&["src/blogs", "src/resources", "src/bio"]),
            target: EncodeTarget::Video {
                codec: "libx264".to_string(),
                crf: 23,
                preset: "medium".to_string(),
                fps: Some(30),
                audio_bitrate: "128k".to_string(),
            },
            target_codec: Some("h264".to_string()),
            canonical_extension: Some("mp4".to_string()),
            max_resolution: Some(Resolution::new(1920, 1080)),
            max_duration_secs: None,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            min_savings_percent: 10,
            tolerance_percent: 10,
            min_file_size: None,
            density: Some(DensityRule {
                max_density: 0.03,
                pixel_formats: Vec::new(),
            }),
            accept_format_conversion: true,
        }
    }

    /// Default profile for a kind
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::default_image(),
            MediaKind::Audio => Self::default_audio(),
            MediaKind::Video => Self::default_video(),
        }
    }

    /// Target bitrate in bits per second, for profiles that have one.
    pub fn target_bitrate(&self) -> Option<u64> {
        match &self.target {
            EncodeTarget::Audio { bitrate } => parse_bitrate(bitrate).ok(),
            _ => None,
        }
    }

    /// Whether the scan should pick up `path` for this profile
    pub fn matches_extension(&self, path: &Path) -> bool {
        lowercase_extension(path).map_or(false, |ext| self.extensions.iter().any(|e| *e == ext))
    }

    pub fn is_below_floor(&self, size: u64) -> bool {
        self.min_file_size.map_or(false, |floor| size < floor)
    }

    /// Extension the output of `source` is written with
    pub fn output_extension(&self, source: &Path) -> String {
        match &self.canonical_extension {
            Some(ext) => ext.clone(),
            None => lowercase_extension(source).unwrap_or_else(|| "bin".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), OptimizeError> {
        let fail = |msg: String| Err(OptimizeError::Validation(format!("{} profile: {}", self.kind, msg)));

        if self.extensions.is_empty() {
            return fail("extension list is empty".to_string());
        }
        if self.min_savings_percent >= 100 {
            return fail("min_savings_percent must be below 100".to_string());
        }
        if self.fade_in_secs < 0.0 || self.fade_out_secs < 0.0 {
            return fail("fade durations cannot be negative".to_string());
        }
        if let Some(max) = self.max_duration_secs {
            if max <= 0.0 {
                return fail("max_duration_secs must be positive".to_string());
            }
        }
        if let Some(rule) = &self.density {
            if rule.max_density <= 0.0 {
                return fail("density threshold must be positive".to_string());
            }
        }

        match (&self.target, self.kind) {
            (EncodeTarget::Image { jpeg_quality, png_compression_level }, MediaKind::Image) => {
                if !(2..=31).contains(jpeg_quality) {
                    return fail("jpeg_quality must be between 2 and 31".to_string());
                }
                if *png_compression_level > 9 {
                    return fail("png_compression_level must be between 0 and 9".to_string());
                }
            }
            (EncodeTarget::Audio { bitrate }, MediaKind::Audio) => {
                parse_bitrate(bitrate)?;
            }
            (EncodeTarget::Video { crf, audio_bitrate, codec, .. }, MediaKind::Video) => {
                if *crf > 51 {
                    return fail("crf must be between 0 and 51".to_string());
                }
                if codec.is_empty() {
                    return fail("codec cannot be empty".to_string());
                }
                parse_bitrate(audio_bitrate)?;
            }
            _ => return fail("encode target does not match profile kind".to_string()),
        }

        Ok(())
    }
}

/// Parse an ffmpeg-style bitrate (`64k`, `2M`, `128000`) into bits per second.
pub fn parse_bitrate(value: &str) -> Result<u64, OptimizeError> {
    let lower = value.trim().to_lowercase();
    let (digits, multiplier) = if let Some(rest) = lower.strip_suffix('k') {
        (rest, 1_000)
    } else if let Some(rest) = lower.strip_suffix('m') {
        (rest, 1_000_000)
    } else {
        (lower.as_str(), 1)
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| OptimizeError::Validation(format!("invalid bitrate: {:?}", value)))
}

/// Lowercased extension without the dot
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

fn exts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bitrate() {
        assert_eq!(parse_bitrate("64k").unwrap(), 64_000);
        assert_eq!(parse_bitrate("2M").unwrap(), 2_000_000);
        assert_eq!(parse_bitrate("128000").unwrap(), 128_000);
        assert!(parse_bitrate("fast").is_err());
        assert!(parse_bitrate("").is_err());
        assert!(matches!(
            parse_bitrate("18446744073709552k"),
            Err(OptimizeError::Validation(_))
        ));
        assert_eq!(parse_bitrate("18446744073709551k").unwrap(), 18_446_744_073_709_551_000);
    }

    #[test]
    fn test_defaults_validate() {
        for kind in MediaKind::ALL {
            let profile = MediaProfile::default_for(kind);
            assert_eq!(profile.kind, kind);
            assert!(profile.validate().is_ok(), "{} default should validate", kind);
        }
    }

    #[test]
    fn test_mismatched_target_rejected() {
        let mut profile = MediaProfile::default_audio();
        profile.target = EncodeTarget::Image {
            jpeg_quality: 10,
            png_compression_level: 9,
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_savings_bounds() {
        let mut profile = MediaProfile::default_image();
        profile.min_savings_percent = 100;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let profile = MediaProfile::default_image();
        assert!(profile.matches_extension(Path::new("a/B.JPG")));
        assert!(profile.matches_extension(Path::new("c.png")));
        assert!(!profile.matches_extension(Path::new("d.webp")));
        assert!(!profile.matches_extension(Path::new("noext")));
    }

    #[test]
    fn test_output_extension() {
        let image = MediaProfile::default_image();
        assert_eq!(image.output_extension(Path::new("x.JPEG")), "jpeg");
        let audio = MediaProfile::default_audio();
        assert_eq!(audio.output_extension(Path::new("x.wav")), "mp3");
    }

    #[test]
    fn test_resolution_exceeds_with_margin() {
        let max = Resolution::new(1920, 1080);
        assert!(!Resolution::new(2000, 1080).exceeds(&max));
        assert!(Resolution::new(2200, 1080).exceeds(&max));
        assert!(Resolution::new(1920, 1200).exceeds(&max));
    }

    #[test]
    fn test_density_rule_formats() {
        let rule = DensityRule {
            max_density: 0.3,
            pixel_formats: vec!["yuvj420p".into()],
        };
        assert!(rule.applies_to(Some("yuvj420p")));
        assert!(!rule.applies_to(Some("rgb24")));
        assert!(!rule.applies_to(None));

        let any = DensityRule {
            max_density: 0.03,
            pixel_formats: Vec::new(),
        };
        assert!(any.applies_to(None));
    }
}
