//! # Probe Adapter
//!
//! Reads the current properties of a media file through `ffprobe`.
//!
//! Probing is never fatal: a missing tool, a non-zero exit, malformed JSON or
//! a timeout all collapse into `None` ("unknown"), which the decision policy
//! treats as "cannot verify, assume it needs work". Individual fields follow
//! the same rule, so an absent or `N/A` value stays `None` instead of zero.

use crate::error::OptimizeError;
use crate::profile::{MediaKind, Resolution};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Properties reported for a media file. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    /// Bits per second
    pub bitrate: Option<u64>,
    /// Seconds
    pub duration: Option<f64>,
    pub resolution: Option<Resolution>,
    pub codec: Option<String>,
    pub pixel_format: Option<String>,
    pub frame_rate: Option<f64>,
}

impl ProbeResult {
    /// Short human readable summary for status lines
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(res) = self.resolution {
            parts.push(res.to_string());
        }
        if let Some(fps) = self.frame_rate {
            parts.push(format!("{:.1}fps", fps));
        }
        if let Some(codec) = &self.codec {
            parts.push(codec.clone());
        }
        if let Some(pix) = &self.pixel_format {
            parts.push(pix.clone());
        }
        if let Some(bitrate) = self.bitrate {
            parts.push(format!("{}kbps", bitrate / 1000));
        }
        if let Some(duration) = self.duration {
            parts.push(format!("{:.1}s", duration));
        }
        if parts.is_empty() {
            "unknown".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Source of media properties.
///
/// `None` means the file could not be probed.
#[allow(async_fn_in_trait)]
pub trait MediaProbe {
    async fn probe(&self, path: &Path, kind: MediaKind) -> Option<ProbeResult>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe: PathBuf, timeout: Duration) -> Self {
        Self { ffprobe, timeout }
    }

    async fn run(&self, path: &Path, kind: MediaKind) -> Result<ProbeResult, OptimizeError> {
        let unavailable = |reason: String| OptimizeError::ProbeUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(probe_args(kind))
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| unavailable(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| unavailable(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(unavailable(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(kind, &stdout).ok_or_else(|| unavailable("unrecognized ffprobe output".to_string()))
    }
}

impl MediaProbe for FfprobeProber {
    async fn probe(&self, path: &Path, kind: MediaKind) -> Option<ProbeResult> {
        match self.run(path, kind).await {
            Ok(result) => {
                debug!("Probed {}: {}", path.display(), result.summary());
                Some(result)
            }
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }
}

/// ffprobe arguments (without the input path) for a media kind
pub fn probe_args(kind: MediaKind) -> Vec<String> {
    let (stream, entries) = match kind {
        MediaKind::Image => ("v:0", "stream=width,height,pix_fmt"),
        MediaKind::Audio => ("a:0", "stream=bit_rate,duration,codec_name:format=duration,bit_rate"),
        MediaKind::Video => (
            "v:0",
            "stream=width,height,codec_name,bit_rate,r_frame_rate,pix_fmt:format=duration,size,bit_rate",
        ),
    };

    crate::args!["-v", "error", "-select_streams", stream, "-show_entries", entries, "-of", "json"]
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    codec_name: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Parse ffprobe JSON. Returns `None` when the output carries no usable data.
pub fn parse_probe_output(kind: MediaKind, json: &str) -> Option<ProbeResult> {
    let output: FfprobeOutput = serde_json::from_str(json).ok()?;
    let stream = output.streams.into_iter().next();

    if stream.is_none() && (kind == MediaKind::Image || output.format.is_none()) {
        return None;
    }

    let stream = stream.unwrap_or_default();
    let format = output.format.unwrap_or_default();

    let resolution = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(Resolution::new(w, h)),
        _ => None,
    };

    Some(ProbeResult {
        bitrate: parse_number::<u64>(stream.bit_rate.as_deref())
            .or_else(|| parse_number::<u64>(format.bit_rate.as_deref())),
        duration: parse_number::<f64>(stream.duration.as_deref())
            .or_else(|| parse_number::<f64>(format.duration.as_deref()))
            .filter(|d| d.is_finite() && *d > 0.0),
        resolution,
        codec: non_empty(stream.codec_name),
        pixel_format: non_empty(stream.pix_fmt),
        frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
    })
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse::<T>().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.parse().ok()?,
    };
    (fps > 0.0).then_some(fps)
}
