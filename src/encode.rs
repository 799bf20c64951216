//! # Encode Adapter
//!
//! Produces a re-encoded candidate for a media file with `ffmpeg`.
//!
//! The output is always written to a fresh temporary file next to the source
//! (same directory, so the later rename is atomic) and never to the final
//! path. The temp file is owned by a [`TempPath`]: if the encode fails, or
//! the candidate is rejected, dropping it removes the file.
//!
//! ## Argument sets
//!
//! | kind  | arguments                                                          |
//! |-------|--------------------------------------------------------------------|
//! | JPEG  | `-q:v Q -pix_fmt yuvj420p` + bt709 color tags                      |
//! | PNG   | `-compression_level L`                                             |
//! | audio | `-map 0:a -vn -b:a B [-t MAX] [-af afade=in,afade=out]`            |
//! | video | `-c:v C -crf N -preset P -pix_fmt yuv420p -vf scale,fps -c:a aac`  |

use crate::error::OptimizeError;
use crate::probe::ProbeResult;
use crate::profile::{EncodeTarget, MediaProfile, Resolution};
use crate::replace::TEMP_PREFIX;
use crate::utils::format_seconds;
use image::ImageFormat;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::debug;

/// Lines of ffmpeg stderr kept in a failure reason
const STDERR_TAIL_LINES: usize = 5;

/// Result of one encode attempt
#[derive(Debug)]
pub enum EncodeOutcome {
    /// Candidate written to a temp file in the source directory
    Encoded { output: TempPath, size: u64 },
    Failed { reason: String },
}

impl EncodeOutcome {
    /// Size of the candidate, `None` when the encode failed
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Encoded { size, .. } => Some(*size),
            Self::Failed { .. } => None,
        }
    }
}

/// Something that can re-encode a media file according to a profile.
#[allow(async_fn_in_trait)]
pub trait MediaEncoder {
    async fn encode(&self, input: &Path, profile: &MediaProfile, probe: Option<&ProbeResult>) -> EncodeOutcome;
}

/// [`MediaEncoder`] backed by the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: PathBuf, timeout: Option<Duration>) -> Self {
        Self { ffmpeg, timeout }
    }

    async fn run(
        &self,
        input: &Path,
        profile: &MediaProfile,
        probe: Option<&ProbeResult>,
    ) -> Result<(TempPath, u64), OptimizeError> {
        let dir = parent_dir(input);
        let output = new_temp_output(dir, &profile.output_extension(input))?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(build_args(input, &output, profile, probe))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Encoding {} -> {}", input.display(), output.display());
        let start_time = std::time::Instant::now();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| OptimizeError::Encode(format!("timed out after {:?}", limit)))?,
            None => cmd.output().await,
        };
        let result = result.map_err(|e| OptimizeError::Encode(format!("failed to run ffmpeg: {}", e)))?;

        if !result.status.success() {
            return Err(OptimizeError::Encode(stderr_tail(
                &String::from_utf8_lossy(&result.stderr),
                &result.status.to_string(),
            )));
        }

        let size = tokio::fs::metadata(&output).await?.len();
        if size == 0 {
            return Err(OptimizeError::Encode("ffmpeg produced an empty file".to_string()));
        }

        debug!(
            "Encoded {} in {:.1}s ({} bytes)",
            input.display(),
            start_time.elapsed().as_secs_f64(),
            size
        );
        Ok((output, size))
    }
}

impl MediaEncoder for FfmpegEncoder {
    async fn encode(&self, input: &Path, profile: &MediaProfile, probe: Option<&ProbeResult>) -> EncodeOutcome {
        match self.run(input, profile, probe).await {
            Ok((output, size)) => EncodeOutcome::Encoded { output, size },
            Err(OptimizeError::Encode(reason)) => EncodeOutcome::Failed { reason },
            Err(e) => EncodeOutcome::Failed { reason: e.to_string() },
        }
    }
}

/// Create an empty, uniquely named temp file in `dir` for an encoder to fill.
pub fn new_temp_output(dir: &Path, extension: &str) -> io::Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

/// Full ffmpeg argument list for encoding `input` into `output`.
pub fn build_args(input: &Path, output: &Path, profile: &MediaProfile, probe: Option<&ProbeResult>) -> Vec<String> {
    let mut args = crate::args!["-hide_banner", "-nostdin", "-loglevel", "error", "-i"];
    args.push(input.to_string_lossy().into_owned());

    match &profile.target {
        EncodeTarget::Image {
            jpeg_quality,
            png_compression_level,
        } => {
            if matches!(ImageFormat::from_path(input), Ok(ImageFormat::Png)) {
                args.extend(crate::args!["-compression_level", png_compression_level]);
            } else {
                args.extend(crate::args![
                    "-q:v",
                    jpeg_quality,
                    "-pix_fmt",
                    "yuvj420p",
                    "-color_primaries",
                    "bt709",
                    "-color_trc",
                    "bt709",
                    "-colorspace",
                    "bt709"
                ]);
            }
            if let Some(max) = &profile.max_resolution {
                args.extend(crate::args!["-vf", scale_filter(max, false)]);
            }
        }
        EncodeTarget::Audio { bitrate } => {
            args.extend(crate::args!["-map", "0:a", "-vn", "-b:a", bitrate]);
            if let Some(max) = profile.max_duration_secs {
                args.extend(crate::args!["-t", format_seconds(max)]);
            }
            let fades = fade_filter(profile, probe);
            if !fades.is_empty() {
                args.extend(crate::args!["-af", fades]);
            }
        }
        EncodeTarget::Video {
            codec,
            crf,
            preset,
            fps,
            audio_bitrate,
        } => {
            args.extend(crate::args![
                "-c:v",
                codec,
                "-crf",
                crf,
                "-preset",
                preset,
                "-pix_fmt",
                "yuv420p"
            ]);

            let mut filters = Vec::new();
            if let Some(max) = &profile.max_resolution {
                filters.push(scale_filter(max, true));
            }
            if let Some(fps) = fps {
                filters.push(format!("fps={}", fps));
            }
            if !filters.is_empty() {
                args.extend(crate::args!["-vf", filters.join(",")]);
            }

            args.extend(crate::args![
                "-c:a",
                "aac",
                "-b:a",
                audio_bitrate,
                "-map",
                "0:v:0",
                "-map",
                "0:a:0?",
                "-movflags",
                "+faststart"
            ]);
            if let Some(max) = profile.max_duration_secs {
                args.extend(crate::args!["-t", format_seconds(max)]);
            }
        }
    }

    args.push("-y".to_string());
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Downscale-only filter, never upscales and keeps the aspect ratio.
fn scale_filter(max: &Resolution, even_dimensions: bool) -> String {
    let mut filter = format!(
        "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
        max.width, max.height
    );
    if even_dimensions {
        filter.push_str(":force_divisible_by=2");
    }
    filter
}

/// `afade` chain for an audio profile.
///
/// The fade-out is anchored on the effective output length (probed duration
/// capped at the profile limit) and is left out when that length is unknown
/// or shorter than the fade itself.
fn fade_filter(profile: &MediaProfile, probe: Option<&ProbeResult>) -> String {
    let mut filters = Vec::new();

    if profile.fade_in_secs > 0.0 {
        filters.push(format!("afade=t=in:ss=0:d={}", format_seconds(profile.fade_in_secs)));
    }

    if profile.fade_out_secs > 0.0 {
        let effective = probe.and_then(|p| p.duration).map(|d| match profile.max_duration_secs {
            Some(max) => d.min(max),
            None => d,
        });
        match effective {
            Some(length) if length >= profile.fade_out_secs => filters.push(format!(
                "afade=t=out:st={}:d={}",
                format_seconds(length - profile.fade_out_secs),
                format_seconds(profile.fade_out_secs)
            )),
            _ => debug!("Skipping fade-out, output length unknown or too short"),
        }
    }

    filters.join(",")
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn stderr_tail(stderr: &str, status: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return format!("ffmpeg exited with {}", status);
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn joined(args: &[String]) -> String {
        args.join(" ")
    }

    fn with_duration(seconds: f64) -> ProbeResult {
        ProbeResult {
            duration: Some(seconds),
            ..Default::default()
        }
    }

    #[test]
    fn test_jpeg_args() {
        let profile = MediaProfile::default_image();
        let args = build_args(Path::new("/s/a.JPG"), Path::new("/s/.mn-tmp-x.jpg"), &profile, None);
        let line = joined(&args);
        assert!(line.starts_with("-hide_banner -nostdin -loglevel error -i /s/a.JPG"));
        assert!(line.contains("-q:v 10 -pix_fmt yuvj420p"));
        assert!(line.contains("-colorspace bt709"));
        assert!(line.ends_with("-y /s/.mn-tmp-x.jpg"));
        assert!(!line.contains("-vf"));
    }

    #[test]
    fn test_png_args() {
        let profile = MediaProfile::default_image();
        let args = build_args(Path::new("b.png"), Path::new("o.png"), &profile, None);
        let line = joined(&args);
        assert!(line.contains("-compression_level 9"));
        assert!(!line.contains("-q:v"));
    }

    #[test]
    fn test_image_scale_cap() {
        let mut profile = MediaProfile::default_image();
        profile.max_resolution = Some(Resolution::new(2560, 1440));
        let args = build_args(Path::new("a.jpg"), Path::new("o.jpg"), &profile, None);
        assert!(joined(&args).contains("-vf scale='min(2560,iw)':'min(1440,ih)':force_original_aspect_ratio=decrease"));
    }

    #[test]
    fn test_audio_args_with_fades() {
        let profile = MediaProfile::default_audio();
        let probe = with_duration(180.0);
        let args = build_args(Path::new("song.wav"), Path::new("o.mp3"), &profile, Some(&probe));
        let line = joined(&args);
        assert!(line.contains("-map 0:a -vn -b:a 64k -t 60"));
        assert!(line.contains("-af afade=t=in:ss=0:d=3,afade=t=out:st=57:d=3"));
    }

    #[test]
    fn test_fade_out_uses_probed_length_when_shorter() {
        let profile = MediaProfile::default_audio();
        let probe = with_duration(20.5);
        let args = build_args(Path::new("a.mp3"), Path::new("o.mp3"), &profile, Some(&probe));
        assert!(joined(&args).contains("afade=t=out:st=17.5:d=3"));
    }

    #[test]
    fn test_fade_out_omitted_when_unknown_or_too_short() {
        let profile = MediaProfile::default_audio();

        let line = joined(&build_args(Path::new("a.mp3"), Path::new("o.mp3"), &profile, None));
        assert!(line.contains("afade=t=in"));
        assert!(!line.contains("afade=t=out"));

        let probe = with_duration(2.0);
        let line = joined(&build_args(Path::new("a.mp3"), Path::new("o.mp3"), &profile, Some(&probe)));
        assert!(!line.contains("afade=t=out"));
    }

    #[test]
    fn test_audio_without_fades_has_no_filter() {
        let mut profile = MediaProfile::default_audio();
        profile.fade_in_secs = 0.0;
        profile.fade_out_secs = 0.0;
        let line = joined(&build_args(Path::new("a.mp3"), Path::new("o.mp3"), &profile, None));
        assert!(!line.contains("-af"));
    }

    #[test]
    fn test_video_args() {
        let profile = MediaProfile::default_video();
        let args = build_args(Path::new("clip.mov"), Path::new("o.mp4"), &profile, None);
        let line = joined(&args);
        assert!(line.contains("-c:v libx264 -crf 23 -preset medium -pix_fmt yuv420p"));
        assert!(line.contains(
            "-vf scale='min(1920,iw)':'min(1080,ih)':force_original_aspect_ratio=decrease:force_divisible_by=2,fps=30"
        ));
        assert!(line.contains("-c:a aac -b:a 128k -map 0:v:0 -map 0:a:0? -movflags +faststart"));
        assert!(!line.contains(" -t "));
    }

    #[test]
    fn test_temp_output_lives_next_to_source() {
        let dir = TempDir::new().unwrap();
        let temp = new_temp_output(dir.path(), "mp3").unwrap();
        let name = temp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_PREFIX));
        assert!(name.ends_with(".mp3"));
        assert_eq!(temp.parent(), Some(dir.path()));

        let path = temp.to_path_buf();
        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = "a\nb\n\nc\nd\ne\nf\n";
        assert_eq!(stderr_tail(stderr, "exit status: 1"), "b | c | d | e | f");
        assert_eq!(stderr_tail("  \n", "exit status: 1"), "ffmpeg exited with exit status: 1");
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_fails_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("song.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let encoder = FfmpegEncoder::new(PathBuf::from("/nonexistent/mn-ffmpeg"), None);
        let outcome = encoder.encode(&input, &MediaProfile::default_audio(), None).await;
        assert!(matches!(outcome, EncodeOutcome::Failed { .. }));
        assert_eq!(outcome.size(), None);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_ffmpeg_removes_partial_output() {
        use std::os::unix::fs::PermissionsExt;

        let tools = TempDir::new().unwrap();
        let fake = tools.path().join("ffmpeg");
        std::fs::write(
            &fake,
            "#!/bin/sh\nfor last; do :; done\nprintf 'partial' > \"$last\"\necho 'Error while encoding' >&2\necho 'boom' >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dir = TempDir::new().unwrap();
        let input = dir.path().join("song.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let encoder = FfmpegEncoder::new(fake, None);
        let outcome = encoder.encode(&input, &MediaProfile::default_audio(), None).await;
        match &outcome {
            EncodeOutcome::Failed { reason } => assert_eq!(reason, "Error while encoding | boom"),
            EncodeOutcome::Encoded { .. } => panic!("a non-zero exit must fail"),
        }
        drop(outcome);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["song.wav".to_string()]);
    }
}
