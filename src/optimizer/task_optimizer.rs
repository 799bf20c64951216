//! # Task Optimizer Module
//!
//! Worker per l'elaborazione di un singolo file.
//!
//! Stati attraversati da ogni file:
//! ```text
//! Discovered → Probed → Decided{Optimal|TooSmall|NeedsWork}
//!            → [Encoded{Ok|Failed}] → [Accepted|Rejected] → Terminal
//! ```
//! Solo `Accepted` invoca l'`AtomicReplacer`; in dry run il candidato viene
//! scartato. Il file temporaneo non sopravvive mai a `process()`.

use crate::{
    acceptance::{accept, is_format_conversion, RejectReason, ReplaceReason, Verdict},
    decision::{decide, Decision},
    encode::{EncodeOutcome, MediaEncoder},
    file_manager::FileManager,
    probe::MediaProbe,
    profile::{MediaKind, MediaProfile},
    replace::AtomicReplacer,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Compressed,
    Converted,
    SkippedTooSmall,
    SkippedOptimal,
    SkippedNoImprovement,
    EncodeFailed { reason: String },
    Error { message: String },
}

impl FileOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Compressed | Self::Converted)
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compressed => f.write_str("[Compressed]"),
            Self::Converted => f.write_str("[Converted]"),
            Self::SkippedTooSmall => f.write_str("[Skipped - too small]"),
            Self::SkippedOptimal => f.write_str("[Skipped - already optimized]"),
            Self::SkippedNoImprovement => f.write_str("[Skipped - no improvement]"),
            Self::EncodeFailed { .. } => f.write_str("[FFmpeg error]"),
            Self::Error { .. } => f.write_str("[Error]"),
        }
    }
}

/// Per-file terminal record
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub original_size: u64,
    /// Size of the encoded candidate, when one was produced
    pub new_size: Option<u64>,
    /// Where the file lives after a committed replacement
    pub final_path: Option<PathBuf>,
    pub outcome: FileOutcome,
    pub dry_run: bool,
}

impl FileReport {
    fn new(path: &Path, kind: MediaKind, original_size: u64, dry_run: bool, outcome: FileOutcome) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            original_size,
            new_size: None,
            final_path: None,
            outcome,
            dry_run,
        }
    }

    /// Bytes saved by an accepted replacement
    pub fn bytes_saved(&self) -> u64 {
        match (self.outcome.is_replaced(), self.new_size) {
            (true, Some(new_size)) => self.original_size.saturating_sub(new_size),
            _ => 0,
        }
    }

    /// One-line human readable status
    pub fn status_line(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());

        let mut line = format!("{} {}", self.outcome, name);
        match (&self.outcome, self.new_size) {
            (FileOutcome::EncodeFailed { reason }, _) => line.push_str(&format!(" | {}", reason)),
            (FileOutcome::Error { message }, _) => line.push_str(&format!(" | {}", message)),
            (_, Some(new_size)) => line.push_str(&format!(
                " | {} → {} ({:+.1}%)",
                FileManager::format_size(self.original_size),
                FileManager::format_size(new_size),
                -FileManager::calculate_reduction(self.original_size, new_size)
            )),
            (_, None) => line.push_str(&format!(" | {}", FileManager::format_size(self.original_size))),
        }
        if let Some(final_path) = &self.final_path {
            if *final_path != self.path {
                line.push_str(&format!(" -> {}", final_path.display()));
            }
        }
        if self.dry_run && self.outcome.is_replaced() {
            line.push_str(" (dry run)");
        }
        line
    }
}

/// Worker che porta un file dallo stato `Discovered` a uno stato terminale
pub struct TaskOptimizer<'a, P, E> {
    profile: &'a MediaProfile,
    prober: &'a P,
    encoder: &'a E,
    dry_run: bool,
}

impl<'a, P: MediaProbe, E: MediaEncoder> TaskOptimizer<'a, P, E> {
    pub fn new(profile: &'a MediaProfile, prober: &'a P, encoder: &'a E, dry_run: bool) -> Self {
        Self {
            profile,
            prober,
            encoder,
            dry_run,
        }
    }

    /// Processa un singolo file
    pub async fn process(&self, path: &Path) -> FileReport {
        let kind = self.profile.kind;

        let original_size = match FileManager::get_file_size(path).await {
            Ok(size) => size,
            Err(e) => {
                return FileReport::new(path, kind, 0, self.dry_run, FileOutcome::Error { message: e.to_string() })
            }
        };
        let report = |outcome| FileReport::new(path, kind, original_size, self.dry_run, outcome);

        // no point probing below the floor
        if self.profile.is_below_floor(original_size) {
            return report(FileOutcome::SkippedTooSmall);
        }

        let probe = self.prober.probe(path, kind).await;
        match decide(original_size, probe.as_ref(), self.profile) {
            Decision::TooSmall => return report(FileOutcome::SkippedTooSmall),
            Decision::AlreadyOptimal => return report(FileOutcome::SkippedOptimal),
            Decision::NeedsWork => debug!("{} needs work", path.display()),
        }

        let outcome = self.encoder.encode(path, self.profile, probe.as_ref()).await;
        let conversion = is_format_conversion(path, probe.as_ref(), self.profile);
        let verdict = accept(original_size, &outcome, self.profile, conversion);
        debug!("Verdict for {}: {}", path.display(), verdict);

        match (verdict, outcome) {
            (Verdict::Replace(reason), EncodeOutcome::Encoded { output, size }) => {
                let terminal = match reason {
                    ReplaceReason::Compressed => FileOutcome::Compressed,
                    ReplaceReason::Converted => FileOutcome::Converted,
                };
                let mut done = report(terminal);
                done.new_size = Some(size);

                if self.dry_run {
                    drop(output);
                    return done;
                }

                match AtomicReplacer::commit(path, output, self.profile.canonical_extension.as_deref()) {
                    Ok(final_path) => done.final_path = Some(final_path),
                    Err(e) => done.outcome = FileOutcome::Error { message: e.to_string() },
                }
                done
            }
            (Verdict::Reject(RejectReason::EncoderError), EncodeOutcome::Failed { reason }) => {
                report(FileOutcome::EncodeFailed { reason })
            }
            (_, rejected) => {
                let mut done = report(FileOutcome::SkippedNoImprovement);
                done.new_size = rejected.size();
                done
            }
        }
    }
}
