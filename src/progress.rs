//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e le statistiche di un run.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` (nascosta in modalità JSON)
//! - `OptimizationStats`: contatori per esito, calcolati dai `FileReport`
//!
//! ## Statistiche tracciate:
//! - **compressed** / **converted**: file sostituiti
//! - **skipped_too_small** / **skipped_optimal** / **rejected**: file lasciati invariati
//! - **encode_failures**: ffmpeg ha fallito
//! - **errors**: errori di filesystem o di sostituzione
//! - **total_bytes_saved**: byte risparmiati dalle sostituzioni
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [=======================>----------------] 57/150 (38%) [Compressed] photo.jpg
//! ```

use crate::file_manager::FileManager;
use crate::optimizer::task_optimizer::{FileOutcome, FileReport};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for a normalization run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager. A hidden manager draws nothing.
    pub fn new(total_files: u64, hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Run `f` with the bar cleared, so log lines don't interleave with it
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics for a run, reduced from per-file reports
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub compressed: usize,
    pub converted: usize,
    pub skipped_too_small: usize,
    pub skipped_optimal: usize,
    pub rejected: usize,
    pub encode_failures: usize,
    pub errors: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a FileReport>) -> Self {
        let mut stats = Self::new();
        for report in reports {
            stats.record(report);
        }
        stats
    }

    pub fn record(&mut self, report: &FileReport) {
        self.files_processed += 1;
        self.total_original_size += report.original_size;
        self.total_bytes_saved += report.bytes_saved();

        match report.outcome {
            FileOutcome::Compressed => self.compressed += 1,
            FileOutcome::Converted => self.converted += 1,
            FileOutcome::SkippedTooSmall => self.skipped_too_small += 1,
            FileOutcome::SkippedOptimal => self.skipped_optimal += 1,
            FileOutcome::SkippedNoImprovement => self.rejected += 1,
            FileOutcome::EncodeFailed { .. } => self.encode_failures += 1,
            FileOutcome::Error { .. } => self.errors += 1,
        }
    }

    /// Combine the stats of two runs
    pub fn merge(&mut self, other: &OptimizationStats) {
        self.files_processed += other.files_processed;
        self.compressed += other.compressed;
        self.converted += other.converted;
        self.skipped_too_small += other.skipped_too_small;
        self.skipped_optimal += other.skipped_optimal;
        self.rejected += other.rejected;
        self.encode_failures += other.encode_failures;
        self.errors += other.errors;
        self.total_bytes_saved += other.total_bytes_saved;
        self.total_original_size += other.total_original_size;
    }

    pub fn replaced(&self) -> usize {
        self.compressed + self.converted
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} | Compressed: {} | Converted: {} | Too small: {} | Already optimized: {} | No improvement: {} | FFmpeg errors: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.compressed,
            self.converted,
            self.skipped_too_small,
            self.skipped_optimal,
            self.rejected,
            self.encode_failures,
            self.errors,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
