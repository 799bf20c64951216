//! # Progress Tracking Module
//!
//! Unifica progress bar, righe di stato e messaggi JSON in un solo tracker.
//! I report arrivano uno alla volta dal consumer dello stream dei file, quindi
//! il tracker non ha bisogno di sincronizzazione.

use crate::{
    config::Config,
    json_output::JsonMessage,
    optimizer::task_optimizer::{FileOutcome, FileReport},
    profile::MediaKind,
    progress::{OptimizationStats, ProgressManager},
};
use std::time::Instant;
use tracing::{error, info, warn};

/// Tracker del progresso di un tipo di media
pub struct ProgressTracker {
    pub total_files: usize,
    current_file: usize,
    json_output: bool,
    progress_manager: ProgressManager,
    start_time: Instant,
}

impl ProgressTracker {
    /// Crea un nuovo tracker ed emette il messaggio di inizio
    pub fn start(config: &Config, kind: MediaKind, total_files: usize) -> Self {
        if config.json_output {
            JsonMessage::start(config, kind, total_files).emit();
        } else {
            info!("Found {} {} files", total_files, kind);
        }

        Self {
            total_files,
            current_file: 0,
            json_output: config.json_output,
            progress_manager: ProgressManager::new(total_files as u64, config.json_output),
            start_time: Instant::now(),
        }
    }

    /// Gestisce il completamento di un file: riga di stato, barra e JSON
    pub fn handle_file_completion(&mut self, report: &FileReport) {
        self.current_file += 1;
        let line = report.status_line();

        self.progress_manager.suspend(|| match report.outcome {
            FileOutcome::Error { .. } => error!("{}", line),
            FileOutcome::EncodeFailed { .. } => warn!("{}", line),
            _ => info!("{}", line),
        });

        if self.json_output {
            JsonMessage::file_complete(report).emit();
            JsonMessage::progress(self.current_file, self.total_files).emit();
        }

        self.progress_manager.update(&report.outcome.to_string());
    }

    /// Finalizza la barra ed emette il riepilogo
    pub fn finish(&self, kind: MediaKind, stats: &OptimizationStats) {
        let summary = stats.format_summary();
        self.progress_manager.finish(&summary);

        if self.json_output {
            JsonMessage::complete(Some(kind), stats, self.start_time.elapsed().as_secs_f64()).emit();
        } else {
            info!("{} done in {:.1}s: {}", kind, self.start_time.elapsed().as_secs_f64(), summary);
        }
    }
}
