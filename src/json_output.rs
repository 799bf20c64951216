//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da script.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout
//! - Riusa `FileReport` e `OptimizationStats` come payload
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio elaborazione di un tipo di media
//! - `progress`: Progresso corrente
//! - `file_complete`: Stato terminale di un file
//! - `complete`: Fine elaborazione con statistiche finali
//! - `error`: Errore fatale (tool mancanti, configurazione)

use crate::config::Config;
use crate::optimizer::task_optimizer::FileReport;
use crate::profile::MediaKind;
use crate::progress::OptimizationStats;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del processo per un tipo di media
    #[serde(rename = "start")]
    Start {
        kind: MediaKind,
        site_root: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// Progresso corrente
    #[serde(rename = "progress")]
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        #[serde(flatten)]
        report: FileReport,
        reduction_percent: f64,
        message: String,
    },

    /// Processo completato
    #[serde(rename = "complete")]
    Complete {
        kind: Option<MediaKind>,
        #[serde(flatten)]
        stats: OptimizationStats,
        average_reduction: f64,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Run options echoed in the `start` message
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub dry_run: bool,
    pub workers: usize,
    pub min_savings_percent: u32,
    pub canonical_extension: Option<String>,
}

impl JsonConfig {
    pub fn new(config: &Config, kind: MediaKind) -> Self {
        let profile = config.profile(kind);
        Self {
            dry_run: config.dry_run,
            workers: config.workers,
            min_savings_percent: profile.min_savings_percent,
            canonical_extension: profile.canonical_extension.clone(),
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di inizio
    pub fn start(config: &Config, kind: MediaKind, total_files: usize) -> Self {
        Self::Start {
            kind,
            site_root: config.site_root.clone(),
            total_files,
            config: JsonConfig::new(config, kind),
        }
    }

    /// Crea un messaggio di progresso
    pub fn progress(current: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            current,
            total,
            percentage,
        }
    }

    /// Crea un messaggio di completamento file
    pub fn file_complete(report: &FileReport) -> Self {
        let reduction_percent = match report.new_size {
            Some(new_size) if report.outcome.is_replaced() => {
                crate::file_manager::FileManager::calculate_reduction(report.original_size, new_size)
            }
            _ => 0.0,
        };

        Self::FileComplete {
            report: report.clone(),
            reduction_percent,
            message: report.status_line(),
        }
    }

    /// Crea un messaggio di completamento generale
    pub fn complete(kind: Option<MediaKind>, stats: &OptimizationStats, duration_seconds: f64) -> Self {
        Self::Complete {
            kind,
            average_reduction: stats.overall_reduction_percent(),
            stats: stats.clone(),
            duration_seconds,
        }
    }

    /// Crea un messaggio di errore
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::task_optimizer::FileOutcome;

    #[test]
    fn test_file_complete_shape() {
        let report = FileReport {
            path: PathBuf::from("/site/song.wav"),
            kind: MediaKind::Audio,
            original_size: 1000,
            new_size: Some(800),
            final_path: Some(PathBuf::from("/site/song.mp3")),
            outcome: FileOutcome::Compressed,
            dry_run: false,
        };

        let value = serde_json::to_value(JsonMessage::file_complete(&report)).unwrap();
        assert_eq!(value["type"], "file_complete");
        assert_eq!(value["kind"], "audio");
        assert_eq!(value["outcome"]["status"], "compressed");
        assert_eq!(value["final_path"], "/site/song.mp3");
        assert_eq!(value["reduction_percent"], 20.0);
    }

    #[test]
    fn test_complete_flattens_stats() {
        let stats = OptimizationStats {
            files_processed: 3,
            compressed: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(JsonMessage::complete(Some(MediaKind::Image), &stats, 1.5)).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["files_processed"], 3);
        assert_eq!(value["kind"], "image");
        assert_eq!(value["duration_seconds"], 1.5);
    }

    #[test]
    fn test_start_and_progress() {
        let config = Config::default();
        let value = serde_json::to_value(JsonMessage::start(&config, MediaKind::Video, 4)).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["config"]["canonical_extension"], "mp4");

        let value = serde_json::to_value(JsonMessage::progress(1, 4)).unwrap();
        assert_eq!(value["percentage"], 25.0);
    }
}
