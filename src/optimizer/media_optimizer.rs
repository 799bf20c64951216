//! # Media Normalizer Main Orchestrator
//!
//! Orchestratore principale: per ogni tipo di media ripulisce gli artefatti
//! di run interrotti, scansiona le root del profilo e porta ogni file a uno
//! stato terminale tramite `TaskOptimizer`.
//!
//! Per default i file sono elaborati uno alla volta in ordine di path.
//! Con `workers > 1` più file sono in volo sullo stesso task tramite
//! `buffer_unordered`; le statistiche sono calcolate alla fine dai report.

use crate::{
    config::Config,
    encode::{FfmpegEncoder, MediaEncoder},
    file_manager::FileManager,
    json_output::JsonMessage,
    optimizer::{
        progress_tracker::ProgressTracker,
        task_optimizer::{FileReport, TaskOptimizer},
    },
    probe::{FfprobeProber, MediaProbe},
    profile::{MediaKind, MediaProfile},
    progress::OptimizationStats,
    replace::{AtomicReplacer, RecoveryReport},
    tool_resolver::ToolPathResolver,
};
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reports of one media kind
#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: MediaKind,
    pub reports: Vec<FileReport>,
    pub stats: OptimizationStats,
    pub recovery: RecoveryReport,
}

/// Result of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub kinds: Vec<KindReport>,
    pub stats: OptimizationStats,
}

/// Orchestratore principale, generico su probe ed encoder
#[derive(Debug)]
pub struct MediaNormalizer<P, E> {
    config: Config,
    prober: P,
    encoder: E,
}

impl MediaNormalizer<FfprobeProber, FfmpegEncoder> {
    /// Build a normalizer backed by ffprobe/ffmpeg.
    ///
    /// Fails with `MissingDependency` before any file is touched when a tool
    /// cannot be found or does not run.
    pub async fn with_external_tools(config: Config, resolver: &ToolPathResolver) -> Result<Self> {
        config.validate()?;
        let tools = resolver.verify().await?;
        debug!("Using ffmpeg {} and ffprobe {}", tools.ffmpeg.display(), tools.ffprobe.display());

        let prober = FfprobeProber::new(tools.ffprobe, config.probe_timeout());
        let encoder = FfmpegEncoder::new(tools.ffmpeg, config.encode_timeout());
        Self::new(config, prober, encoder)
    }
}

impl<P: MediaProbe, E: MediaEncoder> MediaNormalizer<P, E> {
    /// Crea nuova istanza con probe ed encoder espliciti
    pub fn new(config: Config, prober: P, encoder: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            prober,
            encoder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Esegue la normalizzazione per i tipi richiesti, in ordine
    pub async fn run(&self, kinds: &[MediaKind]) -> Result<RunReport> {
        let start_time = Instant::now();
        self.log_configuration(kinds);

        let mut run = RunReport::default();
        for &kind in kinds {
            let kind_report = self.run_kind(kind).await;
            run.stats.merge(&kind_report.stats);
            run.kinds.push(kind_report);
        }

        self.print_final_stats(&run.stats, start_time.elapsed().as_secs_f64());
        Ok(run)
    }

    /// Normalizza tutti i file di un tipo di media
    pub async fn run_kind(&self, kind: MediaKind) -> KindReport {
        let profile = self.config.profile(kind);
        let roots = self.config.scan_roots(kind);

        let recovery = self.recover(&roots);
        let files = FileManager::find_media_files(&roots, profile);

        let mut tracker = ProgressTracker::start(&self.config, kind, files.len());
        let reports = self.process_files(profile, &files, &mut tracker).await;
        let stats = OptimizationStats::from_reports(&reports);
        tracker.finish(kind, &stats);

        KindReport {
            kind,
            reports,
            stats,
            recovery,
        }
    }

    /// Pulisce temp e aside lasciati da run interrotti
    fn recover(&self, roots: &[PathBuf]) -> RecoveryReport {
        let mut total = RecoveryReport::default();
        for root in roots {
            let found = AtomicReplacer::recover(root);
            total.temps_removed += found.temps_removed;
            total.asides_restored += found.asides_restored;
            total.asides_removed += found.asides_removed;
        }

        if !total.is_empty() {
            warn!(
                "Cleaned up after an interrupted run: {} temp files removed, {} originals restored, {} aside files removed",
                total.temps_removed, total.asides_restored, total.asides_removed
            );
        }
        total
    }

    /// Processa i file, sequenzialmente o con `workers` file in volo
    async fn process_files(
        &self,
        profile: &MediaProfile,
        files: &[PathBuf],
        tracker: &mut ProgressTracker,
    ) -> Vec<FileReport> {
        let task = TaskOptimizer::new(profile, &self.prober, &self.encoder, self.config.dry_run);
        let task = &task;

        let mut results = stream::iter(files)
            .map(|path| task.process(path))
            .buffer_unordered(self.config.workers.max(1));

        let mut reports = Vec::with_capacity(files.len());
        while let Some(report) = results.next().await {
            tracker.handle_file_completion(&report);
            reports.push(report);
        }

        reports.sort_by(|a, b| a.path.cmp(&b.path));
        reports
    }

    /// Logga configurazione (solo se non JSON mode)
    fn log_configuration(&self, kinds: &[MediaKind]) {
        if self.config.json_output {
            return;
        }

        info!("Site root: {}", self.config.site_root.display());
        let names: Vec<&str> = kinds.iter().map(MediaKind::as_str).collect();
        info!("Media: {}", names.join(", "));
        if self.config.workers > 1 {
            info!("Workers: {} files in flight", self.config.workers);
        }
        if self.config.dry_run {
            info!("Dry run mode: No files will be modified");
        }
    }

    /// Stampa statistiche finali
    fn print_final_stats(&self, stats: &OptimizationStats, duration: f64) {
        if self.config.json_output {
            JsonMessage::complete(None, stats, duration).emit();
            return;
        }

        info!("=== Normalization Complete ===");
        info!("Files processed: {}", stats.files_processed);
        info!("Compressed: {}", stats.compressed);
        info!("Converted: {}", stats.converted);
        info!(
            "Skipped: {} too small, {} already optimized, {} no improvement",
            stats.skipped_too_small, stats.skipped_optimal, stats.rejected
        );
        info!("FFmpeg errors: {}", stats.encode_failures);
        info!("Errors: {}", stats.errors);
        info!(
            "Bytes saved: {} ({:.2}%)",
            FileManager::format_size(stats.total_bytes_saved),
            stats.overall_reduction_percent()
        );
        info!("Duration: {:.1}s", duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{new_temp_output, EncodeOutcome};
    use crate::probe::ProbeResult;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    struct UnknownProbe;

    impl MediaProbe for UnknownProbe {
        async fn probe(&self, _path: &Path, _kind: MediaKind) -> Option<ProbeResult> {
            None
        }
    }

    /// Halves every file and remembers what it was asked to encode
    #[derive(Default)]
    struct HalvingEncoder {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl MediaEncoder for HalvingEncoder {
        async fn encode(&self, input: &Path, profile: &MediaProfile, _probe: Option<&ProbeResult>) -> EncodeOutcome {
            self.seen.borrow_mut().push(input.to_path_buf());
            let size = std::fs::metadata(input).unwrap().len() / 2;
            let output = new_temp_output(input.parent().unwrap(), &profile.output_extension(input)).unwrap();
            std::fs::write(&output, vec![0u8; size as usize]).unwrap();
            EncodeOutcome::Encoded { output, size }
        }
    }

    fn site() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            site_root: dir.path().to_path_buf(),
            json_output: true,
            ..Default::default()
        };
        (dir, config)
    }

    fn write(root: &Path, relative: &str, size: usize) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![1u8; size]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_sequential_run_is_path_ordered() {
        let (dir, config) = site();
        write(dir.path(), "src/poems/b/two.mp3", 2000);
        write(dir.path(), "src/poems/a/one.mp3", 2000);
        write(dir.path(), "src/bio/three.ogg", 2000);

        let normalizer = MediaNormalizer::new(config, UnknownProbe, HalvingEncoder::default()).unwrap();
        let run = normalizer.run(&[MediaKind::Audio]).await.unwrap();

        let seen = normalizer.encoder.seen.borrow().clone();
        assert_eq!(
            seen,
            vec![
                dir.path().join("src/bio/three.ogg"),
                dir.path().join("src/poems/a/one.mp3"),
                dir.path().join("src/poems/b/two.mp3"),
            ]
        );
        assert_eq!(run.stats.compressed, 3);
        assert!(dir.path().join("src/bio/three.mp3").exists());
        assert!(!dir.path().join("src/bio/three.ogg").exists());
    }

    #[tokio::test]
    async fn test_parallel_workers_give_same_totals() {
        let (dir, mut config) = site();
        for i in 0..6 {
            write(dir.path(), &format!("src/resources/audio/{}.mp3", i), 1000 + i);
        }
        config.workers = 4;

        let normalizer = MediaNormalizer::new(config, UnknownProbe, HalvingEncoder::default()).unwrap();
        let kind = normalizer.run_kind(MediaKind::Audio).await;

        assert_eq!(kind.stats.files_processed, 6);
        assert_eq!(kind.stats.compressed, 6);
        let paths: Vec<_> = kind.reports.iter().map(|r| r.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn test_run_recovers_interrupted_replacements_first() {
        let (dir, config) = site();
        write(dir.path(), "src/poems/.mn-tmp-zz.mp3", 10);
        write(dir.path(), "src/poems/.song.wav~mp3.mn-aside", 4000);

        let normalizer = MediaNormalizer::new(config, UnknownProbe, HalvingEncoder::default()).unwrap();
        let kind = normalizer.run_kind(MediaKind::Audio).await;

        assert_eq!(kind.recovery.temps_removed, 1);
        assert_eq!(kind.recovery.asides_restored, 1);
        // the restored original is then processed normally
        assert_eq!(kind.stats.compressed, 1);
        assert!(dir.path().join("src/poems/song.mp3").exists());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        assert!(MediaNormalizer::new(config, UnknownProbe, HalvingEncoder::default()).is_err());
    }
}
