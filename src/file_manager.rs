//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file media e le utilità sulle dimensioni.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei file di un profilo nelle sue root
//! - Filtraggio per estensione (case-insensitive) secondo il profilo
//! - Esclusione degli artefatti della pipeline (`.mn-tmp-*`, `*.mn-aside`)
//! - Utilità per calcoli dimensioni e percentuali
//!
//! ## Ordine:
//! I risultati sono de-duplicati e ordinati per path, così due run sullo
//! stesso albero elaborano i file nello stesso ordine.
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_media_files(&config.scan_roots(MediaKind::Audio), &config.audio);
//! ```

use crate::optimizer::PathResolver;
use crate::profile::MediaProfile;
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Manages file discovery
pub struct FileManager;

impl FileManager {
    /// Size of a file in bytes
    pub async fn get_file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Find all files of a profile under `roots`, sorted and de-duplicated.
    ///
    /// Missing roots are skipped.
    pub fn find_media_files(roots: &[PathBuf], profile: &MediaProfile) -> Vec<PathBuf> {
        let mut files = BTreeSet::new();

        for root in roots {
            if !root.is_dir() {
                debug!("Skipping missing {} root: {}", profile.kind, root.display());
                continue;
            }

            for entry in WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                if profile.matches_extension(path) && !PathResolver::is_artefact(path) {
                    files.insert(path.to_path_buf());
                }
            }
        }

        files.into_iter().collect()
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
