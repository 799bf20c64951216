//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con le opzioni del run e i tre `MediaProfile`
//! - Fornisce validazione robusta dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Risolve il file di configurazione da usare (flag, root del sito, config dir utente)
//!
//! ## Parametri di configurazione:
//! - `site_root`: Root del sito statico (default: ".")
//! - `dry_run`: Simula senza sostituire file (default: false)
//! - `workers`: File elaborati in parallelo (default: 1, sequenziale)
//! - `json_output`: Eventi JSON su stdout (default: false)
//! - `probe_timeout_secs`: Timeout per ffprobe (default: 10)
//! - `encode_timeout_secs`: Timeout per ffmpeg (default: nessuno)
//! - `image` / `audio` / `video`: Profili di encoding
//! - `history`: Sorgenti e destinazione di history.json
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     dry_run: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::OptimizeError;
use crate::profile::{MediaKind, MediaProfile};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name looked up in the site root
pub const SITE_CONFIG_FILE: &str = "media-normalizer.json";

/// Configuration for a normalization run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the static site; profile roots are relative to it
    pub site_root: PathBuf,
    /// Dry run - encode and evaluate, but never replace files
    pub dry_run: bool,
    /// Number of files processed at once (1 = strictly sequential)
    pub workers: usize,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    pub probe_timeout_secs: u64,
    /// Upper bound for a single ffmpeg run. `None` lets the encoder run to completion.
    pub encode_timeout_secs: Option<u64>,
    pub image: MediaProfile,
    pub audio: MediaProfile,
    pub video: MediaProfile,
    pub history: HistoryConfig,
}

/// A content manifest feeding the history file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestSource {
    /// Entry type written to history (`blog`, `poem`, ...)
    pub entry_type: String,
    /// Manifest path, relative to the site root
    pub path: PathBuf,
}

/// History file settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub manifests: Vec<ManifestSource>,
    /// Output path, relative to the site root
    pub output: PathBuf,
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            manifests: vec![
                ManifestSource {
                    entry_type: "blog".to_string(),
                    path: PathBuf::from("src/blogs/blogs_manifest.json"),
                },
                ManifestSource {
                    entry_type: "poem".to_string(),
                    path: PathBuf::from("src/poems/poems_manifest.json"),
                },
            ],
            output: PathBuf::from("src/resources/history.json"),
            limit: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_root: PathBuf::from("."),
            dry_run: false,
            workers: 1,
            json_output: false,
            probe_timeout_secs: 10,
            encode_timeout_secs: None,
            image: MediaProfile::default_image(),
            audio: MediaProfile::default_audio(),
            video: MediaProfile::default_video(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("Number of workers must be greater than 0".to_string()));
        }

        if self.probe_timeout_secs == 0 {
            return Err(invalid("Probe timeout must be greater than 0".to_string()));
        }

        if self.encode_timeout_secs == Some(0) {
            return Err(invalid("Encode timeout must be greater than 0 when set".to_string()));
        }

        if self.history.limit == 0 {
            return Err(invalid("History limit must be greater than 0".to_string()));
        }

        for kind in MediaKind::ALL {
            let profile = self.profile(kind);
            if profile.kind != kind {
                return Err(invalid(format!("Profile under `{}` declares kind `{}`", kind, profile.kind)));
            }
            profile.validate()?;
        }

        Ok(())
    }

    /// Profile for a media kind
    pub fn profile(&self, kind: MediaKind) -> &MediaProfile {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }

    /// Absolute scan roots of a profile
    pub fn scan_roots(&self, kind: MediaKind) -> Vec<PathBuf> {
        self.profile(kind)
            .roots
            .iter()
            .map(|root| self.site_root.join(root))
            .collect()
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Pick the config file for a run.
    ///
    /// Order: explicit path, `<site_root>/media-normalizer.json`, then the
    /// user config dir. Returns `None` when only built-in defaults apply.
    pub fn locate(explicit: Option<&Path>, site_root: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let site_file = site_root.join(SITE_CONFIG_FILE);
        if site_file.is_file() {
            debug!("Using site config file: {}", site_file.display());
            return Some(site_file);
        }

        let user_file = dirs::config_dir()?.join("media-normalizer").join("config.json");
        if user_file.is_file() {
            debug!("Using user config file: {}", user_file.display());
            return Some(user_file);
        }

        None
    }
}

fn invalid(message: String) -> anyhow::Error {
    OptimizeError::Validation(message).into()
}
