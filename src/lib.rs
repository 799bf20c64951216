//! # Site Media Normalizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Pipeline per file:
//! `probe` → `decision` → `encode` → `acceptance` → `replace`
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione del run e profili per tipo di media
//! - `profile`: `MediaProfile`, parametri di encoding e soglie
//! - `probe`: Metadati tramite ffprobe (`MediaProbe`)
//! - `decision`: Classificazione TooSmall / AlreadyOptimal / NeedsWork
//! - `encode`: Encoding tramite ffmpeg verso file temporanei (`MediaEncoder`)
//! - `acceptance`: Politica di accettazione del candidato
//! - `replace`: Sostituzione atomica e recovery dopo interruzioni
//! - `history`: Generazione di `history.json` dai manifest
//! - `optimizer`: Orchestratore del processo
//! - `progress` / `json_output`: Progress bar, statistiche, output JSON
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use site_media_normalizer::{Config, MediaKind, MediaNormalizer, ToolPathResolver};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let normalizer = MediaNormalizer::with_external_tools(Config::default(), &ToolPathResolver::new()).await?;
//! normalizer.run(&MediaKind::ALL).await?;
//! # Ok(())
//! # }
//! ```

pub mod acceptance;
pub mod config;
pub mod decision;
pub mod encode;
pub mod error;
pub mod file_manager;
pub mod history;
pub mod json_output;
pub mod optimizer;
pub mod probe;
pub mod profile;
pub mod progress;
pub mod replace;
pub mod tool_resolver;
pub mod utils;

pub use acceptance::{accept, Verdict};
pub use config::Config;
pub use decision::{decide, Decision};
pub use encode::{EncodeOutcome, FfmpegEncoder, MediaEncoder};
pub use error::OptimizeError;
pub use optimizer::{FileOutcome, FileReport, MediaNormalizer, RunReport};
pub use probe::{FfprobeProber, MediaProbe, ProbeResult};
pub use profile::{MediaKind, MediaProfile};
pub use progress::OptimizationStats;
pub use replace::AtomicReplacer;
pub use tool_resolver::ToolPathResolver;
