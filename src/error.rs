//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori fatali (tool mancanti, config invalida) da errori per-file
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `ProbeUnavailable`: ffprobe non ha dato risultati (non fatale, degrada a NeedsWork)
//! - `Encode`: ffmpeg ha fallito su un file (non fatale, file saltato)
//! - `Replace`: errore filesystem durante il commit (fatale solo per quel file)
//! - `MissingDependency`: tool esterno mancante (fatale, run abortito prima di toccare file)
//! - `Validation`: configurazione non valida
//! - `Manifest`: manifest di contenuto illeggibile
//!
//! ## Esempio:
//! ```rust,ignore
//! if !tool_exists {
//!     return Err(OptimizeError::MissingDependency("ffmpeg".to_string()));
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for media normalization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe unavailable for {path}: {reason}")]
    ProbeUnavailable { path: PathBuf, reason: String },

    #[error("FFmpeg error: {0}")]
    Encode(String),

    #[error("Failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to overwrite existing file: {0}")]
    TargetExists(PathBuf),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl OptimizeError {
    /// Wrap an IO error raised while swapping `path` into place.
    pub fn replace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Replace {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingDependency(_) | Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(OptimizeError::MissingDependency("ffmpeg".into()).is_fatal());
        assert!(OptimizeError::Validation("bad".into()).is_fatal());
        assert!(!OptimizeError::Encode("exit 1".into()).is_fatal());
        assert!(!OptimizeError::replace(
            "/tmp/a.jpg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
        )
        .is_fatal());
    }

    #[test]
    fn test_replace_message_names_path() {
        let err = OptimizeError::replace(
            "/site/song.wav",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/site/song.wav"));
        assert!(msg.contains("disk full"));
    }
}
