//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path usati durante la sostituzione:
//! nome canonico di output, file "aside" e riconoscimento degli artefatti
//! lasciati dalla pipeline (temp e aside).
//!
//! Formato del file aside per `dir/song.wav` con estensione canonica `mp3`:
//! ```text
//! dir/.song.wav~mp3.mn-aside
//! ```
//! Il nome contiene sia il nome originale sia l'estensione canonica, così
//! `recover` può decidere se ripristinarlo o eliminarlo senza altro stato.

use crate::profile::lowercase_extension;
use crate::replace::{ASIDE_SUFFIX, TEMP_PREFIX};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Utility per calcolare i path della pipeline in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Whether committing `original` under `canonical_extension` renames it
    pub fn needs_rename(original: &Path, canonical_extension: Option<&str>) -> bool {
        match canonical_extension {
            Some(ext) => lowercase_extension(original).as_deref() != Some(ext),
            None => false,
        }
    }

    /// Path the original ends up at once a replacement is committed
    pub fn final_path(original: &Path, canonical_extension: Option<&str>) -> PathBuf {
        match canonical_extension {
            Some(ext) if Self::needs_rename(original, Some(ext)) => original.with_extension(ext),
            _ => original.to_path_buf(),
        }
    }

    /// Hidden sibling the original is parked at during an extension change
    pub fn aside_path(original: &Path, canonical_extension: &str) -> Option<PathBuf> {
        let name = original.file_name()?.to_string_lossy();
        let aside = format!(".{}~{}{}", name, canonical_extension, ASIDE_SUFFIX);
        Some(original.with_file_name(aside))
    }

    /// Split an aside path back into `(original, canonical)` paths.
    pub fn parse_aside(aside: &Path) -> Option<(PathBuf, PathBuf)> {
        let name = aside.file_name()?.to_str()?;
        let inner = name.strip_prefix('.')?.strip_suffix(ASIDE_SUFFIX)?;
        let (original_name, extension) = inner.rsplit_once('~')?;
        if original_name.is_empty() || extension.is_empty() {
            return None;
        }

        let original = aside.with_file_name(original_name);
        let canonical = original.with_extension(extension);
        debug!("Aside {} belongs to {}", aside.display(), original.display());
        Some((original, canonical))
    }

    pub fn is_temp_file(path: &Path) -> bool {
        file_name_matches(path, |name| name.starts_with(TEMP_PREFIX))
    }

    pub fn is_aside_file(path: &Path) -> bool {
        file_name_matches(path, |name| name.starts_with('.') && name.ends_with(ASIDE_SUFFIX))
    }

    /// Temp or aside file created by the pipeline itself
    pub fn is_artefact(path: &Path) -> bool {
        Self::is_temp_file(path) || Self::is_aside_file(path)
    }
}

fn file_name_matches(path: &Path, predicate: impl Fn(&str) -> bool) -> bool {
    path.file_name()
        .map(|name| predicate(&name.to_string_lossy()))
        .unwrap_or(false)
}
