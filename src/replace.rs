//! # Atomic Replacer
//!
//! Swaps an accepted candidate into place.
//!
//! - Same extension: the temp file gets the original's permissions and is
//!   renamed over the original in one step.
//! - Extension change: the original is renamed aside, the temp file is
//!   installed under the canonical name without clobbering, then the aside is
//!   deleted. If installing fails the aside is renamed back, so the original is
//!   never deleted before its replacement exists.
//!
//! [`AtomicReplacer::recover`] cleans up after a crash between those steps.

use crate::error::OptimizeError;
use crate::optimizer::PathResolver;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Name prefix of encoder outputs that have not been committed yet
pub const TEMP_PREFIX: &str = ".mn-tmp-";
/// Name suffix of originals parked during an extension change
pub const ASIDE_SUFFIX: &str = ".mn-aside";

/// Leftovers handled by [`AtomicReplacer::recover`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub temps_removed: usize,
    pub asides_restored: usize,
    pub asides_removed: usize,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.temps_removed == 0 && self.asides_restored == 0 && self.asides_removed == 0
    }
}

pub struct AtomicReplacer;

impl AtomicReplacer {
    /// Install `temp` in place of `original` and return the final path.
    ///
    /// On error the original is left where it was and `temp` is deleted.
    pub fn commit(original: &Path, temp: TempPath, canonical_extension: Option<&str>) -> Result<PathBuf, OptimizeError> {
        copy_permissions(original, &temp);

        let extension = match canonical_extension {
            Some(ext) if PathResolver::needs_rename(original, Some(ext)) => ext,
            _ => {
                temp.persist(original)
                    .map_err(|e| OptimizeError::replace(original, e.error))?;
                debug!("Replaced {}", original.display());
                return Ok(original.to_path_buf());
            }
        };

        let final_path = PathResolver::final_path(original, Some(extension));
        if final_path.exists() {
            return Err(OptimizeError::TargetExists(final_path));
        }

        let aside = PathResolver::aside_path(original, extension).ok_or_else(|| {
            OptimizeError::replace(
                original,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

        fs::rename(original, &aside).map_err(|e| OptimizeError::replace(original, e))?;

        match temp.persist_noclobber(&final_path) {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&aside) {
                    // recover() deletes it on the next run since the canonical file exists
                    warn!("Could not remove {}: {}", aside.display(), e);
                }
                debug!("Replaced {} -> {}", original.display(), final_path.display());
                Ok(final_path)
            }
            Err(e) => {
                if let Err(restore) = fs::rename(&aside, original) {
                    error!(
                        "Could not restore {} from {}: {}",
                        original.display(),
                        aside.display(),
                        restore
                    );
                }
                Err(OptimizeError::replace(final_path, e.error))
            }
        }
    }

    /// Remove stale temp files and resolve aside files under `root`.
    ///
    /// An aside whose canonical file exists is a finished replacement and is
    /// deleted; otherwise it is renamed back to the original name.
    pub fn recover(root: &Path) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        let artefacts: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| PathResolver::is_artefact(p))
            .collect();

        for path in artefacts {
            if PathResolver::is_temp_file(&path) {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!("Removed stale temp file {}", path.display());
                        report.temps_removed += 1;
                    }
                    Err(e) => warn!("Could not remove {}: {}", path.display(), e),
                }
                continue;
            }

            let Some((original, canonical)) = PathResolver::parse_aside(&path) else {
                warn!("Ignoring unrecognized aside file {}", path.display());
                continue;
            };

            if canonical.exists() {
                match fs::remove_file(&path) {
                    Ok(()) => report.asides_removed += 1,
                    Err(e) => warn!("Could not remove {}: {}", path.display(), e),
                }
            } else if original.exists() {
                warn!(
                    "Leaving {} in place, {} already exists",
                    path.display(),
                    original.display()
                );
            } else {
                match fs::rename(&path, &original) {
                    Ok(()) => {
                        warn!("Restored interrupted replacement: {}", original.display());
                        report.asides_restored += 1;
                    }
                    Err(e) => error!("Could not restore {}: {}", original.display(), e),
                }
            }
        }

        report
    }
}

/// Give the temp file the original's mode; temp files are created private.
fn copy_permissions(original: &Path, temp: &Path) {
    let result = fs::metadata(original).and_then(|meta| fs::set_permissions(temp, meta.permissions()));
    if let Err(e) = result {
        warn!("Could not copy permissions from {}: {}", original.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::new_temp_output;
    use tempfile::TempDir;

    fn candidate(dir: &Path, extension: &str, content: &[u8]) -> TempPath {
        let temp = new_temp_output(dir, extension).unwrap();
        fs::write(&temp, content).unwrap();
        temp
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_commit_same_extension() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("photo.jpg");
        fs::write(&original, b"original bytes").unwrap();

        let temp = candidate(dir.path(), "jpg", b"smaller");
        let final_path = AtomicReplacer::commit(&original, temp, None).unwrap();

        assert_eq!(final_path, original);
        assert_eq!(fs::read(&original).unwrap(), b"smaller");
        assert_eq!(entries(dir.path()), vec!["photo.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let original = dir.path().join("photo.png");
        fs::write(&original, b"original").unwrap();
        fs::set_permissions(&original, fs::Permissions::from_mode(0o644)).unwrap();

        let temp = candidate(dir.path(), "png", b"new");
        AtomicReplacer::commit(&original, temp, None).unwrap();

        let mode = fs::metadata(&original).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_commit_extension_change() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("song.wav");
        fs::write(&original, b"RIFF....").unwrap();

        let temp = candidate(dir.path(), "mp3", b"ID3");
        let final_path = AtomicReplacer::commit(&original, temp, Some("mp3")).unwrap();

        assert_eq!(final_path, dir.path().join("song.mp3"));
        assert_eq!(fs::read(&final_path).unwrap(), b"ID3");
        assert_eq!(entries(dir.path()), vec!["song.mp3"]);
    }

    #[test]
    fn test_commit_refuses_existing_canonical_file() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("song.wav");
        let other = dir.path().join("song.mp3");
        fs::write(&original, b"wav").unwrap();
        fs::write(&other, b"unrelated mp3").unwrap();

        let temp = candidate(dir.path(), "mp3", b"new");
        let err = AtomicReplacer::commit(&original, temp, Some("mp3")).unwrap_err();

        assert!(matches!(err, OptimizeError::TargetExists(ref p) if *p == other));
        assert_eq!(fs::read(&original).unwrap(), b"wav");
        assert_eq!(fs::read(&other).unwrap(), b"unrelated mp3");
        assert_eq!(entries(dir.path()), vec!["song.mp3", "song.wav"]);
    }

    #[test]
    fn test_dropped_candidate_leaves_original_untouched() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("clip.mp4");
        fs::write(&original, b"original video").unwrap();

        let temp = candidate(dir.path(), "mp4", b"rejected");
        drop(temp);

        assert_eq!(fs::read(&original).unwrap(), b"original video");
        assert_eq!(entries(dir.path()), vec!["clip.mp4"]);
    }

    #[test]
    fn test_recover() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("poems");
        fs::create_dir(&nested).unwrap();

        // crash before the temp was committed
        fs::write(nested.join(".mn-tmp-abc123.mp3"), b"partial").unwrap();
        // crash after install, before the aside was deleted
        fs::write(nested.join("a.mp3"), b"new").unwrap();
        fs::write(nested.join(".a.wav~mp3.mn-aside"), b"old").unwrap();
        // crash after the original was moved aside, before install
        fs::write(nested.join(".b.wav~mp3.mn-aside"), b"old b").unwrap();

        let report = AtomicReplacer::recover(dir.path());
        assert_eq!(
            report,
            RecoveryReport {
                temps_removed: 1,
                asides_restored: 1,
                asides_removed: 1,
            }
        );
        assert_eq!(entries(&nested), vec!["a.mp3", "b.wav"]);
        assert_eq!(fs::read(nested.join("b.wav")).unwrap(), b"old b");

        assert!(AtomicReplacer::recover(dir.path()).is_empty());
    }

    #[test]
    fn test_recover_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(AtomicReplacer::recover(&dir.path().join("absent")).is_empty());
    }
}
