//! Atomic file replacement.
//!
//! Content goes to a temp file in the destination directory which is then
//! renamed over the target. Readers see either the old file or the new one.
//! Where rename-over-existing is refused (Windows), the old file is moved to
//! `<name>.bak` first and restored if the second rename fails.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// `fsync` the temp file before the rename.
    #[default]
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub sync: SyncPolicy,
    /// Restrict the file to its owner (0o600). Ignored off Unix.
    pub owner_only: bool,
}

fn backup_path(path: &Path) -> std::path::PathBuf {
    path.with_extension("bak")
}

/// Restore `<path>.bak` when an interrupted write left only the backup.
///
/// Returns true when a backup was moved back into place.
pub fn recover_bak_file(path: &Path) -> bool {
    let backup = backup_path(path);
    if path.exists() || !backup.exists() {
        return false;
    }
    match fs::rename(&backup, path) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "Recovered .bak file from interrupted write");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to recover .bak file: {e}");
            false
        }
    }
}

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with(path, bytes, WriteOptions::default())
}

/// Write `bytes` to `path` atomically, creating missing parent directories.
pub fn atomic_write_with(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: WriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if options.sync == SyncPolicy::SyncAll {
        tmp.as_file().sync_all()?;
    }

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = backup_path(path);
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;

        if let Err(retry) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(retry.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!(path = %backup.display(), "Failed to remove .bak after write: {e}");
        }
    }

    #[cfg(unix)]
    if options.owner_only {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "atomic write complete");
    Ok(())
}
