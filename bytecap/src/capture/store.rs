//! Payload store: destination directory, file naming, atomic writes
//!
//! - One directory per target application, created on first use
//! - `{session:05}-{sequence:02}.{ext}` names, raw bytes with no framing
//! - Atomic writes (temp file + fsync + rename)
//! - Strict file permissions (0600 files, 0700 dirs)
//! - Bounded startup cleanup of stale temp files

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::warn;

use super::error::{CaptureError, Result};
use super::models::SessionId;

/// Maximum number of entries scanned during temp cleanup
const CLEANUP_SCAN_LIMIT: usize = 1000;

/// Age threshold for temp file cleanup (1 hour)
const CLEANUP_AGE_THRESHOLD: Duration = Duration::from_secs(3600);

/// Name of the file holding `sequence` for `session_id`
///
/// Sequences past 99 simply get wider (`00001-100.dex`).
pub fn payload_file_name(session_id: SessionId, sequence: u64, extension: &str) -> String {
    format!("{:05}-{:02}.{}", session_id, sequence, extension)
}

/// Writer for one session's payload files
#[derive(Debug, Clone)]
pub struct PayloadStore {
    dir: PathBuf,
    session_id: SessionId,
    extension: String,
}

impl PayloadStore {
    pub fn new(dir: impl Into<PathBuf>, session_id: SessionId, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            session_id,
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the destination directory if needed (0700 on Unix)
    pub fn ensure_dir(&self) -> Result<()> {
        let to_error = |source| CaptureError::DirectoryCreation {
            path: self.dir.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(to_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)).map_err(to_error)?;
        }

        Ok(())
    }

    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(payload_file_name(self.session_id, sequence, &self.extension))
    }

    /// Write `bytes` verbatim as the file for `sequence`
    ///
    /// Readers never observe a partial file: the data goes to a temp file in
    /// the same directory, is fsynced, then renamed into place.
    pub fn write_payload(&self, sequence: u64, bytes: &[u8]) -> Result<PathBuf> {
        let final_path = self.path_for(sequence);
        let temp_path = self.dir.join(format!(
            ".{}.tmp.{}",
            payload_file_name(self.session_id, sequence, &self.extension),
            std::process::id()
        ));

        let result = Self::write_atomic(&temp_path, &final_path, bytes);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        result
            .map(|()| final_path.clone())
            .map_err(|source| CaptureError::Write {
                path: final_path,
                source,
            })
    }

    fn write_atomic(temp_path: &Path, final_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(temp_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(temp_path, final_path)
    }

    /// Remove this session directory's stale temp files
    pub fn cleanup_stale_temps(&self) -> std::io::Result<(usize, usize, bool)> {
        cleanup_stale_temps_in(&self.dir)
    }
}

/// Remove `*.tmp.*` leftovers older than an hour
///
/// Returns (deleted_count, scanned_count, hit_limit)
pub fn cleanup_stale_temps_in(dir: &Path) -> std::io::Result<(usize, usize, bool)> {
    if !dir.exists() {
        return Ok((0, 0, false));
    }

    let mut scanned = 0;
    let mut deleted = 0;
    let now = SystemTime::now();

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if scanned >= CLEANUP_SCAN_LIMIT {
            warn!(
                limit = CLEANUP_SCAN_LIMIT,
                dir = %dir.display(),
                "hit temp cleanup scan limit"
            );
            return Ok((deleted, scanned, true));
        }

        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        scanned += 1;

        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.contains(".tmp."));
        if !is_temp {
            continue;
        }

        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if age.is_some_and(|age| age > CLEANUP_AGE_THRESHOLD) {
            match fs::remove_file(path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to delete stale temp file"
                ),
            }
        }
    }

    Ok((deleted, scanned, false))
}
