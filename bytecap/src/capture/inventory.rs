//! Offline inventory of captured payload files
//!
//! Reads back what sessions wrote: parses `{session}-{sequence}.{ext}` names,
//! hashes contents, reports sequence gaps and content duplicates.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::models::SessionId;

/// Root plus one level of per-application directories
const SCAN_MAX_DEPTH: usize = 2;

/// Most missing sequence numbers listed per session
const MISSING_LIST_LIMIT: usize = 1000;

/// One payload file found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureFile {
    pub path: PathBuf,
    pub session_id: SessionId,
    pub sequence: u64,
    pub extension: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the contents
    pub sha256: String,
}

impl CaptureFile {
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// Per-session totals within one directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInventory {
    pub directory: PathBuf,
    pub session_id: SessionId,
    pub count: usize,
    pub total_bytes: u64,
    /// How many numbers between 1 and the highest seen have no file
    pub missing_count: u64,
    /// The first of those numbers, at most `MISSING_LIST_LIMIT`
    pub missing_sequences: Vec<u64>,
}

/// Parse a payload file name into (session, sequence, extension)
pub fn parse_payload_file_name(name: &str) -> Option<(SessionId, u64, &str)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{5,})-(\d{2,})\.([A-Za-z0-9]+)$").expect("payload name pattern is valid")
    });

    let caps = pattern.captures(name)?;
    let session = caps.get(1)?.as_str().parse().ok()?;
    let sequence = caps.get(2)?.as_str().parse().ok()?;
    let extension = caps.get(3)?.as_str();
    Some((session, sequence, extension))
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Find payload files under `root`
///
/// Looks at `root` itself and one level of subdirectories. Unreadable
/// entries are logged and skipped. Sorted by directory, session, sequence.
pub fn scan_captures(root: &Path) -> io::Result<Vec<CaptureFile>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(SCAN_MAX_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some((session_id, sequence, extension)) = parse_payload_file_name(name) else {
            continue;
        };

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable capture");
                continue;
            }
        };
        let sha256 = match sha256_file(path) {
            Ok(digest) => digest,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable capture");
                continue;
            }
        };

        files.push(CaptureFile {
            path: path.to_path_buf(),
            session_id,
            sequence,
            extension: extension.to_string(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            sha256,
        });
    }

    files.sort_by(|a, b| {
        (a.directory(), a.session_id, a.sequence).cmp(&(b.directory(), b.session_id, b.sequence))
    });
    Ok(files)
}

/// Group files by (directory, session) and report gaps
pub fn summarize(files: &[CaptureFile]) -> Vec<SessionInventory> {
    let mut grouped: BTreeMap<(PathBuf, SessionId), Vec<&CaptureFile>> = BTreeMap::new();
    for file in files {
        grouped
            .entry((file.directory().to_path_buf(), file.session_id))
            .or_default()
            .push(file);
    }

    grouped
        .into_iter()
        .map(|((directory, session_id), group)| {
            let present: BTreeSet<u64> = group.iter().map(|f| f.sequence).collect();
            let (missing_count, missing_sequences) = sequence_gaps(&present);

            SessionInventory {
                directory,
                session_id,
                count: group.len(),
                total_bytes: group.iter().map(|f| f.size).sum(),
                missing_count,
                missing_sequences,
            }
        })
        .collect()
}

/// Count and list the numbers missing from `1..=max(present)`
///
/// Walks adjacent pairs, so a single huge sequence number costs nothing extra.
fn sequence_gaps(present: &BTreeSet<u64>) -> (u64, Vec<u64>) {
    let mut count = 0u64;
    let mut listed = Vec::new();
    let mut previous = 0u64;

    for &sequence in present {
        if sequence > previous + 1 {
            count += sequence - previous - 1;
            let room = MISSING_LIST_LIMIT - listed.len();
            listed.extend((previous + 1..sequence).take(room));
        }
        previous = sequence;
    }

    (count, listed)
}

/// Groups of two or more files with identical contents
///
/// Expected whenever distinct code units carry the same bytes, since capture
/// dedups by identity only.
pub fn content_duplicates(files: &[CaptureFile]) -> Vec<Vec<&CaptureFile>> {
    let mut by_digest: BTreeMap<&str, Vec<&CaptureFile>> = BTreeMap::new();
    for file in files {
        by_digest.entry(file.sha256.as_str()).or_default().push(file);
    }
    by_digest.into_values().filter(|group| group.len() > 1).collect()
}
