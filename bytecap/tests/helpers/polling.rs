use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const INITIAL_DELAY_MS: u64 = 20;
const MAX_DELAY_MS: u64 = 500;

/// Error returned when waiting for captured files times out.
#[derive(Debug)]
pub struct WaitError {
    dir: PathBuf,
    attempts: u32,
    waited: Duration,
    expected: usize,
    last_seen: Vec<String>,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timed out after {} attempts over {:?} waiting for {} payload file(s) in {}. Last seen: {:?}",
            self.attempts,
            self.waited,
            self.expected,
            self.dir.display(),
            self.last_seen
        )
    }
}

impl std::error::Error for WaitError {}

/// Sorted names of finished payload files (temp files excluded)
pub fn payload_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Poll `dir` until it holds at least `expected` payload files.
///
/// Uses exponential backoff starting at 20ms, capped at 500ms.
pub fn wait_for_file_count<P: AsRef<Path>>(
    dir: P,
    expected: usize,
    timeout: Duration,
) -> Result<Vec<String>, WaitError> {
    let dir = dir.as_ref();
    let start = Instant::now();
    let mut delay = Duration::from_millis(INITIAL_DELAY_MS);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let names = payload_files(dir);
        if names.len() >= expected {
            return Ok(names);
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(WaitError {
                dir: dir.to_path_buf(),
                attempts,
                waited: start.elapsed(),
                expected,
                last_seen: names,
            });
        }

        thread::sleep(delay.min(remaining));
        delay = (delay * 2).min(Duration::from_millis(MAX_DELAY_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wait_for_file_count_returns_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("00001-01.dex"), b"x").unwrap();
        fs::write(temp_dir.path().join(".00001-02.dex.tmp.7"), b"x").unwrap();

        let names = wait_for_file_count(temp_dir.path(), 1, Duration::from_secs(1))
            .expect("file is already there");
        assert_eq!(names, vec!["00001-01.dex"]);
    }

    #[test]
    fn wait_for_file_count_times_out_with_context() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nothing-here");

        let err = wait_for_file_count(&missing, 1, Duration::from_millis(1))
            .expect_err("should time out");
        assert!(err.to_string().contains("nothing-here"));
    }
}
