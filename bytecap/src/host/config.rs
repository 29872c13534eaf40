// Capture configuration
// Defaults, an optional JSON file, then environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::filter::DEFAULT_SKIP_PREFIXES;
use crate::capture::SessionId;

/// Default idle time before a session's worker shuts itself down (5 minutes)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default payload file extension
pub const DEFAULT_FILE_EXTENSION: &str = "dex";

/// Entry classes of common packers, matched against the app's class loader
pub const DEFAULT_PACKED_ENTRIES: &[&str] = &[
    "com.stub.StubApp",
    "s.h.e.l.l.S",
    "com.secneo.apkwrapper.ApplicationWrapper",
    "com.SecShell.SecShell.ApplicationWrapper",
    "com.secneo.apkwrapper.AW",
    "com.tencent.StubShell.TxAppEntry",
    "com.baidu.protect.StubApplication",
];

/// Configuration for capture sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Class-name prefixes never captured
    pub skip_prefixes: Vec<String>,
    /// Idle seconds before a session terminates
    pub idle_timeout_secs: u64,
    /// Sub-second override of `idle_timeout_secs`, not serialized
    #[serde(skip)]
    pub idle_timeout_override: Option<Duration>,
    /// Root holding one directory per target application
    pub output_root: Option<PathBuf>,
    /// Extension of payload files
    pub file_extension: String,
    /// Maximum queued payloads per session (None = unbounded)
    pub queue_capacity: Option<usize>,
    /// Packages to capture from
    pub target_packages: Vec<String>,
    /// Packer entry classes; a hook is only installed when one is present
    pub packed_entries: Vec<String>,
    /// First session id handed out (None = derived from the process id)
    pub session_id_base: Option<SessionId>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: DEFAULT_SKIP_PREFIXES.iter().map(|s| s.to_string()).collect(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            idle_timeout_override: None,
            output_root: None,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            queue_capacity: None,
            target_packages: Vec::new(),
            packed_entries: DEFAULT_PACKED_ENTRIES.iter().map(|s| s.to_string()).collect(),
            session_id_base: None,
        }
    }
}

impl CaptureConfig {
    /// Load configuration from the environment, falling back to defaults
    ///
    /// `BYTECAP_CONFIG` names a JSON file; `BYTECAP_OUTPUT_DIR`,
    /// `BYTECAP_IDLE_TIMEOUT_SECS` and `BYTECAP_TARGETS` (comma separated)
    /// override individual fields.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os("BYTECAP_CONFIG") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var("BYTECAP_OUTPUT_DIR") {
            config.output_root = Some(PathBuf::from(dir));
        }

        if let Ok(secs) = std::env::var("BYTECAP_IDLE_TIMEOUT_SECS") {
            config.idle_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid BYTECAP_IDLE_TIMEOUT_SECS: {}", secs))?;
        }

        if let Ok(targets) = std::env::var("BYTECAP_TARGETS") {
            config.target_packages = targets
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Builder-style idle timeout, allowing sub-second values
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout_secs = idle.as_secs();
        self.idle_timeout_override = Some(idle);
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout_override
            .unwrap_or_else(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Root directory for captured payloads
    pub fn output_root(&self) -> PathBuf {
        self.output_root
            .clone()
            .unwrap_or_else(Self::default_output_root)
    }

    /// Destination directory for one target application
    pub fn destination_for(&self, package: &str) -> PathBuf {
        self.output_root().join(package)
    }

    fn default_output_root() -> PathBuf {
        #[cfg(target_os = "android")]
        {
            // The app's own data directory is writable from inside its process
            PathBuf::from("/data/data")
        }

        #[cfg(not(target_os = "android"))]
        {
            dirs::data_local_dir()
                .map(|d| d.join("bytecap"))
                .unwrap_or_else(|| std::env::temp_dir().join("bytecap"))
        }
    }
}
