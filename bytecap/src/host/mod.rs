//! Host side: where capture sessions get installed
//!
//! The hooking framework is reached only through [`InterceptionPoint`]; the
//! engine is handed to it as a [`LoadObserver`]. Nothing here is global, so a
//! session's lifetime is whatever the caller keeps alive.

pub mod config;
pub mod target;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::capture::{AccessorError, CaptureEngine, CodeUnitAccessor, SessionId, WorkerState};
use config::CaptureConfig;
use target::{ClassProbe, TargetSelector};

/// Callback run by the interception point after every class-load attempt
///
/// `None` means the load failed.
pub trait LoadObserver<C>: Send + Sync {
    fn after_load(&self, loaded: Option<&C>);
}

/// Failure to install a load hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook target {target} not found: {detail}")]
    TargetNotFound { target: String, detail: String },

    #[error("hook installation rejected: {0}")]
    Rejected(String),
}

/// The host's class-loading hook
pub trait InterceptionPoint<C> {
    fn install(&self, observer: Arc<dyn LoadObserver<C>>) -> Result<(), HookError>;
}

/// Result of offering a freshly loaded package to the host
#[derive(Debug)]
pub enum InstallOutcome<A: CodeUnitAccessor> {
    /// Package is not one we capture from
    NotTargeted,
    /// No known packer entry class in this package
    NoPackedEntry,
    /// The accessor could not be built for this runtime
    AccessorUnavailable,
    /// The interception point refused the hook
    HookFailed,
    /// Capture session running behind the installed hook
    Installed(Arc<CaptureEngine<A>>),
}

impl<A: CodeUnitAccessor> InstallOutcome<A> {
    pub fn engine(&self) -> Option<&Arc<CaptureEngine<A>>> {
        match self {
            InstallOutcome::Installed(engine) => Some(engine),
            _ => None,
        }
    }
}

/// Creates one capture session per qualifying package load
#[derive(Debug)]
pub struct CaptureHost {
    config: CaptureConfig,
    selector: TargetSelector,
    next_session: AtomicU64,
}

impl CaptureHost {
    pub fn new(config: CaptureConfig) -> Self {
        let selector =
            TargetSelector::new(config.target_packages.clone(), config.packed_entries.clone());
        // Process id keeps file names from colliding with a previous run
        let base = config
            .session_id_base
            .unwrap_or_else(|| SessionId::from(std::process::id()));

        Self {
            config,
            selector,
            next_session: AtomicU64::new(base),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    /// Allocate a new session ID
    pub fn allocate_session_id(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }

    /// Start capturing from `package` if it qualifies
    ///
    /// Checks the target list, then probes for a packer entry class, builds
    /// the accessor, starts a new session and installs it on `interception`.
    /// Every failure is logged and reported through the outcome.
    pub fn on_package_loaded<A, P, I, F>(
        &self,
        package: &str,
        probe: &P,
        interception: &I,
        make_accessor: F,
    ) -> InstallOutcome<A>
    where
        A: CodeUnitAccessor,
        P: ClassProbe + ?Sized,
        I: InterceptionPoint<A::Class> + ?Sized,
        F: FnOnce() -> Result<A, AccessorError>,
    {
        if !self.selector.is_target(package) {
            return InstallOutcome::NotTargeted;
        }
        info!(package, "target package loaded");

        if self.selector.requires_packed_entry() {
            match self.selector.find_packed_entry(probe) {
                Some(entry) => info!(package, entry, "found packer entry"),
                None => return InstallOutcome::NoPackedEntry,
            }
        }

        let accessor = match make_accessor() {
            Ok(accessor) => accessor,
            Err(e) => {
                warn!(package, error = %e, "code unit accessor unavailable");
                return InstallOutcome::AccessorUnavailable;
            }
        };

        let session_id = self.allocate_session_id();
        let engine = Arc::new(CaptureEngine::start(
            session_id,
            &self.config,
            self.config.destination_for(package),
            accessor,
        ));

        // A session that failed to start still gets installed: it drops
        // everything, which is the same as not capturing at all.
        if engine.state() != WorkerState::Running {
            warn!(package, session = session_id, "capture session is not running");
        }

        let observer: Arc<dyn LoadObserver<A::Class>> = engine.clone();
        match interception.install(observer) {
            Ok(()) => {
                info!(package, session = session_id, dir = %engine.destination().display(), "load hook installed");
                InstallOutcome::Installed(engine)
            }
            Err(e) => {
                error!(package, session = session_id, error = %e, "failed to install load hook");
                InstallOutcome::HookFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CodeUnit;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NullAccessor;

    impl CodeUnitAccessor for NullAccessor {
        type Class = String;

        fn class_name(&self, class: &String) -> Option<String> {
            Some(class.clone())
        }

        fn resolve_code_unit(&self, _class: &String) -> Result<Option<CodeUnit>, AccessorError> {
            Ok(None)
        }

        fn extract_bytes(&self, _unit: &CodeUnit) -> Result<Option<Vec<u8>>, AccessorError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        installed: Mutex<Vec<Arc<dyn LoadObserver<String>>>>,
        reject: bool,
    }

    impl InterceptionPoint<String> for RecordingHook {
        fn install(&self, observer: Arc<dyn LoadObserver<String>>) -> Result<(), HookError> {
            if self.reject {
                return Err(HookError::TargetNotFound {
                    target: "java.lang.ClassLoader#loadClass".to_string(),
                    detail: "no such method".to_string(),
                });
            }
            self.installed.lock().unwrap().push(observer);
            Ok(())
        }
    }

    fn host(temp_dir: &TempDir) -> CaptureHost {
        let mut config = CaptureConfig::default()
            .with_output_root(temp_dir.path())
            .with_idle_timeout(Duration::from_secs(30));
        config.target_packages = vec!["com.example.packed".to_string()];
        config.session_id_base = Some(1);
        CaptureHost::new(config)
    }

    fn packed(name: &str) -> bool {
        name == "com.stub.StubApp"
    }

    #[test]
    fn test_non_target_package_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let hook = RecordingHook::default();

        let outcome = host(&temp_dir).on_package_loaded("com.other", &packed, &hook, || Ok(NullAccessor));
        assert!(matches!(outcome, InstallOutcome::NotTargeted));
        assert!(hook.installed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unpacked_target_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let hook = RecordingHook::default();
        let probe = |_: &str| false;

        let outcome = host(&temp_dir).on_package_loaded("com.example.packed", &probe, &hook, || Ok(NullAccessor));
        assert!(matches!(outcome, InstallOutcome::NoPackedEntry));
    }

    #[test]
    fn test_install_creates_session_per_load() {
        let temp_dir = TempDir::new().unwrap();
        let hook = RecordingHook::default();
        let host = host(&temp_dir);

        let first = host.on_package_loaded("com.example.packed", &packed, &hook, || Ok(NullAccessor));
        let second = host.on_package_loaded("com.example.packed", &packed, &hook, || Ok(NullAccessor));

        let first = first.engine().expect("first install");
        let second = second.engine().expect("second install");
        assert_eq!(first.session_id(), 1);
        assert_eq!(second.session_id(), 2);
        assert_eq!(first.destination(), temp_dir.path().join("com.example.packed"));
        assert_eq!(first.state(), WorkerState::Running);
        assert_eq!(hook.installed.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_accessor_failure_skips_install() {
        let temp_dir = TempDir::new().unwrap();
        let hook = RecordingHook::default();

        let outcome = host(&temp_dir).on_package_loaded("com.example.packed", &packed, &hook, || {
            Err::<NullAccessor, _>(AccessorError::unsupported("getDex", "API level 28"))
        });
        assert!(matches!(outcome, InstallOutcome::AccessorUnavailable));
        assert!(hook.installed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_hook_failure_reported() {
        let temp_dir = TempDir::new().unwrap();
        let hook = RecordingHook {
            reject: true,
            ..Default::default()
        };

        let outcome = host(&temp_dir).on_package_loaded("com.example.packed", &packed, &hook, || Ok(NullAccessor));
        assert!(matches!(outcome, InstallOutcome::HookFailed));
    }

    #[test]
    fn test_empty_packed_entries_skip_probe() {
        let temp_dir = TempDir::new().unwrap();
        let hook = RecordingHook::default();
        let mut config = host(&temp_dir).config().clone();
        config.packed_entries.clear();
        let host = CaptureHost::new(config);
        let probe = |_: &str| false;

        let outcome = host.on_package_loaded("com.example.packed", &probe, &hook, || Ok(NullAccessor));
        assert!(outcome.engine().is_some());
    }
}
