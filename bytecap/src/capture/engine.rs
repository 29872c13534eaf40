//! CaptureEngine: the single entry point behind the interception point
//!
//! filter -> resolve code unit -> dedup -> extract bytes -> enqueue
//!
//! `capture` only takes in-memory locks, so it returns quickly on whatever
//! application thread performed the load. Every failure is logged and
//! absorbed here.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, trace, warn};

use super::accessor::CodeUnitAccessor;
use super::error::CaptureError;
use super::filter::CaptureFilter;
use super::models::{CaptureOutcome, CapturedPayload, SessionId, SessionSummary, WorkerState};
use super::queue::PushError;
use super::store::PayloadStore;
use super::worker::{join_worker, PersistenceWorker, SessionShared};
use crate::host::config::CaptureConfig;
use crate::host::LoadObserver;

/// One capture session: filter, accessor, dedup set, queue and worker
pub struct CaptureEngine<A: CodeUnitAccessor> {
    session_id: SessionId,
    filter: CaptureFilter,
    accessor: A,
    destination: PathBuf,
    shared: Arc<SessionShared>,
    worker: Mutex<Option<JoinHandle<SessionSummary>>>,
}

impl<A: CodeUnitAccessor> CaptureEngine<A> {
    /// Build a session and start its worker
    ///
    /// Returns once the worker has either verified `destination` (Running)
    /// or given up on it (Terminated).
    pub fn start(
        session_id: SessionId,
        config: &CaptureConfig,
        destination: impl Into<PathBuf>,
        accessor: A,
    ) -> Self {
        let destination = destination.into();
        let shared = Arc::new(SessionShared::new(config.queue_capacity));

        let worker = PersistenceWorker::new(
            session_id,
            PayloadStore::new(&destination, session_id, config.file_extension.as_str()),
            Arc::clone(&shared),
            config.idle_timeout(),
        );
        let (state, handle) = worker.spawn();
        debug!(session = session_id, ?state, "capture session started");

        Self {
            session_id,
            filter: CaptureFilter::new(config.skip_prefixes.iter().cloned()),
            accessor,
            destination,
            shared,
            worker: Mutex::new(handle),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state.get()
    }

    /// Number of distinct code units captured so far in this session
    pub fn identities_seen(&self) -> usize {
        self.shared.dedup.len()
    }

    /// Handle one successfully loaded class
    pub fn capture(&self, class: &A::Class) -> CaptureOutcome {
        let name = self.accessor.class_name(class);
        if self.filter.should_skip(name.as_deref()) {
            trace!(session = self.session_id, class = ?name, "class filtered");
            return CaptureOutcome::Filtered;
        }
        let class_name = name.unwrap_or_default();

        if self.state() == WorkerState::Terminated {
            self.report_drop(&class_name, CaptureError::SessionTerminated {
                session_id: self.session_id,
            });
            return CaptureOutcome::Dropped;
        }

        let unit = match self.accessor.resolve_code_unit(class) {
            Ok(Some(unit)) => unit,
            Ok(None) => return CaptureOutcome::NoCodeUnit,
            Err(e) => {
                self.report_drop(&class_name, e.into());
                return CaptureOutcome::NoCodeUnit;
            }
        };

        // Marked before extraction: a unit whose bytes can't be read is not retried
        if !self.shared.dedup.check_and_mark(&unit) {
            trace!(session = self.session_id, class = %class_name, ?unit, "code unit already captured");
            return CaptureOutcome::Duplicate;
        }

        // The worker may have terminated and cleared the set since the check above
        if self.state() == WorkerState::Terminated {
            self.shared.dedup.forget(&unit);
            self.report_drop(&class_name, CaptureError::SessionTerminated {
                session_id: self.session_id,
            });
            return CaptureOutcome::Dropped;
        }

        let bytes = match self.accessor.extract_bytes(&unit) {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => {
                debug!(session = self.session_id, class = %class_name, "code unit has no bytes");
                return CaptureOutcome::NoBytes;
            }
            Err(e) => {
                self.report_drop(&class_name, e.into());
                return CaptureOutcome::NoBytes;
            }
        };

        if self.state() != WorkerState::Running {
            self.report_drop(&class_name, CaptureError::SessionTerminated {
                session_id: self.session_id,
            });
            return CaptureOutcome::Dropped;
        }

        let len = bytes.len();
        match self.shared.queue.push(CapturedPayload::new(class_name.as_str(), bytes)) {
            Ok(depth) => {
                debug!(session = self.session_id, class = %class_name, bytes = len, depth, "payload queued");
                CaptureOutcome::Enqueued
            }
            Err(PushError::Closed) => {
                self.report_drop(&class_name, CaptureError::SessionTerminated {
                    session_id: self.session_id,
                });
                CaptureOutcome::Dropped
            }
            Err(PushError::Full { capacity }) => {
                self.report_drop(&class_name, CaptureError::QueueFull {
                    session_id: self.session_id,
                    capacity,
                });
                CaptureOutcome::Dropped
            }
        }
    }

    fn report_drop(&self, class_name: &str, err: CaptureError) {
        warn!(session = self.session_id, class = %class_name, error = %err, "capture dropped");
    }

    /// Wait for the worker to exit and return its counters
    ///
    /// Blocks for up to the idle timeout after the last payload. Returns
    /// `None` if the worker was never spawned or was already joined.
    pub fn summary(&self) -> Option<SessionSummary> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        match join_worker(handle) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(session = self.session_id, error = %e, "could not collect session summary");
                None
            }
        }
    }
}

impl<A: CodeUnitAccessor> LoadObserver<A::Class> for CaptureEngine<A> {
    fn after_load(&self, loaded: Option<&A::Class>) {
        if let Some(class) = loaded {
            self.capture(class);
        }
    }
}

impl<A: CodeUnitAccessor> std::fmt::Debug for CaptureEngine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("session_id", &self.session_id)
            .field("destination", &self.destination)
            .field("state", &self.state())
            .finish()
    }
}
