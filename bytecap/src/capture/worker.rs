//! Persistence worker: one background thread per capture session
//!
//! # Lifecycle
//!
//! 1. Verify/create the destination directory. On failure the session goes
//!    straight to `Terminated` and every later capture is a no-op.
//! 2. Loop: take the oldest payload, give it the next sequence number, write
//!    it. A failed write drops that payload and leaves a gap in the numbering.
//! 3. When the queue stays empty for the whole idle timeout, close it, clear
//!    the queue and the dedup set, and exit.
//!
//! The sequence counter and the store live on the worker thread alone.

use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::dedup::CaptureDeduplicator;
use super::models::{SessionId, SessionSummary, StateCell, WorkerState};
use super::queue::PersistenceQueue;
use super::store::PayloadStore;

/// State shared between producers and the worker for one session
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) state: StateCell,
    pub(crate) queue: PersistenceQueue,
    pub(crate) dedup: CaptureDeduplicator,
}

impl SessionShared {
    pub(crate) fn new(queue_capacity: Option<usize>) -> Self {
        Self {
            state: StateCell::new(WorkerState::NotStarted),
            queue: PersistenceQueue::new(queue_capacity),
            dedup: CaptureDeduplicator::new(),
        }
    }

    /// Close everything down; safe to call more than once
    fn terminate(&self) -> (usize, usize) {
        self.state.advance(WorkerState::Terminated);
        let discarded = self.queue.close();
        let identities = self.dedup.clear();
        (discarded, identities)
    }
}

pub(crate) struct PersistenceWorker {
    session_id: SessionId,
    store: PayloadStore,
    shared: Arc<SessionShared>,
    idle_timeout: Duration,
    sequence: u64,
    written: u64,
    failed: u64,
}

impl PersistenceWorker {
    pub(crate) fn new(
        session_id: SessionId,
        store: PayloadStore,
        shared: Arc<SessionShared>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            store,
            shared,
            idle_timeout,
            sequence: 0,
            written: 0,
            failed: 0,
        }
    }

    /// Start the worker thread and wait until it is Running or Terminated
    ///
    /// If the thread can't be spawned the session is terminated on the spot.
    pub(crate) fn spawn(self) -> (WorkerState, Option<JoinHandle<SessionSummary>>) {
        let session_id = self.session_id;
        let shared = Arc::clone(&self.shared);
        let (ready_tx, ready_rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name(format!("bytecap-{:05}", session_id))
            .spawn(move || self.run(ready_tx));

        match spawned {
            Ok(handle) => {
                // A closed channel means the worker died before reporting
                let state = ready_rx.recv().unwrap_or(WorkerState::Terminated);
                (state, Some(handle))
            }
            Err(e) => {
                error!(session = session_id, error = %e, "failed to spawn persistence worker");
                shared.terminate();
                (WorkerState::Terminated, None)
            }
        }
    }

    fn run(mut self, ready: mpsc::Sender<WorkerState>) -> SessionSummary {
        if let Err(e) = self.store.ensure_dir() {
            error!(session = self.session_id, error = %e, "session disabled");
            self.shared.terminate();
            let _ = ready.send(WorkerState::Terminated);
            return self.summary(0, 0);
        }

        let state = self.shared.state.advance(WorkerState::Running);
        let _ = ready.send(state);
        drop(ready);

        info!(
            session = self.session_id,
            dir = %self.store.dir().display(),
            idle_timeout = ?self.idle_timeout,
            "persistence worker running"
        );

        match self.store.cleanup_stale_temps() {
            Ok((deleted, _, _)) if deleted > 0 => {
                debug!(session = self.session_id, deleted, "removed stale temp files");
            }
            Ok(_) => {}
            Err(e) => warn!(session = self.session_id, error = %e, "temp cleanup failed"),
        }

        while let Some(payload) = self.shared.queue.pop_or_wait(self.idle_timeout) {
            // Consumed even if the write fails, so one bad name can't stall the session
            self.sequence += 1;
            let sequence = self.sequence;
            match self.store.write_payload(sequence, payload.as_bytes()) {
                Ok(path) => {
                    self.written += 1;
                    info!(
                        session = self.session_id,
                        sequence,
                        class = payload.class_name(),
                        bytes = payload.len(),
                        path = %path.display(),
                        "captured payload written"
                    );
                }
                Err(e) => {
                    self.failed += 1;
                    error!(
                        session = self.session_id,
                        sequence,
                        class = payload.class_name(),
                        error = %e,
                        "dropping payload"
                    );
                }
            }
        }

        let (discarded, identities) = self.shared.terminate();
        let summary = self.summary(identities, discarded);
        info!(
            session = self.session_id,
            written = summary.written,
            failed = summary.failed,
            identities = summary.identities_seen,
            discarded = summary.discarded,
            "persistence worker idle, session terminated"
        );
        summary
    }

    fn summary(&self, identities_seen: usize, discarded: usize) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            written: self.written,
            failed: self.failed,
            identities_seen,
            discarded,
        }
    }
}

/// Convert a worker thread panic into an io error for reporting
pub(crate) fn join_worker(handle: JoinHandle<SessionSummary>) -> io::Result<SessionSummary> {
    handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "persistence worker panicked"))
}
