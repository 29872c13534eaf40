//! Capture data model: code-unit identities, payloads and session state

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable per-worker identifier, rendered as the `{:05}` prefix of file names
pub type SessionId = u64;

/// Opaque, identity-compared reference to a loaded code container
///
/// Two units are equal only if they wrap the same allocation. Holding a
/// `CodeUnit` keeps that allocation alive, so an address can't be recycled
/// for a different unit while it sits in a dedup set.
#[derive(Clone)]
pub struct CodeUnit {
    handle: Arc<dyn Any + Send + Sync>,
}

impl CodeUnit {
    /// Wrap a shared runtime handle
    pub fn new<T: Any + Send + Sync>(handle: Arc<T>) -> Self {
        Self { handle }
    }

    /// Wrap an owned value in a fresh allocation (always a new identity)
    pub fn from_value<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Borrow the underlying handle as a concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.handle) as *const () as usize
    }
}

impl PartialEq for CodeUnit {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for CodeUnit {}

impl Hash for CodeUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeUnit({:#x})", self.address())
    }
}

/// Raw bytes extracted from a code unit, waiting to be persisted
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedPayload {
    /// Name of the class whose load produced this payload
    class_name: String,
    bytes: Box<[u8]>,
}

impl CapturedPayload {
    pub fn new(class_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            class_name: class_name.into(),
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CapturedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedPayload")
            .field("class_name", &self.class_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Lifecycle of a persistence worker
///
/// `NotStarted -> Running -> Terminated`, or straight to `Terminated` when the
/// destination directory can't be created. There is no way back out of
/// `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    NotStarted,
    Running,
    Terminated,
}

impl WorkerState {
    fn as_u8(self) -> u8 {
        match self {
            WorkerState::NotStarted => 0,
            WorkerState::Running => 1,
            WorkerState::Terminated => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::NotStarted,
            1 => WorkerState::Running,
            _ => WorkerState::Terminated,
        }
    }
}

/// Lock-free cell holding a [`WorkerState`], read on every capture
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`, refusing to leave `Terminated`
    pub(crate) fn advance(&self, next: WorkerState) -> WorkerState {
        let result = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == WorkerState::Terminated.as_u8() {
                    None
                } else {
                    Some(next.as_u8())
                }
            });
        match result {
            Ok(_) => next,
            Err(current) => WorkerState::from_u8(current),
        }
    }
}

/// What happened to a single load event handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureOutcome {
    /// Payload queued for persistence
    Enqueued,
    /// The load failed; there was no class to look at
    FailedLoad,
    /// Class name absent or inside a reserved namespace
    Filtered,
    /// The accessor produced no code unit (or failed to)
    NoCodeUnit,
    /// This code unit was already captured in the current session
    Duplicate,
    /// The accessor produced no bytes, or an empty payload
    NoBytes,
    /// The session is not running, or the queue refused the payload
    Dropped,
}

/// Counters reported when a session's worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    /// Files successfully written
    pub written: u64,
    /// Payloads dropped because their write failed
    pub failed: u64,
    /// Distinct code units seen during the session
    pub identities_seen: usize,
    /// Payloads still queued when the session ended
    pub discarded: usize,
}
