//! Capture engine
//!
//! Deduplicates loaded code units by identity, hands their bytes to a
//! background worker without blocking the load path, and persists them as
//! sequentially named files until the session idles out.

pub mod accessor;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod models;
pub mod queue;
pub mod store;
pub(crate) mod worker;

// Re-export key types
pub use accessor::{AccessorError, CodeUnitAccessor};
pub use engine::CaptureEngine;
pub use error::CaptureError;
pub use filter::CaptureFilter;
pub use models::{CaptureOutcome, CapturedPayload, CodeUnit, SessionId, SessionSummary, WorkerState};
