//! bytecap: capture in-memory code units as they are loaded
//!
//! A host hooks class loading inside a target process and hands every loaded
//! class to a [`capture::CaptureEngine`]. The engine dedups the backing code
//! unit by identity, extracts its bytes and queues them for a background
//! worker that writes one numbered file per unit.

// Dedup, queueing and persistence of captured code units
pub mod capture;

// Target selection, configuration and hook installation
pub mod host;

#[cfg(test)]
mod test_utils;

pub use capture::{CaptureEngine, CaptureOutcome, CodeUnit, CodeUnitAccessor, SessionSummary, WorkerState};
pub use host::config::CaptureConfig;
pub use host::{CaptureHost, InstallOutcome, InterceptionPoint, LoadObserver};
