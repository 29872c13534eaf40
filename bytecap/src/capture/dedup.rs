//! Per-session record of which code units have already been captured

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::models::CodeUnit;

/// Identity-keyed set guarded by its own lock
///
/// This lock is never held while the queue lock is taken.
#[derive(Debug, Default)]
pub struct CaptureDeduplicator {
    seen: Mutex<HashSet<CodeUnit>>,
}

impl CaptureDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<CodeUnit>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seen(&self, unit: &CodeUnit) -> bool {
        self.lock().contains(unit)
    }

    pub fn mark_seen(&self, unit: &CodeUnit) {
        self.lock().insert(unit.clone());
    }

    /// Check and mark in one critical section
    ///
    /// Returns true for exactly one caller per identity; everyone racing on the
    /// same unit afterwards gets false.
    pub fn check_and_mark(&self, unit: &CodeUnit) -> bool {
        let mut seen = self.lock();
        if seen.contains(unit) {
            return false;
        }
        seen.insert(unit.clone())
    }

    /// Remove one identity; true if it was present
    pub fn forget(&self, unit: &CodeUnit) -> bool {
        self.lock().remove(unit)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry, releasing the held code units
    pub fn clear(&self) -> usize {
        let mut seen = self.lock();
        let count = seen.len();
        seen.clear();
        seen.shrink_to_fit();
        count
    }
}
