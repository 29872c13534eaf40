//! FIFO hand-off from load threads to the session's persistence worker
//!
//! One mutex plus one condition variable. Producers only ever hold the lock
//! for a push; the worker sleeps on the condvar with the idle timeout.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::models::CapturedPayload;

/// Why a push was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The worker has terminated; nothing will drain this queue again
    Closed,
    /// The configured bound was reached
    Full { capacity: usize },
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<CapturedPayload>,
    closed: bool,
}

#[derive(Debug)]
pub struct PersistenceQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: Option<usize>,
}

impl PersistenceQueue {
    /// `capacity: None` leaves the queue unbounded
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a payload and wake the worker; returns the new depth
    pub fn push(&self, payload: CapturedPayload) -> Result<usize, PushError> {
        let depth = {
            let mut state = self.lock();
            if state.closed {
                return Err(PushError::Closed);
            }
            if let Some(capacity) = self.capacity {
                if state.items.len() >= capacity {
                    return Err(PushError::Full { capacity });
                }
            }
            state.items.push_back(payload);
            state.items.len()
        };
        self.available.notify_one();
        Ok(depth)
    }

    /// Take the oldest payload, waiting up to `idle` for one to show up
    ///
    /// Returns `None` once `idle` has fully elapsed with nothing delivered, or
    /// if the queue was already closed. On timeout the queue is closed before
    /// the lock is released, so a producer either lands its item before the
    /// decision or sees `Closed`. Wakeups that bring no item re-wait for
    /// whatever is left of the deadline.
    pub fn pop_or_wait(&self, idle: Duration) -> Option<CapturedPayload> {
        let mut state = self.lock();
        let deadline = Instant::now().checked_add(idle);

        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }

            state = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        state.closed = true;
                        return None;
                    }
                    self.available
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                // Too far in the future to represent; effectively never idle
                None => self
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Refuse further pushes and discard anything still queued
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            state.closed = true;
            let discarded = state.items.len();
            state.items.clear();
            state.items.shrink_to_fit();
            discarded
        };
        self.available.notify_all();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}
