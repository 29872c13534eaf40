//! Error taxonomy for the capture engine
//!
//! None of these ever reach the monitored application: the engine logs them
//! and carries on (or, for directory failures, goes quiet for the session).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::accessor::AccessorError;
use super::models::SessionId;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Resolving a code unit or its bytes failed
    #[error("code unit accessor failed: {0}")]
    Accessor(#[from] AccessorError),

    /// The session's destination directory could not be created
    #[error("cannot create destination directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing a single payload file failed
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A payload arrived after the session's worker stopped
    #[error("session {session_id:05} is not running")]
    SessionTerminated { session_id: SessionId },

    /// The bounded queue is at capacity
    #[error("session {session_id:05} queue is full ({capacity} payloads)")]
    QueueFull {
        session_id: SessionId,
        capacity: usize,
    },
}

pub type Result<T> = std::result::Result<T, CaptureError>;
