//! Error types for the repository and its snapshot stores.

use thiserror::Error;

/// Failures surfaced by repository operations.
///
/// All variants are recoverable from the caller's point of view; the API
/// layer maps them to distinct response codes and the CLI to messages.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The target id does not exist.
    #[error("no work item with id {0}")]
    NotFound(u64),

    /// A subtask names an epic that does not exist. Kept distinct from
    /// `NotFound`: the missing id is a reference, not the operation target.
    #[error("subtask references missing epic {0}")]
    DanglingEpic(u64),

    /// The candidate's scheduled interval overlaps an existing one.
    #[error("schedule conflict with work item {0}")]
    ScheduleConflict(u64),

    /// The snapshot store failed while persisting or restoring.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures in the snapshot persistence adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot file or blob is structurally invalid.
    #[error("malformed snapshot at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("kv server request failed: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("kv payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        StoreError::Format {
            line,
            message: message.into(),
        }
    }
}
