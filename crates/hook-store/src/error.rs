//! Error types for the store crate.

use thiserror::Error;

use hook_types::HookError;

/// Errors from queue, log and health operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Could not take the queue lock
    #[error("Lock error: {0}")]
    Lock(String),

    /// Invalid entry handed to the store
    #[error(transparent)]
    Types(#[from] HookError),

    /// Some buffered lines could not be written
    #[error("Flush failed for {failed} path(s): {first}")]
    PartialFlush {
        /// Number of destinations that failed
        failed: usize,
        /// First error message
        first: String,
    },
}
