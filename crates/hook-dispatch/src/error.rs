//! Error types for registry setup and handler execution.

use thiserror::Error;

use hook_store::StoreError;
use hook_types::{EventType, HookError};

/// Registry configuration errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Two handlers share a name under one event type
    #[error("Duplicate handler '{name}' for {event_type}")]
    DuplicateHandler {
        /// Event type the duplicate was registered under
        event_type: EventType,
        /// Handler name
        name: String,
    },

    /// Handler name is empty
    #[error("Handler name must not be empty")]
    EmptyName,
}

/// Error raised inside one handler. Always isolated by the dispatcher.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Generic handler failure
    #[error("Handler failed: {0}")]
    Failed(String),

    /// Store failure (queue, logs)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid shared type
    #[error(transparent)]
    Types(#[from] HookError),
}

impl HandlerError {
    /// Create a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
