//! Error types for the hook runtime.

use thiserror::Error;

/// Unified error type for shared hook types.
#[derive(Debug, Error)]
pub enum HookError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed queue entry or event payload
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// IO error while resolving paths
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HookError::Config("bad ratio".to_string());
        assert!(err.to_string().contains("Configuration error"));

        let err = HookError::InvalidPayload("missing name".to_string());
        assert!(err.to_string().contains("Invalid payload: missing name"));
    }

    #[test]
    fn test_serde_error_from() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: HookError = serde_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
