//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed or unserializable JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Line length exceeds maximum allowed size
    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    /// I/O error during line operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_too_long_error() {
        let err = ProtocolError::LineTooLong {
            size: 10_000_000,
            max: 1_000_000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Line too long"));
        assert!(msg.contains("10000000"));
    }
}
