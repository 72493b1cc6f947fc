//! Operation-level error taxonomy

use thiserror::Error;

/// Errors surfaced to callers of coport operations
///
/// `WouldBlock` is retryable, `BrokenPipe` is terminal for the handle, and
/// `InvalidArgument` indicates a programming error (or a forged handle) and
/// is not retryable.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum IpcError {
    /// Bad, forged, or out-of-bounds handle, or a malformed request
    #[error("Invalid argument")]
    InvalidArgument,

    /// Buffer too small or message too large for the operation
    #[error("Message size out of bounds for operation")]
    MessageSize,

    /// No capacity or no data; the operation would need to wait
    #[error("Operation would block")]
    WouldBlock,

    /// Endpoint is closed or closing
    #[error("Endpoint closed")]
    BrokenPipe,

    /// Coport table or message arena exhausted
    #[error("Resource exhausted")]
    ResourceExhausted,

    /// Endpoint name exceeds the namespace limit
    #[error("Name too long")]
    NameTooLong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", IpcError::WouldBlock), "Operation would block");
        assert_eq!(format!("{}", IpcError::BrokenPipe), "Endpoint closed");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(IpcError::MessageSize, IpcError::MessageSize);
        assert_ne!(IpcError::WouldBlock, IpcError::BrokenPipe);
    }
}
