//! CAN bus error types.

use thiserror::Error;

/// Errors that can occur while encoding, decoding, or transmitting frames.
#[derive(Debug, Error)]
pub enum CanError {
    #[error("CAN interface error: {0}")]
    Interface(String),

    #[error("Send timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("CAN I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for CAN bus results.
pub type CanResult<T> = Result<T, CanError>;
