//! Error types for the wire layer.

use thiserror::Error;

/// Errors raised while framing or encoding lines.
///
/// A decode error is a transport error: the connection that produced it
/// cannot be resynchronised and should be torn down.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A line grew past the configured maximum without a terminator.
    #[error("line exceeds maximum length of {max} bytes")]
    LineTooLong {
        /// Configured limit in bytes.
        max: usize,
    },

    /// Underlying I/O failure (includes invalid UTF-8 on the wire).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound frame could not be serialised.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
