//! Error types for VRLink

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// VRLink error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// End of stream hit while a typed wire field was still being read
    #[error("stream closed while reading {field}")]
    StreamClosed {
        /// Name of the wire field that was being read
        field: &'static str,
    },

    /// Communication timeout
    #[error("communication timeout")]
    Timeout,

    /// Session id that is not canonical UUID text
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// String too long for a one-byte length prefix
    #[error("string of {0} bytes exceeds the 255-byte wire limit")]
    StringTooLong(usize),

    /// Texture with unusable dimensions or pixel payload
    #[error("invalid texture: {0}")]
    InvalidTexture(String),
}
