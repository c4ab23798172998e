/// Errors that can occur while encoding or decoding values and wire frames.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Decoding needed more bytes than the buffer holds.
    #[error("truncated buffer (needed {needed} bytes, {remaining} remaining)")]
    TruncatedBuffer { needed: usize, remaining: usize },

    /// A length-prefixed value is too long for its 32-bit length field.
    #[error("value too long to encode ({len} bytes, max {max})")]
    LengthOverflow { len: usize, max: usize },

    /// A decoded string was not valid UTF-8.
    #[error("invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5348 \"SH\")")]
    InvalidMagic,

    /// The frame body exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A frame body decoded cleanly but left unread bytes behind.
    #[error("trailing bytes after frame body ({0} bytes)")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, CodecError>;
