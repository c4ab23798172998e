use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The transport refused to register a type or sender name.
    #[error("rejected {kind} name {name:?}: {reason}")]
    Rejected {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// An id was used that this transport never handed out.
    #[error("unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: u32 },

    /// Encoding or decoding a wire message failed.
    #[error("wire codec error: {0}")]
    Codec(#[from] sensorhub_codec::CodecError),

    /// The remote end closed the stream.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The bounded publish queue is full.
    #[error("publish queue full")]
    QueueFull,

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
