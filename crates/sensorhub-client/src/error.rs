/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Path or route handling failed.
    #[error("path error: {0}")]
    Path(#[from] sensorhub_path::PathError),

    /// Bus-level error.
    #[error("bus error: {0}")]
    Bus(#[from] sensorhub_bus::BusError),

    /// Report encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] sensorhub_codec::CodecError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sensorhub_transport::TransportError),

    /// No report of this type has arrived on the interface yet, or the type
    /// does not retain state.
    #[error("no {report} state yet on {path}")]
    NoStateYet { path: String, report: &'static str },

    /// The interface's context has been destroyed.
    #[error("interface {0} is detached from its context")]
    Detached(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
