use crate::handler::HandlerFault;

/// Errors that can occur in bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sensorhub_transport::TransportError),

    /// Report encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] sensorhub_codec::CodecError),

    /// A publishing device with this name is already registered.
    #[error("{kind} {name:?} is already registered")]
    DuplicateRegistration { kind: &'static str, name: String },

    /// A handler failed while a message was dispatched.
    #[error(transparent)]
    HandlerFault(#[from] HandlerFault),

    /// No handler is registered under this id.
    #[error("no handler registered with id {0}")]
    UnknownHandler(crate::handler::HandlerId),
}

pub type Result<T> = std::result::Result<T, BusError>;
