use sensorhub_bus::BusError;
use sensorhub_path::PathError;
use sensorhub_transport::TransportError;

/// Errors from the server side.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// A driver with this name is already loaded.
    #[error("driver {0:?} is already loaded")]
    DuplicateDriver(String),

    #[error("no driver named {0:?}")]
    UnknownDriver(String),
}

impl ServerError {
    /// True when the client on the other end went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Bus(BusError::Transport(TransportError::ConnectionClosed))
        )
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
