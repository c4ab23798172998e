//! Connection transports for sensorhub.
//!
//! A [`Transport`] registers message type and sender names, carries encoded
//! payloads, and reports what arrived each time it is pumped. Provided here:
//! - [`LoopbackTransport`], in-process delivery with a bounded cross-thread
//!   [`Publisher`]
//! - [`StreamTransport`], framed messages over any byte stream
//! - [`UnixDomainSocket`], a listener producing stream transports (Unix only)

pub mod error;
pub mod loopback;
pub mod names;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackTransport, Publisher, DEFAULT_PUBLISH_QUEUE};
pub use names::{NameTable, MAX_NAME_LEN};
pub use stream::{StreamConfig, StreamTransport};
pub use traits::{Delivery, MessageTypeId, SenderId, Transport, TransportEvent};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
