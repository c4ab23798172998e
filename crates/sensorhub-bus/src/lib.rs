//! Connection-level message bus.
//!
//! A [`ConnectionBus`] sits on one [`Transport`](sensorhub_transport::Transport):
//! it registers message types and publishing devices, and on each
//! [`poll`](ConnectionBus::poll) hands every delivered message to the handlers
//! whose device and type filters match.

pub mod bus;
pub mod error;
pub mod handler;
pub mod message;

pub use bus::{ConnectionBus, DEFAULT_FAULT_CAPACITY};
pub use error::{BusError, Result};
pub use handler::{HandlerError, HandlerFault, HandlerId, HandlerResult};
pub use message::{Message, PollSummary};
