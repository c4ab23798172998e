use std::fmt;

use bytes::Bytes;
use sensorhub_codec::TimeValue;

use crate::error::Result;

/// Connection-local id of a registered message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageTypeId(pub u32);

/// Connection-local id of a registered sender (device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SenderId(pub u32);

impl fmt::Display for MessageTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sender#{}", self.0)
    }
}

/// One inbound message, addressed by connection-local ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sender: SenderId,
    pub message_type: MessageTypeId,
    pub timestamp: TimeValue,
    pub payload: Bytes,
}

/// Something a transport reports from [`Transport::mainloop_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote end connected. Only reported once connection events have
    /// been enabled.
    Connected,
    /// A message arrived.
    Message(Delivery),
}

/// The connection service a bus runs on.
///
/// Implementations register names, carry already-encoded payloads and, on
/// each `mainloop_once`, hand every event that is queued *at call time* to
/// the sink, in arrival order, without blocking for more.
pub trait Transport {
    /// Register (or look up) a message type name. Idempotent per name.
    fn register_type(&mut self, name: &str) -> Result<MessageTypeId>;

    /// Register (or look up) a sender name. Idempotent per name.
    fn register_sender(&mut self, name: &str) -> Result<SenderId>;

    /// Name behind a type id.
    fn type_name(&self, id: MessageTypeId) -> Option<&str>;

    /// Name behind a sender id.
    fn sender_name(&self, id: SenderId) -> Option<&str>;

    /// Start reporting [`TransportEvent::Connected`].
    fn enable_connection_events(&mut self);

    /// Hand an encoded message to the transport for delivery.
    fn send(
        &mut self,
        sender: SenderId,
        message_type: MessageTypeId,
        timestamp: TimeValue,
        payload: &[u8],
    ) -> Result<()>;

    /// Drain currently queued events into `sink`.
    fn mainloop_once(&mut self, sink: &mut dyn FnMut(TransportEvent)) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}
