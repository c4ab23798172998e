use bytes::Bytes;
use sensorhub_codec::{decode_report, ReportType, TimeValue};
use sensorhub_transport::{MessageTypeId, SenderId};

/// An inbound message as handlers see it, with ids already resolved to names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub type_id: MessageTypeId,
    pub type_name: String,
    pub sender_id: SenderId,
    pub sender_name: String,
    pub timestamp: TimeValue,
    pub payload: Bytes,
}

impl Message {
    /// Whether this message carries a report of type `R`.
    pub fn is<R: ReportType>(&self) -> bool {
        self.type_name == R::NAME
    }

    /// Decode the payload as `R`.
    pub fn decode<R: ReportType>(&self) -> sensorhub_codec::Result<R> {
        decode_report(&self.payload)
    }
}

/// What one [`ConnectionBus::poll`](crate::ConnectionBus::poll) did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Messages drained from the transport.
    pub messages: usize,
    /// Connection-established events seen.
    pub connections: usize,
    /// Handler invocations, successful or not.
    pub handlers_invoked: usize,
    /// Invocations that returned an error or panicked.
    pub faults: usize,
}
