//! In-process transport.
//!
//! Everything sent on a [`LoopbackTransport`] is delivered back to the same
//! transport on its next `mainloop_once`, which is how a server's own
//! drivers and its routing handlers share one connection. Producers on other
//! threads go through a [`Publisher`], a bounded queue drained by the owning
//! thread.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use bytes::Bytes;
use sensorhub_codec::{TimeValue, WireMessage};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::names::NameTable;
use crate::traits::{Delivery, MessageTypeId, SenderId, Transport, TransportEvent};

/// Default capacity of the cross-thread publish queue.
pub const DEFAULT_PUBLISH_QUEUE: usize = 1024;

/// Transport that delivers to itself.
#[derive(Debug)]
pub struct LoopbackTransport {
    types: NameTable,
    senders: NameTable,
    queue: VecDeque<Delivery>,
    inbox: Option<Inbox>,
    connection_events: bool,
    connected_reported: bool,
}

#[derive(Debug)]
struct Inbox {
    rx: Receiver<WireMessage>,
    capacity: usize,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            types: NameTable::new("type"),
            senders: NameTable::new("sender"),
            queue: VecDeque::new(),
            inbox: None,
            connection_events: false,
            connected_reported: false,
        }
    }

    /// Create a transport plus a [`Publisher`] that other threads can use to
    /// feed it, holding at most `capacity` undelivered messages.
    pub fn with_publisher(capacity: usize) -> (Self, Publisher) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::sync_channel(capacity);
        let mut transport = Self::new();
        transport.inbox = Some(Inbox { rx, capacity });
        (transport, Publisher { tx })
    }

    /// Messages waiting for the next `mainloop_once`, not counting the
    /// cross-thread queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Move published messages into the delivery queue. A message whose
    /// sender or type name is rejected is logged and skipped; the rest of
    /// the batch still goes through.
    fn drain_inbox(&mut self) {
        let Some(inbox) = &self.inbox else {
            return;
        };

        // At most one queue's worth, so a busy producer cannot keep a single
        // mainloop pass running.
        let mut drained = Vec::new();
        while drained.len() < inbox.capacity {
            match inbox.rx.try_recv() {
                Ok(message) => drained.push(message),
                Err(_) => break,
            }
        }

        for message in drained {
            let ids = self.senders.register(&message.sender).and_then(|sender| {
                let message_type = self.types.register(&message.message_type)?;
                Ok((SenderId(sender), MessageTypeId(message_type)))
            });
            let (sender, message_type) = match ids {
                Ok(ids) => ids,
                Err(err) => {
                    warn!(
                        %err,
                        sender = %message.sender,
                        message_type = %message.message_type,
                        "dropping published message"
                    );
                    continue;
                }
            };
            self.queue.push_back(Delivery {
                sender,
                message_type,
                timestamp: message.timestamp,
                payload: message.payload,
            });
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn register_type(&mut self, name: &str) -> Result<MessageTypeId> {
        self.types.register(name).map(MessageTypeId)
    }

    fn register_sender(&mut self, name: &str) -> Result<SenderId> {
        self.senders.register(name).map(SenderId)
    }

    fn type_name(&self, id: MessageTypeId) -> Option<&str> {
        self.types.name(id.0)
    }

    fn sender_name(&self, id: SenderId) -> Option<&str> {
        self.senders.name(id.0)
    }

    fn enable_connection_events(&mut self) {
        if !self.connection_events {
            debug!("loopback connection events enabled");
        }
        self.connection_events = true;
    }

    fn send(
        &mut self,
        sender: SenderId,
        message_type: MessageTypeId,
        timestamp: TimeValue,
        payload: &[u8],
    ) -> Result<()> {
        self.senders.require(sender.0)?;
        self.types.require(message_type.0)?;
        self.queue.push_back(Delivery {
            sender,
            message_type,
            timestamp,
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }

    fn mainloop_once(&mut self, sink: &mut dyn FnMut(TransportEvent)) -> Result<()> {
        if self.connection_events && !self.connected_reported {
            self.connected_reported = true;
            sink(TransportEvent::Connected);
        }

        self.drain_inbox();

        let ready = self.queue.len();
        trace!(ready, "loopback mainloop");
        for delivery in self.queue.drain(..ready) {
            sink(TransportEvent::Message(delivery));
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "loopback"
    }
}

/// Thread-safe handle for feeding a [`LoopbackTransport`] from driver threads.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: SyncSender<WireMessage>,
}

impl Publisher {
    /// Queue a message without blocking.
    ///
    /// Fails with [`TransportError::QueueFull`] when the owning thread has
    /// fallen behind, and [`TransportError::Shutdown`] once the transport is
    /// gone.
    pub fn publish(&self, message: WireMessage) -> Result<()> {
        self.tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Disconnected(_) => TransportError::Shutdown,
        })
    }
}
