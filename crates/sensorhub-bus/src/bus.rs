use std::collections::{HashMap, VecDeque};

use sensorhub_codec::{encode_report, ReportType, TimeValue};
use sensorhub_transport::{Delivery, MessageTypeId, SenderId, Transport, TransportEvent};
use tracing::{debug, trace, warn};

use crate::error::{BusError, Result};
use crate::handler::{
    invoke_isolated, ConnectionRecord, HandlerFault, HandlerId, HandlerRecord, HandlerResult,
};
use crate::message::{Message, PollSummary};

/// Faults kept between [`ConnectionBus::take_faults`] calls by default.
pub const DEFAULT_FAULT_CAPACITY: usize = 256;

/// Recent handler faults, oldest dropped first once full.
struct FaultLog {
    faults: VecDeque<HandlerFault>,
    capacity: usize,
    dropped: usize,
}

impl FaultLog {
    fn new(capacity: usize) -> Self {
        Self {
            faults: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    fn push(&mut self, fault: HandlerFault) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        while self.faults.len() >= self.capacity {
            self.faults.pop_front();
            self.dropped += 1;
        }
        self.faults.push_back(fault);
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.faults.len() > capacity {
            self.faults.pop_front();
            self.dropped += 1;
        }
    }

    fn take(&mut self) -> Vec<HandlerFault> {
        if self.dropped > 0 {
            debug!(dropped = self.dropped, "older handler faults discarded");
            self.dropped = 0;
        }
        self.faults.drain(..).collect()
    }
}

/// Registers message types and devices on a transport and dispatches what it
/// delivers to filtered handlers.
///
/// Dispatch happens only inside [`poll`](Self::poll), on the calling thread.
/// Matching handlers run in registration order for each message, messages in
/// delivery order. A handler that errors or panics is recorded as a
/// [`HandlerFault`] and dispatch carries on with the next one.
pub struct ConnectionBus<T> {
    transport: T,
    devices: HashMap<String, SenderId>,
    handlers: Vec<HandlerRecord>,
    connection_handlers: Vec<ConnectionRecord>,
    connection_hook_armed: bool,
    next_handler: u64,
    faults: FaultLog,
}

impl<T: Transport> ConnectionBus<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            devices: HashMap::new(),
            handlers: Vec::new(),
            connection_handlers: Vec::new(),
            connection_hook_armed: false,
            next_handler: 0,
            faults: FaultLog::new(DEFAULT_FAULT_CAPACITY),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Register a message type name. Registering the same name again returns
    /// the same id.
    pub fn register_message_type(&mut self, name: &str) -> Result<MessageTypeId> {
        let id = self.transport.register_type(name)?;
        debug!(name, %id, "message type registered");
        Ok(id)
    }

    /// Register a publishing device. Each name can be registered once.
    pub fn register_device(&mut self, name: &str) -> Result<SenderId> {
        if self.devices.contains_key(name) {
            return Err(BusError::DuplicateRegistration {
                kind: "device",
                name: name.to_string(),
            });
        }
        let id = self.transport.register_sender(name)?;
        self.devices.insert(name.to_string(), id);
        debug!(name, %id, "device registered");
        Ok(id)
    }

    /// Id of a device registered through [`register_device`](Self::register_device).
    pub fn device(&self, name: &str) -> Option<SenderId> {
        self.devices.get(name).copied()
    }

    /// Add a message handler. `device` and `message_type` restrict which
    /// messages reach it; `None` accepts any.
    pub fn register_handler<F>(
        &mut self,
        device: Option<&str>,
        message_type: Option<&str>,
        callback: F,
    ) -> Result<HandlerId>
    where
        F: FnMut(&Message) -> HandlerResult + 'static,
    {
        let sender_filter = device
            .map(|name| self.transport.register_sender(name))
            .transpose()?;
        let type_filter = message_type
            .map(|name| self.transport.register_type(name))
            .transpose()?;

        let id = self.allocate_handler_id();
        self.handlers.push(HandlerRecord {
            id,
            type_filter,
            sender_filter,
            callback: Box::new(callback),
        });
        debug!(%id, ?device, ?message_type, "handler registered");
        Ok(id)
    }

    /// Add a handler for connection-established events. The first one arms
    /// the transport's connection hook.
    pub fn register_connection_handler<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut() -> HandlerResult + 'static,
    {
        if !self.connection_hook_armed {
            self.transport.enable_connection_events();
            self.connection_hook_armed = true;
            debug!("connection hook armed");
        }
        let id = self.allocate_handler_id();
        self.connection_handlers.push(ConnectionRecord {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a handler. Takes effect from the next poll.
    pub fn unregister_handler(&mut self, id: HandlerId) -> Result<()> {
        if let Some(idx) = self.handlers.iter().position(|r| r.id == id) {
            self.handlers.remove(idx);
        } else if let Some(idx) = self.connection_handlers.iter().position(|r| r.id == id) {
            self.connection_handlers.remove(idx);
        } else {
            return Err(BusError::UnknownHandler(id));
        }
        debug!(%id, "handler unregistered");
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len() + self.connection_handlers.len()
    }

    /// Send an encoded payload from a registered device.
    pub fn publish(
        &mut self,
        device: SenderId,
        message_type: MessageTypeId,
        timestamp: TimeValue,
        payload: &[u8],
    ) -> Result<()> {
        trace!(%device, %message_type, len = payload.len(), "publish");
        self.transport
            .send(device, message_type, timestamp, payload)
            .map_err(Into::into)
    }

    /// Encode and send a typed report, registering its type on first use.
    pub fn publish_report<R: ReportType>(
        &mut self,
        device: SenderId,
        timestamp: TimeValue,
        report: &R,
    ) -> Result<()> {
        let message_type = self.transport.register_type(R::NAME)?;
        let payload = encode_report(report)?;
        self.publish(device, message_type, timestamp, &payload)
    }

    /// Drain what the transport has queued and dispatch it. Never blocks.
    pub fn poll(&mut self) -> Result<PollSummary> {
        let mut events = Vec::new();
        self.transport.mainloop_once(&mut |event| events.push(event))?;

        let mut summary = PollSummary::default();
        for event in events {
            match event {
                TransportEvent::Connected => {
                    summary.connections += 1;
                    self.dispatch_connected(&mut summary);
                }
                TransportEvent::Message(delivery) => {
                    summary.messages += 1;
                    let message = self.resolve(delivery);
                    self.dispatch_message(&message, &mut summary);
                }
            }
        }
        Ok(summary)
    }

    /// Faults recorded since the last call, oldest first. At most the
    /// configured capacity is kept; older ones are discarded.
    pub fn take_faults(&mut self) -> Vec<HandlerFault> {
        self.faults.take()
    }

    /// Bound how many faults are kept between `take_faults` calls.
    pub fn set_fault_capacity(&mut self, capacity: usize) {
        self.faults.set_capacity(capacity);
    }

    pub fn fault_capacity(&self) -> usize {
        self.faults.capacity
    }

    fn resolve(&self, delivery: Delivery) -> Message {
        Message {
            type_id: delivery.message_type,
            type_name: self
                .transport
                .type_name(delivery.message_type)
                .unwrap_or_default()
                .to_string(),
            sender_id: delivery.sender,
            sender_name: self
                .transport
                .sender_name(delivery.sender)
                .unwrap_or_default()
                .to_string(),
            timestamp: delivery.timestamp,
            payload: delivery.payload,
        }
    }

    fn dispatch_message(&mut self, message: &Message, summary: &mut PollSummary) {
        for record in self.handlers.iter_mut().filter(|r| r.matches(message)) {
            summary.handlers_invoked += 1;
            let context = || format!("{} from {}", message.type_name, message.sender_name);
            if let Some(fault) = invoke_isolated(record.id, context, || (record.callback)(message))
            {
                warn!(%fault, "message handler fault");
                summary.faults += 1;
                self.faults.push(fault);
            }
        }
    }

    fn dispatch_connected(&mut self, summary: &mut PollSummary) {
        debug!("connection established");
        for record in &mut self.connection_handlers {
            summary.handlers_invoked += 1;
            if let Some(fault) =
                invoke_isolated(record.id, || "connection".to_string(), &mut record.callback)
            {
                warn!(%fault, "connection handler fault");
                summary.faults += 1;
                self.faults.push(fault);
            }
        }
    }

    fn allocate_handler_id(&mut self) -> HandlerId {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        id
    }
}

impl<T> std::fmt::Debug for ConnectionBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBus")
            .field("devices", &self.devices)
            .field("handlers", &self.handlers.len())
            .field("connection_handlers", &self.connection_handlers.len())
            .field("connection_hook_armed", &self.connection_hook_armed)
            .field("pending_faults", &self.faults.faults.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use sensorhub_transport::LoopbackTransport;

    use super::*;

    fn bus() -> ConnectionBus<LoopbackTransport> {
        ConnectionBus::new(LoopbackTransport::new())
    }

    #[test]
    fn message_type_registration_is_idempotent() {
        let mut bus = bus();
        let a = bus.register_message_type("tracker").unwrap();
        let b = bus.register_message_type("tracker").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_device_rejected() {
        let mut bus = bus();
        bus.register_device("Tracker0").unwrap();
        let err = bus.register_device("Tracker0").unwrap_err();
        assert!(matches!(
            err,
            BusError::DuplicateRegistration { kind: "device", ref name } if name == "Tracker0"
        ));
    }

    #[test]
    fn rejected_name_fails_only_that_call() {
        let mut bus = bus();
        assert!(matches!(
            bus.register_device(""),
            Err(BusError::Transport(_))
        ));
        bus.register_device("ok").unwrap();
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut bus = bus();
        let device = bus.register_device("Tracker0").unwrap();
        let kind = bus.register_message_type("tracker").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        for label in ["H1", "H2"] {
            let log = Rc::clone(&log);
            bus.register_handler(Some("Tracker0"), Some("tracker"), move |_| {
                log.borrow_mut().push(label);
                Ok(())
            })
            .unwrap();
        }

        bus.publish(device, kind, TimeValue::new(1, 0), b"x").unwrap();
        let summary = bus.poll().unwrap();
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.handlers_invoked, 2);
        assert_eq!(*log.borrow(), vec!["H1", "H2"]);
    }

    #[test]
    fn filters_and_wildcards() {
        let mut bus = bus();
        let tracker = bus.register_device("Tracker0").unwrap();
        let button = bus.register_device("Button0").unwrap();
        let pose = bus.register_message_type("pose").unwrap();
        let press = bus.register_message_type("press").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let record = |tag: &'static str| {
            let seen = Rc::clone(&seen);
            move |m: &Message| -> HandlerResult {
                seen.borrow_mut()
                    .push(format!("{tag}:{}:{}", m.sender_name, m.type_name));
                Ok(())
            }
        };
        bus.register_handler(None, None, record("all")).unwrap();
        bus.register_handler(Some("Button0"), None, record("button")).unwrap();
        bus.register_handler(None, Some("pose"), record("pose")).unwrap();

        bus.publish(tracker, pose, TimeValue::default(), b"").unwrap();
        bus.publish(button, press, TimeValue::default(), b"").unwrap();
        bus.poll().unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                "all:Tracker0:pose",
                "pose:Tracker0:pose",
                "all:Button0:press",
                "button:Button0:press",
            ]
        );
    }

    #[test]
    fn failing_handler_does_not_starve_the_next() {
        let mut bus = bus();
        let device = bus.register_device("dev").unwrap();
        let kind = bus.register_message_type("kind").unwrap();
        let reached = Rc::new(RefCell::new(0));

        let bad = bus
            .register_handler(None, None, |_| Err("decode failed".into()))
            .unwrap();
        bus.register_handler(None, None, |_| panic!("handler bug"))
            .unwrap();
        let counter = Rc::clone(&reached);
        bus.register_handler(None, None, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

        bus.publish(device, kind, TimeValue::default(), b"").unwrap();
        let summary = bus.poll().unwrap();

        assert_eq!(*reached.borrow(), 1);
        assert_eq!(summary.faults, 2);
        let faults = bus.take_faults();
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].handler, bad);
        assert_eq!(faults[0].context, "kind from dev");
        assert!(faults[1].reason.contains("handler bug"));
        assert!(bus.take_faults().is_empty());
    }

    #[test]
    fn fault_log_keeps_the_newest_up_to_capacity() {
        let mut bus = bus();
        assert_eq!(bus.fault_capacity(), DEFAULT_FAULT_CAPACITY);
        bus.set_fault_capacity(2);
        let device = bus.register_device("dev").unwrap();
        let kind = bus.register_message_type("kind").unwrap();
        bus.register_handler(None, None, |m| {
            Err(format!("bad payload {}", m.timestamp.seconds).into())
        })
        .unwrap();

        for seconds in 0..5 {
            bus.publish(device, kind, TimeValue::new(seconds, 0), b"")
                .unwrap();
        }
        let summary = bus.poll().unwrap();
        assert_eq!(summary.faults, 5);

        let faults = bus.take_faults();
        assert_eq!(faults.len(), 2);
        assert!(faults[0].reason.contains("bad payload 3"));
        assert!(faults[1].reason.contains("bad payload 4"));
        assert!(bus.take_faults().is_empty());

        bus.set_fault_capacity(0);
        bus.publish(device, kind, TimeValue::default(), b"").unwrap();
        assert_eq!(bus.poll().unwrap().faults, 1);
        assert!(bus.take_faults().is_empty());
    }

    #[test]
    fn unregister_takes_effect_next_poll() {
        let mut bus = bus();
        let device = bus.register_device("dev").unwrap();
        let kind = bus.register_message_type("kind").unwrap();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let id = bus
            .register_handler(None, None, move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            })
            .unwrap();

        bus.publish(device, kind, TimeValue::default(), b"").unwrap();
        bus.poll().unwrap();
        bus.unregister_handler(id).unwrap();
        bus.publish(device, kind, TimeValue::default(), b"").unwrap();
        bus.poll().unwrap();

        assert_eq!(*hits.borrow(), 1);
        assert!(matches!(
            bus.unregister_handler(id),
            Err(BusError::UnknownHandler(_))
        ));
    }

    #[test]
    fn connection_hook_armed_once() {
        let mut bus = bus();
        let hits = Rc::new(RefCell::new(0));
        for _ in 0..2 {
            let counter = Rc::clone(&hits);
            bus.register_connection_handler(move || {
                *counter.borrow_mut() += 1;
                Ok(())
            });
        }

        let summary = bus.poll().unwrap();
        assert_eq!(summary.connections, 1);
        assert_eq!(*hits.borrow(), 2);
        assert_eq!(bus.poll().unwrap().connections, 0);
    }

    #[test]
    fn poll_on_empty_transport_is_noop() {
        let mut bus = bus();
        assert_eq!(bus.poll().unwrap(), PollSummary::default());
    }
}
