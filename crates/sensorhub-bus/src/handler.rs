use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use sensorhub_transport::{MessageTypeId, SenderId};

use crate::message::Message;

/// Error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What handler callbacks return.
pub type HandlerResult = std::result::Result<(), HandlerError>;

pub(crate) type MessageCallback = Box<dyn FnMut(&Message) -> HandlerResult>;
pub(crate) type ConnectionCallback = Box<dyn FnMut() -> HandlerResult>;

/// Identifies a registered handler for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub(crate) u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// A message handler and its filters. `None` matches anything.
pub(crate) struct HandlerRecord {
    pub id: HandlerId,
    pub type_filter: Option<MessageTypeId>,
    pub sender_filter: Option<SenderId>,
    pub callback: MessageCallback,
}

impl HandlerRecord {
    pub fn matches(&self, message: &Message) -> bool {
        self.type_filter.is_none_or(|t| t == message.type_id)
            && self.sender_filter.is_none_or(|s| s == message.sender_id)
    }
}

pub(crate) struct ConnectionRecord {
    pub id: HandlerId,
    pub callback: ConnectionCallback,
}

/// A handler that returned an error or panicked during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{handler} failed on {context}: {reason}")]
pub struct HandlerFault {
    pub handler: HandlerId,
    /// `type from sender` for messages, `connection` for connection events.
    pub context: String,
    pub reason: String,
}

/// Run one callback, turning an error or a panic into a fault.
pub(crate) fn invoke_isolated(
    handler: HandlerId,
    context: impl FnOnce() -> String,
    call: impl FnOnce() -> HandlerResult,
) -> Option<HandlerFault> {
    let reason = match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };
    Some(HandlerFault {
        handler,
        context: context(),
        reason,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_call_is_not_a_fault() {
        assert!(invoke_isolated(HandlerId(1), || "ctx".into(), || Ok(())).is_none());
    }

    #[test]
    fn error_becomes_fault() {
        let fault =
            invoke_isolated(HandlerId(2), || "ctx".into(), || Err("bad data".into())).unwrap();
        assert_eq!(fault.handler, HandlerId(2));
        assert_eq!(fault.reason, "bad data");
        assert_eq!(fault.to_string(), "handler#2 failed on ctx: bad data");
    }

    #[test]
    fn panic_becomes_fault() {
        let fault = invoke_isolated(HandlerId(3), || "ctx".into(), || panic!("boom")).unwrap();
        assert_eq!(fault.reason, "panicked: boom");
    }
}
