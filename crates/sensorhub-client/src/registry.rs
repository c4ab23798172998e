use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use sensorhub_bus::Message;
use sensorhub_codec::ReportType;

use crate::interface::ClientInterface;

/// Type-erased report handling for one [`ReportType`].
pub(crate) trait ReportKind {
    /// Decode `message` and apply it to `interface`.
    fn apply(&self, interface: &ClientInterface, message: &Message) -> sensorhub_codec::Result<()>;
}

struct Kind<R>(PhantomData<fn() -> R>);

impl<R: ReportType> ReportKind for Kind<R> {
    fn apply(&self, interface: &ClientInterface, message: &Message) -> sensorhub_codec::Result<()> {
        let report = message.decode::<R>()?;
        if !interface.accepts(&report) {
            return Ok(());
        }
        interface.apply_report(message.timestamp, report);
        Ok(())
    }
}

/// Report types a context knows how to decode, keyed by message type name.
///
/// Shared between a context and its interfaces; registering a callback for a
/// new type makes the whole context understand it.
#[derive(Clone, Default)]
pub(crate) struct ReportRegistry {
    kinds: Rc<RefCell<HashMap<&'static str, Rc<dyn ReportKind>>>>,
}

impl ReportRegistry {
    pub fn register<R: ReportType>(&self) {
        self.kinds
            .borrow_mut()
            .entry(R::NAME)
            .or_insert_with(|| Rc::new(Kind::<R>(PhantomData)));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn ReportKind>> {
        self.kinds.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kinds.borrow().keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ReportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRegistry")
            .field("kinds", &self.names())
            .finish()
    }
}
