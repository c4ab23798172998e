use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use sensorhub_codec::{ReportType, TimeValue};
use tracing::trace;

use crate::error::{ClientError, Result};
use crate::registry::ReportRegistry;

type Callback<R> = Box<dyn FnMut(&TimeValue, &R)>;
type CallbackList<R> = Vec<Callback<R>>;

/// Where an interface's data comes from after routing and alias resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSource {
    /// Fully resolved source path.
    pub path: String,
    /// Device whose messages feed the interface.
    pub device: String,
    /// Sensor index, when the source path names one.
    pub sensor: Option<u32>,
}

/// A live view of one path: latest state per report type plus callbacks.
///
/// Handed out by [`ClientContext::get_interface`](crate::ClientContext::get_interface)
/// as an `Rc`; the context updates it on every `update()`.
pub struct ClientInterface {
    path: String,
    source: RefCell<InterfaceSource>,
    state: RefCell<HashMap<&'static str, Box<dyn Any>>>,
    callbacks: RefCell<HashMap<&'static str, Box<dyn Any>>>,
    registry: ReportRegistry,
    detached: Cell<bool>,
}

impl ClientInterface {
    pub(crate) fn new(path: String, source: InterfaceSource, registry: ReportRegistry) -> Self {
        Self {
            path,
            source: RefCell::new(source),
            state: RefCell::new(HashMap::new()),
            callbacks: RefCell::new(HashMap::new()),
            registry,
            detached: Cell::new(false),
        }
    }

    /// The path this interface was requested for.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> InterfaceSource {
        self.source.borrow().clone()
    }

    /// True once the owning context is gone.
    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    /// Latest `R` report and its timestamp.
    ///
    /// Fails with [`ClientError::NoStateYet`] before the first report and,
    /// always, for report types that do not retain state.
    pub fn get_state<R: ReportType>(&self) -> Result<(TimeValue, R)> {
        if self.is_detached() {
            return Err(ClientError::Detached(self.path.clone()));
        }
        self.state
            .borrow()
            .get(R::NAME)
            .and_then(|entry| entry.downcast_ref::<(TimeValue, R)>())
            .cloned()
            .ok_or_else(|| ClientError::NoStateYet {
                path: self.path.clone(),
                report: R::NAME,
            })
    }

    pub fn has_state<R: ReportType>(&self) -> bool {
        self.state.borrow().contains_key(R::NAME)
    }

    /// Call `callback` with every `R` report this interface receives.
    pub fn register_callback<R, F>(&self, callback: F)
    where
        R: ReportType,
        F: FnMut(&TimeValue, &R) + 'static,
    {
        self.registry.register::<R>();
        let mut callbacks = self.callbacks.borrow_mut();
        let slot = callbacks
            .entry(R::NAME)
            .or_insert_with(|| Box::new(CallbackList::<R>::new()));
        if let Some(list) = slot.downcast_mut::<CallbackList<R>>() {
            list.push(Box::new(callback));
        }
    }

    pub(crate) fn set_source(&self, source: InterfaceSource) {
        *self.source.borrow_mut() = source;
    }

    pub(crate) fn detach(&self) {
        self.detached.set(true);
    }

    /// Whether a report from the source device belongs to this interface.
    ///
    /// An interface bound to a sensor only takes reports for that sensor;
    /// one bound to the device itself takes them all.
    pub(crate) fn accepts<R: ReportType>(&self, report: &R) -> bool {
        match (self.source.borrow().sensor, report.sensor()) {
            (Some(bound), Some(sensor)) => bound == sensor,
            _ => true,
        }
    }

    /// Record a decoded report and run the callbacks registered for it.
    pub(crate) fn apply_report<R: ReportType>(&self, timestamp: TimeValue, report: R) {
        trace!(path = %self.path, report = R::NAME, "report received");
        if R::KEEP_STATE {
            self.state
                .borrow_mut()
                .insert(R::NAME, Box::new((timestamp, report.clone())));
        }

        // Run without holding the borrow so callbacks may register more
        // callbacks or read state.
        let taken = self.callbacks.borrow_mut().remove(R::NAME);
        let Some(mut taken) = taken else {
            return;
        };
        if let Some(list) = taken.downcast_mut::<CallbackList<R>>() {
            for callback in list.iter_mut() {
                callback(&timestamp, &report);
            }
        }

        match self.callbacks.borrow_mut().entry(R::NAME) {
            Entry::Vacant(slot) => {
                slot.insert(taken);
            }
            Entry::Occupied(mut slot) => {
                // Registered during the callbacks; they go after the originals.
                if let (Some(original), Some(added)) = (
                    taken.downcast_mut::<CallbackList<R>>(),
                    slot.get_mut().downcast_mut::<CallbackList<R>>(),
                ) {
                    original.append(added);
                }
                slot.insert(taken);
            }
        }
    }
}

impl std::fmt::Debug for ClientInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInterface")
            .field("path", &self.path)
            .field("source", &*self.source.borrow())
            .field("detached", &self.detached.get())
            .finish()
    }
}
