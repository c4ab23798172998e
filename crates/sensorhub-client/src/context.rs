use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use sensorhub_bus::{ConnectionBus, HandlerFault, HandlerId, PollSummary};
use sensorhub_codec::{ReportType, TimeValue};
use sensorhub_path::{normalize, parse_routes, PathElement, PathError, PathTree, RouteTable};
use sensorhub_transport::{MessageTypeId, SenderId, Transport};
use tracing::{debug, info, trace};

use crate::config::ContextConfig;
use crate::error::Result;
use crate::interface::{ClientInterface, InterfaceSource};
use crate::ownership::{KeyedOwnership, ObjectKey};
use crate::registry::ReportRegistry;

struct Binding {
    interface: Rc<ClientInterface>,
    handler: HandlerId,
}

/// An application's connection to the hub.
///
/// Resolves logical paths to device sources, keeps the interfaces it handed
/// out current on every [`update`](Self::update), and owns objects on the
/// application's behalf until it is dropped.
pub struct ClientContext<T: Transport> {
    app_id: String,
    config: ContextConfig,
    bus: ConnectionBus<T>,
    device: SenderId,
    route_type: MessageTypeId,
    routes: RouteTable,
    tree: PathTree,
    interfaces: Vec<Binding>,
    params: HashMap<String, String>,
    objects: KeyedOwnership,
    registry: ReportRegistry,
}

impl<T: Transport> ClientContext<T> {
    pub fn new(app_id: &str, transport: T) -> Result<Self> {
        Self::with_config(app_id, transport, ContextConfig::default())
    }

    pub fn with_config(app_id: &str, transport: T, config: ContextConfig) -> Result<Self> {
        let mut bus = ConnectionBus::new(transport);
        let device = bus.register_device(&format!("{}{app_id}", config.client_device_prefix))?;
        let route_type = bus.register_message_type(&config.route_message_type)?;
        info!(app_id, transport = bus.transport().transport_name(), "client context created");

        Ok(Self {
            app_id: app_id.to_string(),
            config,
            bus,
            device,
            route_type,
            routes: RouteTable::new(),
            tree: PathTree::new(),
            interfaces: Vec::new(),
            params: HashMap::new(),
            objects: KeyedOwnership::new(),
            registry: ReportRegistry::default(),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn path_tree(&self) -> &PathTree {
        &self.tree
    }

    pub fn bus(&self) -> &ConnectionBus<T> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut ConnectionBus<T> {
        &mut self.bus
    }

    /// Teach the context to decode `R` reports. Registering a callback for
    /// `R` on any interface does this too.
    pub fn register_report_type<R: ReportType>(&mut self) -> Result<()> {
        self.bus.register_message_type(R::NAME)?;
        self.registry.register::<R>();
        Ok(())
    }

    /// Replace the path tree and rebind existing interfaces against it.
    pub fn set_path_tree(&mut self, tree: PathTree) -> Result<()> {
        self.tree = tree;
        self.rebind_all()
    }

    /// Create an interface for `path`.
    ///
    /// Asking for the same path twice gives two independent interfaces, both
    /// kept up to date.
    pub fn get_interface(&mut self, path: &str) -> Result<Rc<ClientInterface>> {
        let path = normalize(path)?;
        let source = self.resolve_source(&path)?;
        debug!(%path, source = %source.path, device = %source.device, "interface created");

        let interface = Rc::new(ClientInterface::new(
            path,
            source.clone(),
            self.registry.clone(),
        ));
        let handler = self.subscribe(&interface, &source.device)?;
        self.interfaces.push(Binding {
            interface: Rc::clone(&interface),
            handler,
        });
        Ok(interface)
    }

    /// Stop updating `interface` and hand it back, or `None` if this context
    /// does not hold it.
    pub fn release_interface(
        &mut self,
        interface: &Rc<ClientInterface>,
    ) -> Result<Option<Rc<ClientInterface>>> {
        let Some(idx) = self
            .interfaces
            .iter()
            .position(|b| Rc::ptr_eq(&b.interface, interface))
        else {
            return Ok(None);
        };
        let binding = self.interfaces.remove(idx);
        self.bus.unregister_handler(binding.handler)?;
        debug!(path = %binding.interface.path(), "interface released");
        Ok(Some(binding.interface))
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Merge a route document into the local routes and forward it to the
    /// server. Interfaces whose source changed are rebound.
    ///
    /// Returns how many destinations were not routed before.
    pub fn send_route(&mut self, text: &str) -> Result<usize> {
        let directives = parse_routes(text)?;
        let added = self.routes.merge(directives)?;
        self.bus.publish(
            self.device,
            self.route_type,
            TimeValue::now(),
            text.as_bytes(),
        )?;
        info!(added, total = self.routes.len(), "routes sent");
        self.rebind_all()?;
        Ok(added)
    }

    /// Process everything that has arrived: decode reports, update cached
    /// state and run callbacks.
    pub fn update(&mut self) -> Result<PollSummary> {
        let summary = self.bus.poll()?;
        trace!(?summary, "client update");
        Ok(summary)
    }

    /// Handler faults (decode failures, panicking callbacks) since the last
    /// call.
    pub fn take_faults(&mut self) -> Vec<HandlerFault> {
        self.bus.take_faults()
    }

    pub fn get_string_parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn set_string_parameter(&mut self, name: &str, value: impl Into<String>) {
        self.params.insert(name.to_string(), value.into());
    }

    /// Hold `object` until released or until the context is dropped.
    pub fn acquire_object<O: Any>(&mut self, object: O) -> ObjectKey {
        self.objects.acquire(object)
    }

    pub fn release_object(&mut self, key: ObjectKey) -> bool {
        self.objects.release(key)
    }

    pub fn object<O: Any>(&self, key: ObjectKey) -> Option<&O> {
        self.objects.get(key)
    }

    /// Work out which device feeds `path`: apply the route table, then follow
    /// aliases, then look for the nearest device at or above the result.
    fn resolve_source(&self, path: &str) -> Result<InterfaceSource> {
        let routed = self.routes.resolve_source(path).unwrap_or(path);
        let resolved = match self.tree.resolve_alias(routed) {
            Ok(resolved) => resolved,
            Err(PathError::UnknownPath(_)) => normalize(routed)?,
            Err(err) => return Err(err.into()),
        };

        let sensor = match self.tree.element(&resolved) {
            Ok(PathElement::Sensor(sensor)) => Some(sensor.index),
            _ => None,
        };

        // No device in the tree: the path itself names the device.
        let device = match self.tree.owning_device(&resolved)? {
            Some(device) => device.device_name.clone(),
            None => resolved.clone(),
        };

        Ok(InterfaceSource {
            path: resolved,
            device,
            sensor,
        })
    }

    fn subscribe(&mut self, interface: &Rc<ClientInterface>, device: &str) -> Result<HandlerId> {
        let target = Rc::clone(interface);
        let registry = self.registry.clone();
        let id = self
            .bus
            .register_handler(Some(device), None, move |message| {
                match registry.get(&message.type_name) {
                    Some(kind) => kind.apply(&target, message)?,
                    None => trace!(report = %message.type_name, "no decoder registered"),
                }
                Ok(())
            })?;
        Ok(id)
    }

    fn rebind_all(&mut self) -> Result<()> {
        for idx in 0..self.interfaces.len() {
            let interface = Rc::clone(&self.interfaces[idx].interface);
            let source = self.resolve_source(interface.path())?;
            if source == interface.source() {
                continue;
            }
            info!(
                path = %interface.path(),
                from = %interface.source().device,
                to = %source.device,
                "interface rebound"
            );
            self.bus.unregister_handler(self.interfaces[idx].handler)?;
            let handler = self.subscribe(&interface, &source.device)?;
            interface.set_source(source);
            self.interfaces[idx].handler = handler;
        }
        Ok(())
    }
}

impl<T: Transport> Drop for ClientContext<T> {
    fn drop(&mut self) {
        // Interfaces go in reverse acquisition order, then owned objects.
        while let Some(binding) = self.interfaces.pop() {
            binding.interface.detach();
            if let Err(err) = self.bus.unregister_handler(binding.handler) {
                debug!(%err, path = %binding.interface.path(), "interface handler already gone");
            }
        }
        self.objects.release_all();
        debug!(app_id = %self.app_id, "client context dropped");
    }
}

impl<T: Transport> std::fmt::Debug for ClientContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("app_id", &self.app_id)
            .field("interfaces", &self.interfaces.len())
            .field("routes", &self.routes.len())
            .field("objects", &self.objects)
            .finish()
    }
}
