//! Server side of the hub.
//!
//! A [`Server`] serves one connection. It keeps the authoritative path tree
//! and route table, applies route documents sent by clients, and publishes
//! reports for the devices its drivers register.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

use sensorhub_bus::{ConnectionBus, HandlerFault, PollSummary};
use sensorhub_client::{KeyedOwnership, ObjectKey};
use sensorhub_codec::{ReportType, TimeValue};
use sensorhub_path::{parse_routes, PathElement, PathTree, RouteDirective, RouteTable};
use sensorhub_transport::{SenderId, Transport};
use tracing::{debug, info};

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Written into every `Device` element this server adds to its tree.
    pub host: String,
    /// Message type clients send route documents on.
    pub route_message_type: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            route_message_type: sensorhub_path::ROUTE_UPDATE_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    tree: PathTree,
    routes: RouteTable,
    connections: usize,
    route_updates: usize,
}

impl Shared {
    /// Merge `directives` and mirror each one into the tree as an alias from
    /// its destination to its source.
    ///
    /// All or nothing: on error neither the route table nor the tree changes.
    fn apply_routes(&mut self, directives: Vec<RouteDirective>) -> sensorhub_path::Result<usize> {
        let mut tree = self.tree.clone();
        let mut routes = self.routes.clone();
        let added = routes.merge(directives.iter().cloned())?;
        for directive in &directives {
            tree.insert(
                &directive.destination,
                PathElement::alias(directive.source.clone()),
            )?;
        }
        self.tree = tree;
        self.routes = routes;
        self.route_updates += 1;
        Ok(added)
    }
}

/// Data a loaded driver plugin keeps alive while the server runs.
///
/// Objects are released in reverse acquisition order when the driver is
/// dropped.
pub struct DriverContext {
    name: String,
    devices: Vec<SenderId>,
    objects: KeyedOwnership,
}

impl DriverContext {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            devices: Vec::new(),
            objects: KeyedOwnership::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Devices registered on this driver's behalf.
    pub fn devices(&self) -> &[SenderId] {
        &self.devices
    }

    pub fn acquire_object<O: Any>(&mut self, object: O) -> ObjectKey {
        self.objects.acquire(object)
    }

    pub fn release_object(&mut self, key: ObjectKey) -> bool {
        self.objects.release(key)
    }

    pub fn object<O: Any>(&self, key: ObjectKey) -> Option<&O> {
        self.objects.get(key)
    }
}

impl Drop for DriverContext {
    fn drop(&mut self) {
        debug!(driver = %self.name, objects = self.objects.len(), "driver unloaded");
        self.objects.release_all();
    }
}

impl std::fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("name", &self.name)
            .field("devices", &self.devices.len())
            .field("objects", &self.objects)
            .finish()
    }
}

pub struct Server<T: Transport> {
    config: ServerConfig,
    bus: ConnectionBus<T>,
    shared: Rc<RefCell<Shared>>,
    drivers: Vec<DriverContext>,
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T, tree: PathTree) -> Result<Self> {
        Self::with_config(transport, tree, ServerConfig::default())
    }

    pub fn with_config(transport: T, tree: PathTree, config: ServerConfig) -> Result<Self> {
        let mut bus = ConnectionBus::new(transport);
        let shared = Rc::new(RefCell::new(Shared {
            tree,
            ..Shared::default()
        }));

        let state = Rc::clone(&shared);
        bus.register_handler(None, Some(&config.route_message_type), move |message| {
            let text = std::str::from_utf8(&message.payload)?;
            let directives = parse_routes(text)?;
            let count = directives.len();
            let mut state = state.borrow_mut();
            let added = state.apply_routes(directives)?;
            info!(
                from = %message.sender_name,
                directives = count,
                added,
                total = state.routes.len(),
                "routes updated"
            );
            Ok(())
        })?;

        let state = Rc::clone(&shared);
        bus.register_connection_handler(move || {
            let mut state = state.borrow_mut();
            state.connections += 1;
            info!(connections = state.connections, "client connected");
            Ok(())
        });

        info!(
            host = %config.host,
            transport = bus.transport().transport_name(),
            "server started"
        );
        Ok(Self {
            config,
            bus,
            shared,
            drivers: Vec::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn bus(&self) -> &ConnectionBus<T> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut ConnectionBus<T> {
        &mut self.bus
    }

    pub fn path_tree(&self) -> Ref<'_, PathTree> {
        Ref::map(self.shared.borrow(), |shared| &shared.tree)
    }

    pub fn routes(&self) -> Ref<'_, RouteTable> {
        Ref::map(self.shared.borrow(), |shared| &shared.routes)
    }

    /// Client connections seen so far.
    pub fn connections(&self) -> usize {
        self.shared.borrow().connections
    }

    /// Route documents applied so far.
    pub fn route_updates(&self) -> usize {
        self.shared.borrow().route_updates
    }

    /// Apply a route document directly, as if a client had sent it.
    pub fn apply_routes(&mut self, text: &str) -> Result<usize> {
        let directives = parse_routes(text)?;
        Ok(self.shared.borrow_mut().apply_routes(directives)?)
    }

    pub fn load_driver(&mut self, name: &str) -> Result<&mut DriverContext> {
        if self.drivers.iter().any(|driver| driver.name == name) {
            return Err(ServerError::DuplicateDriver(name.to_string()));
        }
        info!(driver = name, "driver loaded");
        self.drivers.push(DriverContext::new(name));
        let idx = self.drivers.len() - 1;
        Ok(&mut self.drivers[idx])
    }

    pub fn driver(&self, name: &str) -> Option<&DriverContext> {
        self.drivers.iter().find(|driver| driver.name == name)
    }

    pub fn driver_mut(&mut self, name: &str) -> Option<&mut DriverContext> {
        self.drivers.iter_mut().find(|driver| driver.name == name)
    }

    /// Register `device_name` for `driver` and describe it at `path` in the
    /// tree.
    pub fn register_device(
        &mut self,
        driver: &str,
        path: &str,
        device_name: &str,
    ) -> Result<SenderId> {
        let idx = self
            .drivers
            .iter()
            .position(|d| d.name == driver)
            .ok_or_else(|| ServerError::UnknownDriver(driver.to_string()))?;

        let path = sensorhub_path::normalize(path)?;
        let id = self.bus.register_device(device_name)?;
        self.shared
            .borrow_mut()
            .tree
            .insert(&path, PathElement::device(device_name, &self.config.host))?;
        self.drivers[idx].devices.push(id);
        info!(driver, %path, device = device_name, "device registered");
        Ok(id)
    }

    pub fn publish_report<R: ReportType>(
        &mut self,
        device: SenderId,
        timestamp: TimeValue,
        report: &R,
    ) -> Result<()> {
        self.bus.publish_report(device, timestamp, report)?;
        Ok(())
    }

    /// Run one round of the transport and dispatch what arrived.
    ///
    /// Fails with a disconnect error (see [`ServerError::is_disconnect`])
    /// once the client has gone and everything it sent has been handled.
    pub fn poll(&mut self) -> Result<PollSummary> {
        Ok(self.bus.poll()?)
    }

    pub fn take_faults(&mut self) -> Vec<HandlerFault> {
        self.bus.take_faults()
    }
}

impl<T: Transport> Drop for Server<T> {
    fn drop(&mut self) {
        while let Some(driver) = self.drivers.pop() {
            drop(driver);
        }
    }
}

impl<T: Transport> std::fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("tree_nodes", &shared.tree.len())
            .field("routes", &shared.routes.len())
            .field("drivers", &self.drivers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use sensorhub_codec::{AnalogReport, WireMessage};
    use sensorhub_transport::LoopbackTransport;

    use super::*;

    fn route_message(text: &str) -> WireMessage {
        WireMessage::new(
            "client.test",
            sensorhub_path::ROUTE_UPDATE_TYPE,
            TimeValue::new(1, 0),
            text.as_bytes().to_vec(),
        )
    }

    #[test]
    fn route_update_from_client_is_applied() {
        let (transport, publisher) = LoopbackTransport::with_publisher(8);
        let mut server = Server::new(transport, PathTree::new()).unwrap();

        publisher
            .publish(route_message(
                r#"{"destination": "/me/head", "source": "/dev/tracker/0"}"#,
            ))
            .unwrap();
        server.poll().unwrap();

        assert_eq!(server.routes().len(), 1);
        assert_eq!(
            server.path_tree().element("/me/head").unwrap(),
            &PathElement::alias("/dev/tracker/0")
        );
        assert_eq!(server.route_updates(), 1);
    }

    #[test]
    fn malformed_route_update_is_a_fault() {
        let (transport, publisher) = LoopbackTransport::with_publisher(8);
        let mut server = Server::new(transport, PathTree::new()).unwrap();

        publisher.publish(route_message("{not json")).unwrap();
        let summary = server.poll().unwrap();

        assert_eq!(summary.faults, 1);
        assert!(server.routes().is_empty());
        assert!(server.path_tree().is_empty());
        assert_eq!(server.take_faults().len(), 1);
    }

    #[test]
    fn connection_is_logged_once() {
        let mut server = Server::new(LoopbackTransport::new(), PathTree::new()).unwrap();
        server.poll().unwrap();
        server.poll().unwrap();
        assert_eq!(server.connections(), 1);
    }

    #[test]
    fn driver_devices_appear_in_tree_and_publish() {
        let mut server = Server::new(LoopbackTransport::new(), PathTree::new()).unwrap();
        server.load_driver("com_example_Joystick").unwrap();
        let device = server
            .register_device("com_example_Joystick", "/com_example/Joystick0", "Joystick0")
            .unwrap();
        assert_eq!(
            server.path_tree().element("/com_example/Joystick0").unwrap(),
            &PathElement::device("Joystick0", "localhost")
        );

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        server
            .bus_mut()
            .register_handler(Some("Joystick0"), None, move |message| {
                sink.borrow_mut().push(message.decode::<AnalogReport>()?);
                Ok(())
            })
            .unwrap();
        let report = AnalogReport {
            sensor: 1,
            value: 0.25,
        };
        server
            .publish_report(device, TimeValue::new(2, 0), &report)
            .unwrap();
        server.poll().unwrap();
        assert_eq!(*seen.borrow(), vec![report]);
        assert_eq!(server.driver("com_example_Joystick").unwrap().devices(), &[device]);
    }

    #[test]
    fn unknown_and_duplicate_drivers() {
        let mut server = Server::new(LoopbackTransport::new(), PathTree::new()).unwrap();
        assert!(matches!(
            server.register_device("missing", "/x", "X"),
            Err(ServerError::UnknownDriver(_))
        ));
        server.load_driver("a").unwrap();
        assert!(matches!(
            server.load_driver("a"),
            Err(ServerError::DuplicateDriver(_))
        ));
    }

    #[test]
    fn drivers_release_objects_in_reverse_on_drop() {
        struct Tracked(&'static str, Rc<RefCell<Vec<&'static str>>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut server = Server::new(LoopbackTransport::new(), PathTree::new()).unwrap();
        let first = server.load_driver("first").unwrap();
        first.acquire_object(Tracked("first.a", Rc::clone(&log)));
        first.acquire_object(Tracked("first.b", Rc::clone(&log)));
        let second = server.load_driver("second").unwrap();
        let key = second.acquire_object(Tracked("second.a", Rc::clone(&log)));
        assert!(server.driver("second").unwrap().object::<Tracked>(key).is_some());

        drop(server);
        assert_eq!(*log.borrow(), vec!["second.a", "first.b", "first.a"]);
    }

    #[test]
    fn apply_routes_directly() {
        let mut server = Server::new(LoopbackTransport::new(), PathTree::new()).unwrap();
        let added = server
            .apply_routes(r#"[{"path": "/a", "source": "/b"}, {"path": "/c", "source": "/d"}]"#)
            .unwrap();
        assert_eq!(added, 2);
        assert!(server.apply_routes(r#"{"path": "/a"}"#).is_err());
        assert_eq!(server.routes().len(), 2);
    }

    #[test]
    fn rejected_route_document_leaves_routes_and_tree_untouched() {
        let mut server = Server::new(LoopbackTransport::new(), PathTree::new()).unwrap();
        server
            .apply_routes(r#"{"path": "/a", "source": "/b"}"#)
            .unwrap();
        let tree_before = server.path_tree().clone();

        let err = server.apply_routes(
            r#"[{"path": "/ok", "source": "/x"}, {"path": "/a/../c", "source": "/y"}]"#,
        );
        assert!(err.is_err());
        assert_eq!(server.routes().len(), 1);
        assert_eq!(server.routes().resolve_source("/ok"), None);
        assert_eq!(*server.path_tree(), tree_before);
        assert_eq!(server.route_updates(), 1);
    }
}
