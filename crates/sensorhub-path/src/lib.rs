//! Path namespace and routing for sensorhub.
//!
//! A [`PathTree`] names every device, sensor and alias the hub knows about.
//! A [`RouteTable`] maps externally visible destination paths onto the source
//! paths that actually feed them. Route documents are JSON, validated against
//! an embedded JSON Schema before use.

pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod path;
pub mod route;
pub mod tree;
pub mod validator;

pub use config::TreeConfig;
pub use element::{AliasElement, DeviceElement, PathElement, SensorElement, StringElement};
pub use error::{PathError, Result};
pub use path::normalize;
pub use route::{parse_routes, RouteDirective, RouteTable, ROUTE_UPDATE_TYPE};
pub use tree::{PathNode, PathTree, MAX_ALIAS_HOPS};
pub use validator::{validate_route_document, ROUTE_SCHEMA};
