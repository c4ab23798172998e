//! Sensor routing hub.
//!
//! sensorhub moves typed device reports from drivers to applications. Drivers
//! publish reports under a device name; applications ask for logical paths
//! such as `/me/head` and receive whatever the path tree and route table say
//! feeds that path.
//!
//! # Crate Structure
//!
//! - [`codec`]: binary report codec, timestamps, wire frames
//! - [`transport`]: transport contract, loopback and Unix socket transports
//! - [`path`]: path tree, aliases, route documents
//! - [`bus`]: handler registration and dispatch over a transport
//! - [`client`]: client contexts and interfaces with cached state
//! - [`server`]: the server side of route updates and driver devices
//! - [`pluginhost`]: locating driver plugins on disk

pub mod error;
pub mod pluginhost;
pub mod server;

/// Re-export codec types.
pub mod codec {
    pub use sensorhub_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use sensorhub_transport::*;
}

/// Re-export path tree and routing types.
pub mod path {
    pub use sensorhub_path::*;
}

/// Re-export bus types.
pub mod bus {
    pub use sensorhub_bus::*;
}

/// Re-export client types.
pub mod client {
    pub use sensorhub_client::*;
}

pub use error::{Result, ServerError};
pub use server::{DriverContext, Server, ServerConfig};
