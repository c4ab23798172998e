//! Client side of sensorhub.
//!
//! A [`ClientContext`] resolves application-facing paths through routes and
//! aliases to the devices that feed them, and hands out [`ClientInterface`]s
//! that cache the latest state per report type and run callbacks whenever
//! the context is updated.
//!
//! ```no_run
//! use sensorhub_client::ClientContext;
//! use sensorhub_codec::{PoseReport, TimeValue};
//! use sensorhub_transport::UnixDomainSocket;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = UnixDomainSocket::connect("/tmp/sensorhub.sock")?;
//! let mut ctx = ClientContext::new("com.example.viewer", transport)?;
//! let head = ctx.get_interface("/me/head")?;
//! head.register_callback(|ts: &TimeValue, pose: &PoseReport| {
//!     println!("{}.{:06}: {:?}", ts.seconds, ts.microseconds, pose.translation);
//! });
//! loop {
//!     ctx.update()?;
//! }
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod interface;
pub mod ownership;
mod registry;

pub use config::{ContextConfig, ROUTE_UPDATE_TYPE};
pub use context::ClientContext;
pub use error::{ClientError, Result};
pub use interface::{ClientInterface, InterfaceSource};
pub use ownership::{KeyedOwnership, ObjectKey};
