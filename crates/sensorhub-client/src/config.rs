pub use sensorhub_path::ROUTE_UPDATE_TYPE;

/// Settings for a [`ClientContext`](crate::ClientContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Prepended to the app id to name the context's own device.
    pub client_device_prefix: String,
    /// Message type used by `send_route`.
    pub route_message_type: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            client_device_prefix: "client.".to_string(),
            route_message_type: ROUTE_UPDATE_TYPE.to_string(),
        }
    }
}
