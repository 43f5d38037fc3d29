//! GATT client configuration.

use crate::clcb::CMD_QUEUE_DEPTH;
use crate::profile::CLCB_MAX;

#[derive(Debug, Clone)]
pub struct GattcConfig {
    /// Start service discovery on connect when the server is not cached.
    pub auto_discover: bool,
    /// Commands a connection may hold behind the in-flight one.
    pub max_pending: usize,
    pub max_clients: u8,
    pub max_connections: usize,
}

impl Default for GattcConfig {
    fn default() -> Self {
        Self {
            auto_discover: true,
            max_pending: CMD_QUEUE_DEPTH,
            max_clients: 4,
            max_connections: CLCB_MAX,
        }
    }
}

impl GattcConfig {
    /// Creates a new GATT client configuration builder.
    pub fn builder() -> GattcConfigBuilder {
        GattcConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GattcConfigBuilder {
    config: GattcConfig,
}

impl GattcConfigBuilder {
    /// Sets whether a new connection discovers an uncached server.
    pub fn auto_discover(mut self, enabled: bool) -> Self {
        self.config.auto_discover = enabled;
        self
    }

    /// Sets the commands held per connection, capped at [`CMD_QUEUE_DEPTH`].
    pub fn max_pending(mut self, max: usize) -> Self {
        self.config.max_pending = max.min(CMD_QUEUE_DEPTH);
        self
    }

    /// Sets the maximum number of registered client interfaces.
    pub fn max_clients(mut self, max: u8) -> Self {
        self.config.max_clients = max;
        self
    }

    /// Sets the connection pool size, capped at [`CLCB_MAX`].
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max.min(CLCB_MAX);
        self
    }

    /// Builds the GATT client configuration.
    pub fn build(self) -> GattcConfig {
        self.config
    }
}
