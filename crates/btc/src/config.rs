//! Transport configuration.

/// Sizing and hooks of one transport/dispatcher pair.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub name: &'static str,
    /// Messages the queue holds before `submit` fails.
    pub queue_capacity: usize,
    pub max_profiles: usize,
    /// Called every time the pump drains the queue.
    pub idle_callback: Option<fn()>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            name: "BTC",
            queue_capacity: 60,
            max_profiles: 16,
            idle_callback: None,
        }
    }
}

impl TransportConfig {
    /// Creates a new transport configuration builder.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Sets the transport name used in log lines.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the queue length. Zero is raised to one.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Sets the maximum number of registered profiles.
    pub fn max_profiles(mut self, max: usize) -> Self {
        self.config.max_profiles = max;
        self
    }

    /// Sets the callback run whenever the pump drains the queue.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    /// Builds the transport configuration.
    pub fn build(self) -> TransportConfig {
        self.config
    }
}
