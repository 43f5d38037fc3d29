//! A2DP profile configuration.

#[derive(Debug, Clone)]
pub struct AvConfig {
    pub name: &'static str,
    /// Open the AVRCP control channel together with the stream.
    pub with_rc: bool,
    /// Suspend a stream the peer starts on its own while we are the source.
    pub suspend_remote_start: bool,
}

impl Default for AvConfig {
    fn default() -> Self {
        Self {
            name: "av",
            with_rc: false,
            suspend_remote_start: true,
        }
    }
}

impl AvConfig {
    /// Creates a new A2DP configuration builder.
    pub fn builder() -> AvConfigBuilder {
        AvConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AvConfigBuilder {
    config: AvConfig,
}

impl AvConfigBuilder {
    /// Sets the machine name used in log lines.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets whether the AVRCP control channel opens with the stream.
    pub fn with_rc(mut self, enabled: bool) -> Self {
        self.config.with_rc = enabled;
        self
    }

    /// Sets whether a stream started by a sink peer is suspended.
    pub fn suspend_remote_start(mut self, enabled: bool) -> Self {
        self.config.suspend_remote_start = enabled;
        self
    }

    /// Builds the A2DP configuration.
    pub fn build(self) -> AvConfig {
        self.config
    }
}
