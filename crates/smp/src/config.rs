//! Local pairing parameters.

use btc::BdAddr;

use crate::pdu::{AuthReq, IoCap, Key128, KeyMask, PairParams, MAX_KEY_SIZE, MIN_KEY_SIZE};

/// Ticks the peer has to answer a command (30 s at 100 ticks per second).
pub const RSP_TIMEOUT_TICKS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct SmpConfig {
    /// Own address, an input of every confirm and check value.
    pub local_addr: BdAddr,
    pub io_cap: IoCap,
    pub auth_req: AuthReq,
    pub max_key_size: u8,
    /// Keys we distribute as initiator / ask for as initiator.
    pub init_keys: KeyMask,
    pub resp_keys: KeyMask,
    /// Identity resolving key handed out with the ID key.
    pub irk: Key128,
    pub rsp_timeout_ticks: u64,
    pub max_sessions: usize,
}

impl Default for SmpConfig {
    fn default() -> Self {
        Self {
            local_addr: BdAddr::ANY,
            io_cap: IoCap::NoInputNoOutput,
            auth_req: AuthReq(AuthReq::BOND),
            max_key_size: MAX_KEY_SIZE,
            init_keys: KeyMask::ENC | KeyMask::ID,
            resp_keys: KeyMask::ENC | KeyMask::ID,
            irk: [0; 16],
            rsp_timeout_ticks: RSP_TIMEOUT_TICKS,
            max_sessions: 4,
        }
    }
}

impl SmpConfig {
    /// Creates a new pairing configuration builder.
    pub fn builder() -> SmpConfigBuilder {
        SmpConfigBuilder::default()
    }

    /// Pairing Request/Response body advertising this configuration.
    pub fn pair_params(&self) -> PairParams {
        PairParams {
            io_cap: self.io_cap,
            oob: false,
            auth_req: self.auth_req,
            max_key_size: self.max_key_size,
            init_keys: self.init_keys,
            resp_keys: self.resp_keys,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmpConfigBuilder {
    config: SmpConfig,
}

impl SmpConfigBuilder {
    /// Sets the local device address.
    pub fn local_addr(mut self, addr: BdAddr) -> Self {
        self.config.local_addr = addr;
        self
    }

    /// Sets the advertised IO capabilities.
    pub fn io_cap(mut self, io_cap: IoCap) -> Self {
        self.config.io_cap = io_cap;
        self
    }

    /// Sets the authentication requirements.
    pub fn auth_req(mut self, auth_req: AuthReq) -> Self {
        self.config.auth_req = auth_req;
        self
    }

    /// Sets the maximum encryption key size, clamped to 7..=16 octets.
    pub fn max_key_size(mut self, size: u8) -> Self {
        self.config.max_key_size = size.clamp(MIN_KEY_SIZE, MAX_KEY_SIZE);
        self
    }

    /// Sets the keys the initiator distributes.
    pub fn init_keys(mut self, keys: KeyMask) -> Self {
        self.config.init_keys = keys;
        self
    }

    /// Sets the keys the responder distributes.
    pub fn resp_keys(mut self, keys: KeyMask) -> Self {
        self.config.resp_keys = keys;
        self
    }

    /// Sets the identity resolving key.
    pub fn irk(mut self, irk: Key128) -> Self {
        self.config.irk = irk;
        self
    }

    /// Sets the response timeout in ticks. Zero is raised to one.
    pub fn rsp_timeout_ticks(mut self, ticks: u64) -> Self {
        self.config.rsp_timeout_ticks = ticks.max(1);
        self
    }

    /// Sets the maximum number of concurrent pairing sessions.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    /// Builds the pairing configuration.
    pub fn build(self) -> SmpConfig {
        self.config
    }
}
