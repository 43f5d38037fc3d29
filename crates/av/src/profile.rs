//! The A2DP profile: owns the connection machine while enabled.

use core::any::Any;

use bsm::{Error, FlatMachine, Result, Status};
use btc::{Disposition, Message, Profile};

use crate::api::{AvHandler, AvLink};
use crate::config::AvConfig;
use crate::msg::AvMsg;
use crate::sm::{AvCb, AvState, Flags, Machine, AV_HANDLERS};

/// Progress of a disable request made while a link was up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    None,
    Pending { close_sent: bool },
}

pub struct Av {
    config: AvConfig,
    sm: Option<Machine>,
    teardown: Teardown,
}

impl Av {
    /// A disabled profile; [`Av::enable`] creates the machine.
    pub fn new(config: AvConfig) -> Self {
        Self {
            config,
            sm: None,
            teardown: Teardown::None,
        }
    }

    pub fn config(&self) -> &AvConfig {
        &self.config
    }

    /// Creates the machine in `Idle`.
    pub fn enable(&mut self, link: Box<dyn AvLink>, handler: Box<dyn AvHandler>) -> Result<()> {
        if self.sm.is_some() {
            log::warn!("{}: already enabled", self.config.name);
            return Err(Error::InvalidState);
        }
        let cb = AvCb::new(link, handler, self.config.clone());
        self.sm = Some(FlatMachine::init(
            self.config.name,
            &AV_HANDLERS,
            AvState::Idle,
            cb,
        )?);
        self.teardown = Teardown::None;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.sm.is_some()
    }

    pub fn state(&self) -> Option<AvState> {
        self.sm.as_ref().map(FlatMachine::state)
    }

    pub fn control_block(&self) -> Option<&AvCb> {
        self.sm.as_ref().map(FlatMachine::context)
    }

    /// The link is open and nothing keeps the stream from starting.
    pub fn stream_ready(&self) -> bool {
        self.ready_in(AvState::Opened, Flags::REMOTE_SUSPEND | Flags::PENDING_STOP)
    }

    /// The stream is running with no suspend or stop under way.
    pub fn stream_started_ready(&self) -> bool {
        self.ready_in(
            AvState::Started,
            Flags::LOCAL_SUSPEND_PENDING | Flags::REMOTE_SUSPEND | Flags::PENDING_STOP,
        )
    }

    fn ready_in(&self, state: AvState, blocking: Flags) -> bool {
        self.sm
            .as_ref()
            .is_some_and(|sm| sm.state() == state && !sm.context().flags().intersects(blocking))
    }

    /// Hands `msg` to the machine.
    pub fn dispatch(&mut self, msg: AvMsg) -> Status {
        if msg == AvMsg::ApiDisable {
            return self.disable();
        }
        let Some(sm) = self.sm.as_mut() else {
            log::warn!("{}: disabled, {:?} dropped", self.config.name, msg);
            return Status::InvalidState;
        };
        let status = sm.dispatch(msg);
        self.settle();
        status
    }

    /// Releases the machine. With a link up, the link is closed first and
    /// the machine goes once it is back in `Idle`.
    pub fn disable(&mut self) -> Status {
        let Some(sm) = self.sm.as_ref() else {
            log::warn!("{}: not enabled", self.config.name);
            return Status::InvalidState;
        };
        if sm.state() == AvState::Idle {
            self.release();
            return Status::Success;
        }
        if self.teardown == Teardown::None {
            self.teardown = Teardown::Pending { close_sent: false };
            self.settle();
        }
        Status::CmdStarted
    }

    fn settle(&mut self) {
        let Teardown::Pending { close_sent } = self.teardown else {
            return;
        };
        let Some(sm) = self.sm.as_mut() else {
            return;
        };
        match sm.state() {
            AvState::Idle => self.release(),
            AvState::Opened | AvState::Started if !close_sent => {
                self.teardown = Teardown::Pending { close_sent: true };
                let remote = sm.context().peer();
                sm.dispatch(AvMsg::DisconnectReq { remote });
                if sm.state() == AvState::Idle {
                    self.release();
                }
            }
            _ => {}
        }
    }

    fn release(&mut self) {
        if let Some(sm) = self.sm.take() {
            drop(sm.shutdown());
            log::debug!("{}: disabled", self.config.name);
        }
        self.teardown = Teardown::None;
    }

    pub fn hdl_event(&mut self, msg: AvMsg) -> Disposition {
        self.dispatch(msg);
        Disposition::Released
    }
}

impl Profile for Av {
    fn call(&mut self, msg: Message) -> Disposition {
        let envelope = msg.envelope();
        match msg.into_args::<AvMsg>() {
            Some(msg) => self.hdl_event(msg),
            None => {
                log::error!("{}: {:?} without arguments", self.config.name, envelope);
                Disposition::Released
            }
        }
    }

    fn callback(&mut self, msg: Message) -> Disposition {
        self.call(msg)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
