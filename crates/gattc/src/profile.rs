//! The GATT client profile: client registry, control-block pool and event
//! routing.

use core::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use bsm::{ControlBlock, Error, Result, Status};
use btc::{BdAddr, Disposition, Message, Profile, Sender};

use crate::api::{GattClient, GattcApi, GattcEvent, GattcHandler};
use crate::clcb::Clcb;
use crate::config::GattcConfig;
use crate::msg::GattcMsg;
use crate::sm::{GattcEvt, GattcState, GATTC_SM};

/// Connection control blocks the pool can hold.
pub const CLCB_MAX: usize = 8;

/// Everything the actions reach besides their own control block.
pub struct Env {
    pub(crate) link: Box<dyn GattClient>,
    pub(crate) clients: BTreeMap<u8, Box<dyn GattcHandler>>,
    pub(crate) api: GattcApi,
    pub(crate) config: GattcConfig,
    /// Servers whose database has been discovered.
    pub(crate) cache: BTreeSet<BdAddr>,
}

impl Env {
    pub(crate) fn notify(&mut self, client_if: u8, event: GattcEvent) {
        match self.clients.get_mut(&client_if) {
            Some(handler) => handler.on_event(event),
            None => log::debug!("client {} gone, {:?} dropped", client_if, event),
        }
    }
}

pub struct Gattc {
    env: Env,
    clcbs: heapless::Vec<Clcb, CLCB_MAX>,
}

impl Gattc {
    pub fn new(link: Box<dyn GattClient>, sender: Sender, config: GattcConfig) -> Self {
        Self {
            env: Env {
                link,
                clients: BTreeMap::new(),
                api: GattcApi::new(sender),
                config,
                cache: BTreeSet::new(),
            },
            clcbs: heapless::Vec::new(),
        }
    }

    pub fn config(&self) -> &GattcConfig {
        &self.env.config
    }

    /// Registers an application and returns its client interface.
    pub fn register(&mut self, mut handler: Box<dyn GattcHandler>) -> Result<u8> {
        let free = (1..=self.env.config.max_clients).find(|id| !self.env.clients.contains_key(id));
        let Some(client_if) = free else {
            log::warn!("no free client interface");
            handler.on_event(GattcEvent::Reg {
                status: Status::NoMem,
                client_if: 0,
            });
            return Err(Error::NoMem);
        };

        self.env.clients.insert(client_if, handler);
        self.env.notify(
            client_if,
            GattcEvent::Reg {
                status: Status::Success,
                client_if,
            },
        );
        Ok(client_if)
    }

    /// Closes every connection of `client_if`, then forgets it.
    pub fn deregister(&mut self, client_if: u8) -> Result<()> {
        if !self.env.clients.contains_key(&client_if) {
            return Err(Error::InvalidState);
        }

        for clcb in self.clcbs.iter_mut().filter(|c| c.client_if() == client_if) {
            let (event, msg) = match clcb.state() {
                GattcState::WaitConn => (
                    GattcEvt::ApiCancelOpen,
                    GattcMsg::ApiCancelOpen {
                        client_if,
                        remote: clcb.remote(),
                    },
                ),
                GattcState::Conn | GattcState::Discover => (
                    GattcEvt::ApiClose,
                    GattcMsg::ApiClose {
                        conn_id: clcb.conn_id(),
                    },
                ),
                GattcState::Idle => continue,
            };
            let _ = GATTC_SM.execute(clcb, &mut self.env, event, Some(msg));
        }
        self.clcbs.retain(|c| c.client_if() != client_if);

        self.env.notify(client_if, GattcEvent::Dereg { client_if });
        self.env.clients.remove(&client_if);
        Ok(())
    }

    pub fn clcb(&self, conn_id: u16) -> Option<&Clcb> {
        self.clcbs.iter().find(|c| c.conn_id() == conn_id)
    }

    pub fn clcb_by_remote(&self, client_if: u8, remote: BdAddr) -> Option<&Clcb> {
        self.clcbs
            .iter()
            .find(|c| c.client_if() == client_if && c.remote() == remote)
    }

    /// Live control blocks.
    pub fn connections(&self) -> usize {
        self.clcbs.len()
    }

    pub fn is_cached(&self, remote: BdAddr) -> bool {
        self.env.cache.contains(&remote)
    }

    /// Routes one message to its control block and runs the state machine.
    ///
    /// Connection requests and incoming connections allocate a control
    /// block; every other event for a control block that does not exist is
    /// dropped.
    pub fn hdl_event(&mut self, msg: GattcMsg) -> Disposition {
        let Some(event) = msg.event() else {
            self.hdl_direct(msg);
            return Disposition::Released;
        };

        let index = match &msg {
            GattcMsg::ApiOpen {
                client_if, remote, ..
            }
            | GattcMsg::IntConn {
                client_if, remote, ..
            } => self
                .find_remote(*client_if, *remote)
                .or_else(|| self.alloc(*client_if, *remote)),
            GattcMsg::IntOpenFail { client_if, remote }
            | GattcMsg::ApiCancelOpen { client_if, remote }
            | GattcMsg::IntCancelOpenOk { client_if, remote } => {
                self.find_remote(*client_if, *remote)
            }
            _ => msg.conn_id().and_then(|conn_id| self.find_conn(conn_id)),
        };

        let Some(index) = index else {
            log::debug!("{:?}: no control block, dropped", event);
            self.report_unrouted(&msg);
            return Disposition::Released;
        };

        let outcome = GATTC_SM.execute(&mut self.clcbs[index], &mut self.env, event, Some(msg));
        self.clcbs.retain(|c| !c.is_finished());

        if outcome.retained() {
            Disposition::Retained
        } else {
            Disposition::Released
        }
    }

    fn hdl_direct(&mut self, msg: GattcMsg) {
        match msg {
            GattcMsg::ApiRefresh { remote } => {
                log::debug!("{}: cache refreshed", remote);
                self.env.cache.remove(&remote);
            }
            GattcMsg::ApiDeregister { client_if } => {
                if let Err(err) = self.deregister(client_if) {
                    log::warn!("client {}: deregister failed: {}", client_if, err);
                }
            }
            other => log::error!("{:?} has no direct handler", other),
        }
    }

    /// Answers requests that could not reach a control block.
    fn report_unrouted(&mut self, msg: &GattcMsg) {
        match *msg {
            GattcMsg::ApiOpen {
                client_if, remote, ..
            } => self.env.notify(
                client_if,
                GattcEvent::Open {
                    status: Status::NoMem,
                    conn_id: 0,
                    remote,
                    mtu: 0,
                },
            ),
            GattcMsg::ApiCancelOpen { client_if, .. } => self.env.notify(
                client_if,
                GattcEvent::CancelOpen {
                    status: Status::Fail,
                },
            ),
            _ => {}
        }
    }

    fn find_remote(&self, client_if: u8, remote: BdAddr) -> Option<usize> {
        self.clcbs
            .iter()
            .position(|c| c.client_if() == client_if && c.remote() == remote)
    }

    fn find_conn(&self, conn_id: u16) -> Option<usize> {
        self.clcbs.iter().position(|c| c.conn_id() == conn_id)
    }

    fn alloc(&mut self, client_if: u8, remote: BdAddr) -> Option<usize> {
        if !self.env.clients.contains_key(&client_if) {
            log::warn!("client {} not registered", client_if);
            return None;
        }
        if self.clcbs.len() >= self.env.config.max_connections {
            log::warn!("{}: no free connection control block", remote);
            return None;
        }
        let clcb = Clcb::new(client_if, remote, self.env.config.max_pending);
        if self.clcbs.push(clcb).is_err() {
            return None;
        }
        Some(self.clcbs.len() - 1)
    }
}

impl Profile for Gattc {
    fn call(&mut self, msg: Message) -> Disposition {
        match msg.into_args::<GattcMsg>() {
            Some(msg) => self.hdl_event(msg),
            None => Disposition::Released,
        }
    }

    fn callback(&mut self, msg: Message) -> Disposition {
        self.call(msg)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
