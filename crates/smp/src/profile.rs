//! Pairing session registry and event routing.

use std::any::Any;
use std::collections::BTreeMap;

use bsm::{ControlBlock, Lookup, StateMachine};
use btc::{BdAddr, Disposition, Message, Profile, TimerWheel};

use crate::api::{SecLevel, SmpCrypto, SmpEvent, SmpHandler, SmpLink};
use crate::br::{BrSession, BR_SM};
use crate::config::SmpConfig;
use crate::le::{LeSession, LE_SM};
use crate::msg::{Body, Role, SmpMsg, Transport};
use crate::pdu::{Key128, KeyMask, Pdu, Reason};

/// Everything the actions reach besides their own session.
pub struct Env {
    pub(crate) link: Box<dyn SmpLink>,
    pub(crate) crypto: Box<dyn SmpCrypto>,
    pub(crate) handler: Box<dyn SmpHandler>,
    pub(crate) config: SmpConfig,
    pub(crate) wheel: TimerWheel,
    /// Generation of the most recently opened session.
    pub(crate) last_session: u32,
}

/// Pairing session as kept by the registry.
pub(crate) trait Session: Sized {
    fn open(env: &Env, remote: BdAddr, role: Role, session: u32) -> Self;

    fn is_idle(&self) -> bool;

    fn is_finished(&self) -> bool;

    /// Generation the session was opened with.
    fn session(&self) -> u32;
}

/// The Security Manager profile. Sessions are keyed by peer address, one
/// per transport.
pub struct Smp {
    env: Env,
    le: BTreeMap<BdAddr, LeSession>,
    br: BTreeMap<BdAddr, BrSession>,
}

impl Smp {
    /// Response timers are registered with `wheel`; its ticks post their
    /// expiry through the transport.
    pub fn new(
        link: Box<dyn SmpLink>,
        crypto: Box<dyn SmpCrypto>,
        handler: Box<dyn SmpHandler>,
        wheel: TimerWheel,
        config: SmpConfig,
    ) -> Self {
        Self {
            env: Env {
                link,
                crypto,
                handler,
                config,
                wheel,
                last_session: 0,
            },
            le: BTreeMap::new(),
            br: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &SmpConfig {
        &self.env.config
    }

    pub fn le_session(&self, remote: BdAddr) -> Option<&LeSession> {
        self.le.get(&remote)
    }

    pub fn br_session(&self, remote: BdAddr) -> Option<&BrSession> {
        self.br.get(&remote)
    }

    /// Key the controller encrypts the LE link to `remote` with.
    pub fn session_key(&self, remote: BdAddr) -> Option<Key128> {
        self.le.get(&remote)?.session_key()
    }

    pub fn session_count(&self) -> usize {
        self.le.len() + self.br.len()
    }

    pub fn hdl_event(&mut self, msg: SmpMsg) -> Disposition {
        let SmpMsg {
            remote,
            transport,
            body,
        } = msg;

        match transport {
            Transport::Le => match body.le_event() {
                Some(event) => {
                    let others = self.br.len();
                    route(&mut self.env, &mut self.le, others, &LE_SM, remote, transport, event, body)
                }
                None => log::debug!("{}: {:?} has no LE event", remote, body),
            },
            Transport::BrEdr => match body.br_event() {
                Some(event) => {
                    let others = self.le.len();
                    route(&mut self.env, &mut self.br, others, &BR_SM, remote, transport, event, body)
                }
                None => log::debug!("{}: {:?} has no BR/EDR event", remote, body),
            },
        }
        Disposition::Released
    }
}

/// Role of the session `body` opens, `None` when it cannot start one.
fn opening_role(body: &Body) -> Option<Role> {
    match body {
        Body::L2capConn { role } => Some(*role),
        Body::Pdu(Pdu::PairingReq(_)) => Some(Role::Slave),
        Body::Pdu(Pdu::SecurityReq(_)) => Some(Role::Master),
        _ => None,
    }
}

/// Delivers one event to the session with `remote`, opening it when the
/// event starts a pairing. Finished sessions are released, and a response
/// timeout is only delivered to the session that armed it.
#[allow(clippy::too_many_arguments)]
fn route<S, L>(
    env: &mut Env,
    sessions: &mut BTreeMap<BdAddr, S>,
    others: usize,
    machine: &StateMachine<L>,
    remote: BdAddr,
    transport: Transport,
    event: L::Event,
    body: Body,
) where
    L: Lookup,
    S: Session
        + ControlBlock<
            State = L::State,
            Event = L::Event,
            Action = L::Action,
            Data = Body,
            Context = Env,
        >,
{
    if let Body::RspTimeout { session } = body {
        if sessions.get(&remote).map(S::session) != Some(session) {
            log::debug!("{}: stale response timeout of session {} dropped", remote, session);
            return;
        }
    }
    if !sessions.contains_key(&remote) {
        let Some(role) = opening_role(&body) else {
            log::debug!("{}: {:?} without a pairing session dropped", remote, event);
            return;
        };
        if sessions.len() + others >= env.config.max_sessions {
            refuse(env, remote, transport, &body);
            return;
        }
        log::debug!("{}: {:?} pairing as {:?}", remote, transport, role);
        env.last_session = env.last_session.wrapping_add(1);
        let session = S::open(env, remote, role, env.last_session);
        sessions.insert(remote, session);
    }

    let Some(session) = sessions.get_mut(&remote) else {
        return;
    };
    let outcome = machine.execute(session, env, event, Some(body));
    if session.is_finished() || (!outcome.handled() && session.is_idle()) {
        sessions.remove(&remote);
    }
}

/// Turns away a pairing that would exceed the session limit.
fn refuse(env: &mut Env, remote: BdAddr, transport: Transport, body: &Body) {
    log::warn!("{}: no room for another pairing session", remote);
    match body {
        Body::L2capConn { .. } => env.handler.on_event(SmpEvent::Complete {
            remote,
            reason: Reason::Unspecified,
            sec_level: SecLevel::None,
            secure_connections: false,
            keys: KeyMask::NONE,
        }),
        Body::Pdu(Pdu::PairingReq(_)) => {
            let status = env
                .link
                .send(remote, transport, &Pdu::PairingFailed(Reason::Unspecified));
            if !status.is_ok() {
                log::warn!("{}: pairing failure not sent: {}", remote, status);
            }
        }
        _ => {}
    }
}

impl Profile for Smp {
    fn call(&mut self, msg: Message) -> Disposition {
        let envelope = msg.envelope();
        match msg.into_args::<SmpMsg>() {
            Some(msg) => self.hdl_event(msg),
            None => {
                log::error!("{:?}: missing security manager message", envelope);
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
