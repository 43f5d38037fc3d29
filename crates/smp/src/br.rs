//! BR/EDR pairing over the SMP fixed channel.
//!
//! The link is already encrypted, so pairing only agrees on parameters and
//! exchanges identity and signing keys. Same table format and all-states
//! rows as LE, with separate rows.

use bsm::{define_ids, ControlBlock, MappedTable, StateMachine, Transition, ALL_TABLE, IGNORE};
use btc::BdAddr;

use crate::api::SmpEvent;
use crate::msg::{Body, Role, Transport};
use crate::pairing::{Distribution, Pairing};
use crate::pdu::{Pdu, Reason};
use crate::profile::{Env, Session};

define_ids! {
    pub enum BrState: StateId {
        Idle,
        WaitAppRsp,
        PairReqRsp,
        BondPending,
    }
}

define_ids! {
    pub enum BrEvt: EventId {
        PairingReq,
        PairingRsp,
        PairingFailed,
        KeyInfo,
        L2capConn,
        L2capDisconn,
        KeysRsp,
        ApiSecGrant,
        AuthCmpl,
        BondReq,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrAction {
    KeysReq,
    SendPairReq,
    ProcPairCmd,
    SendAppCback,
    ProcSecGrant,
    SendPairRsp,
    KeyDistribution,
    ProcKeyInfo,
    ProcPairFail,
    SendPairFail,
    PairingCmpl,
    PairTerminate,
}

type Cell = Transition<BrAction, BrState>;

use BrAction as A;
use BrState as S;

const __: u8 = IGNORE;
const X: u8 = ALL_TABLE;

static IDLE_MASTER: [Cell; 1] = [
    /* L2capConn */ Transition::new(&[A::KeysReq], S::WaitAppRsp),
];

static IDLE_SLAVE: [Cell; 1] = [
    /* PairingReq */ Transition::new(&[A::ProcPairCmd, A::SendAppCback], S::WaitAppRsp),
];

static WAIT_APP_RSP_MASTER: [Cell; 1] = [
    /* KeysRsp */ Transition::new(&[A::SendPairReq], S::PairReqRsp),
];

static WAIT_APP_RSP_SLAVE: [Cell; 2] = [
    /* ApiSecGrant */ Transition::new(&[A::ProcSecGrant], S::WaitAppRsp),
    /* KeysRsp */ Transition::new(&[A::SendPairRsp], S::BondPending),
];

static PAIR_REQ_RSP_MASTER: [Cell; 1] = [
    /* PairingRsp */ Transition::new(&[A::ProcPairCmd], S::BondPending),
];

static PAIR_REQ_RSP_SLAVE: [Cell; 0] = [];

static BOND_PENDING_MASTER: [Cell; 2] = [
    /* BondReq */ Transition::new(&[A::KeyDistribution], S::BondPending),
    /* KeyInfo */ Transition::new(&[A::ProcKeyInfo], S::BondPending),
];

static BOND_PENDING_SLAVE: [Cell; 2] = [
    /* BondReq */ Transition::new(&[A::KeyDistribution], S::BondPending),
    /* KeyInfo */ Transition::new(&[A::ProcKeyInfo], S::BondPending),
];

static STATES: &[&[&[Cell]]] = &[
    /* Idle */ &[&IDLE_MASTER, &IDLE_SLAVE],
    /* WaitAppRsp */ &[&WAIT_APP_RSP_MASTER, &WAIT_APP_RSP_SLAVE],
    /* PairReqRsp */ &[&PAIR_REQ_RSP_MASTER, &PAIR_REQ_RSP_SLAVE],
    /* BondPending */ &[&BOND_PENDING_MASTER, &BOND_PENDING_SLAVE],
];

static ENTRY: &[&[&[u8]]] = &[
    // master
    &[
        &[  __,  __,  __,  __], // PairingReq
        &[  __,  __,   1,  __], // PairingRsp
        &[  __, X|1, X|1, X|1], // PairingFailed
        &[  __,  __,  __,   2], // KeyInfo
        &[   1,  __,  __,  __], // L2capConn
        &[  __, X|3, X|3, X|3], // L2capDisconn
        &[  __,   1,  __,  __], // KeysRsp
        &[  __,  __,  __,  __], // ApiSecGrant
        &[  __, X|2, X|2, X|2], // AuthCmpl
        &[  __,  __,  __,   1], // BondReq
    ],
    // slave
    &[
        &[   1,  __,  __,  __], // PairingReq
        &[  __,  __,  __,  __], // PairingRsp
        &[  __, X|1, X|1, X|1], // PairingFailed
        &[  __,  __,  __,   2], // KeyInfo
        &[  __,  __,  __,  __], // L2capConn
        &[  __, X|3, X|3, X|3], // L2capDisconn
        &[  __,   2,  __,  __], // KeysRsp
        &[  __,   1,  __,  __], // ApiSecGrant
        &[  __, X|2, X|2, X|2], // AuthCmpl
        &[  __,  __,  __,   1], // BondReq
    ],
];

static ALL: [Cell; 3] = [
    /* PairingFailed */ Transition::new(&[A::ProcPairFail, A::PairingCmpl], S::Idle),
    /* AuthCmpl */ Transition::new(&[A::SendPairFail, A::PairingCmpl], S::Idle),
    /* L2capDisconn */ Transition::new(&[A::PairTerminate], S::Idle),
];

/// The BR/EDR pairing state machine.
pub static BR_SM: StateMachine<MappedTable<BrState, BrEvt, BrAction>> =
    StateMachine::new("smp-br", MappedTable::new(ENTRY, STATES, &ALL));

pub struct BrSession {
    pairing: Pairing,
    state: BrState,
}

impl Session for BrSession {
    fn open(env: &Env, remote: BdAddr, role: Role, session: u32) -> Self {
        Self {
            pairing: Pairing::new(env, remote, Transport::BrEdr, role, session),
            state: BrState::Idle,
        }
    }

    fn is_idle(&self) -> bool {
        self.state == BrState::Idle
    }

    fn is_finished(&self) -> bool {
        self.pairing.is_finished()
    }

    fn session(&self) -> u32 {
        self.pairing.session
    }
}

impl BrSession {
    pub fn remote(&self) -> BdAddr {
        self.pairing.remote
    }

    pub fn role(&self) -> Role {
        self.pairing.role
    }
}

impl ControlBlock for BrSession {
    type State = BrState;
    type Event = BrEvt;
    type Action = BrAction;
    type Data = Body;
    type Context = Env;

    fn state(&self) -> BrState {
        self.state
    }

    fn set_state(&mut self, next: BrState) {
        self.state = next;
    }

    fn role(&self) -> usize {
        self.pairing.role.index()
    }

    fn perform(&mut self, env: &mut Env, action: BrAction, data: &mut Option<Body>) {
        if self.pairing.is_finished() {
            log::debug!("{}: {:?} skipped, pairing over", self.pairing.remote, action);
            return;
        }
        match action {
            BrAction::KeysReq => self.reenter(env, BrEvt::KeysRsp, Body::KeysRsp),
            BrAction::SendPairReq => {
                let preq = env.config.pair_params();
                self.pairing.preq = Some(preq);
                self.send(env, Pdu::PairingReq(preq));
            }
            BrAction::ProcPairCmd => self.proc_pair_cmd(env, data),
            BrAction::SendAppCback => {
                let remote = self.pairing.remote;
                self.pairing.notify(env, SmpEvent::SecRequest { remote });
            }
            BrAction::ProcSecGrant => match data {
                Some(Body::SecGrant(true)) => self.reenter(env, BrEvt::KeysRsp, Body::KeysRsp),
                _ => self.fail(env, Reason::PairingNotSupported),
            },
            BrAction::SendPairRsp => {
                let Some(preq) = self.pairing.preq else {
                    self.fail(env, Reason::Unspecified);
                    return;
                };
                let pres = self.pairing.response_to(env, &preq);
                self.pairing.pres = Some(pres);
                self.pairing.negotiate_keys();
                if self.send(env, Pdu::PairingRsp(pres)) {
                    self.reenter(env, BrEvt::BondReq, Body::BondReq);
                }
            }
            BrAction::KeyDistribution => self.key_distribution(env),
            BrAction::ProcKeyInfo => {
                if let Some(Body::Pdu(Pdu::KeyInfo(key))) = data {
                    self.pairing.store_key(env, *key);
                }
                self.key_distribution(env);
            }
            BrAction::ProcPairFail => {
                self.pairing.reason = match data {
                    Some(Body::Pdu(Pdu::PairingFailed(reason))) => *reason,
                    _ => Reason::Unspecified,
                };
            }
            BrAction::SendPairFail => {
                let reason = match data {
                    Some(Body::AuthCmpl(reason)) => *reason,
                    Some(Body::RspTimeout { .. }) => Reason::RspTimeout,
                    _ => Reason::Unspecified,
                };
                self.pairing.reason = reason;
                if reason.code().is_some() {
                    self.pairing.send(env, Pdu::PairingFailed(reason));
                }
            }
            BrAction::PairingCmpl => self.pairing.finish(env),
            BrAction::PairTerminate => {
                self.pairing.reason = Reason::ConnTimeout;
                self.pairing.finish(env);
            }
        }
    }
}

impl BrSession {
    fn reenter(&mut self, env: &mut Env, event: BrEvt, body: Body) {
        let _ = BR_SM.execute(self, env, event, Some(body));
    }

    fn fail(&mut self, env: &mut Env, reason: Reason) {
        self.reenter(env, BrEvt::AuthCmpl, Body::AuthCmpl(reason));
    }

    fn send(&mut self, env: &mut Env, pdu: Pdu) -> bool {
        if self.pairing.send(env, pdu) {
            return true;
        }
        self.fail(env, Reason::Unspecified);
        false
    }

    fn proc_pair_cmd(&mut self, env: &mut Env, data: &mut Option<Body>) {
        let params = match data {
            Some(Body::Pdu(Pdu::PairingReq(params) | Pdu::PairingRsp(params))) => *params,
            _ => return,
        };
        if !params.is_valid() {
            self.fail(env, Reason::EncKeySize);
            return;
        }

        if self.pairing.is_master() {
            self.pairing.pres = Some(params);
            self.pairing.negotiate_keys();
            self.reenter(env, BrEvt::BondReq, Body::BondReq);
        } else {
            self.pairing.preq = Some(params);
        }
    }

    fn key_distribution(&mut self, env: &mut Env) {
        match self.pairing.distribute(env) {
            Distribution::Waiting => {}
            Distribution::Done => {
                self.reenter(env, BrEvt::AuthCmpl, Body::AuthCmpl(Reason::Success))
            }
            Distribution::Failed => self.fail(env, Reason::Unspecified),
        }
    }
}
