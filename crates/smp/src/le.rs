//! LE pairing: master and slave roles over one entry-mapped table.
//!
//! Each role has its own rows per state. Pairing Failed, local
//! authentication completion and link loss are written once, in the
//! all-states table, and reach it from every state except `Idle`.
//!
//! Actions report failures by re-entering [`LE_SM`] with
//! [`LeEvt::AuthCmpl`]; once a session finished, the remaining actions
//! of the cell are skipped.

use bsm::{define_ids, ControlBlock, MappedTable, StateMachine, Transition, ALL_TABLE, IGNORE};
use btc::BdAddr;

use crate::api::SmpEvent;
use crate::model::{self, Entry, Model};
use crate::msg::{Body, LocalKey, Role, Transport};
use crate::pairing::{Distribution, Pairing};
use crate::pdu::{DhKey, Key128, Pdu, PublicKey, Reason};
use crate::profile::{Env, Session};

define_ids! {
    pub enum LeState: StateId {
        Idle,
        /// Waiting for the application (grant, IO capabilities, passkey).
        WaitAppRsp,
        /// Slave sent a Security Request.
        SecReqPending,
        PairReqRsp,
        WaitConfirm,
        Confirm,
        Rand,
        PublicKeyExch,
        WaitCommitment,
        WaitNonce,
        WaitDhkCheck,
        EncPending,
        BondPending,
    }
}

define_ids! {
    pub enum LeEvt: EventId {
        PairingReq,
        PairingRsp,
        Confirm,
        Rand,
        PairingFailed,
        KeyInfo,
        SecurityReq,
        PublicKey,
        DhkeyCheck,
        KeyReady,
        Encrypted,
        L2capConn,
        L2capDisconn,
        IoRsp,
        ApiSecGrant,
        TkReq,
        AuthCmpl,
        BondReq,
        PublKeyExchReq,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeAction {
    ProcSecReq,
    SendAppCback,
    ProcSecGrant,
    IoCapReq,
    SendPairReq,
    ProcIoRsp,
    ProcPairCmd,
    GenerateConfirm,
    SendConfirm,
    ProcSlKey,
    ProcConfirm,
    SendRand,
    ProcRand,
    ProcCompare,
    StartEnc,
    CheckAuthReq,
    KeyDistribution,
    ProcKeyInfo,
    ScStart,
    SendPublicKey,
    ProcPublicKey,
    SendCommitment,
    ProcNonce,
    ProcDhkeyCheck,
    ProcPairFail,
    SendPairFail,
    PairingCmpl,
    PairTerminate,
}

type Cell = Transition<LeAction, LeState>;

use LeAction as A;
use LeState as S;

const __: u8 = IGNORE;
const X: u8 = ALL_TABLE;

static IDLE_MASTER: [Cell; 2] = [
    /* L2capConn */ Transition::new(&[A::IoCapReq], S::WaitAppRsp),
    /* SecurityReq */ Transition::new(&[A::ProcSecReq, A::SendAppCback], S::WaitAppRsp),
];

static IDLE_SLAVE: [Cell; 2] = [
    /* L2capConn */ Transition::new(&[A::IoCapReq], S::WaitAppRsp),
    /* PairingReq */ Transition::new(&[A::ProcPairCmd, A::SendAppCback], S::WaitAppRsp),
];

static WAIT_APP_RSP_MASTER: [Cell; 3] = [
    /* ApiSecGrant */ Transition::new(&[A::ProcSecGrant], S::WaitAppRsp),
    /* IoRsp */ Transition::new(&[A::SendPairReq], S::PairReqRsp),
    /* KeyReady */ Transition::new(&[A::GenerateConfirm], S::WaitConfirm),
];

static WAIT_APP_RSP_SLAVE: [Cell; 4] = [
    /* ApiSecGrant */ Transition::new(&[A::ProcSecGrant], S::WaitAppRsp),
    /* IoRsp */ Transition::new(&[A::ProcIoRsp], S::PairReqRsp),
    /* Confirm */ Transition::new(&[A::ProcConfirm], S::WaitAppRsp),
    /* KeyReady */ Transition::new(&[A::GenerateConfirm], S::WaitConfirm),
];

static SEC_REQ_PENDING_MASTER: [Cell; 0] = [];

static SEC_REQ_PENDING_SLAVE: [Cell; 1] = [
    /* PairingReq */ Transition::new(&[A::ProcPairCmd, A::ProcIoRsp], S::PairReqRsp),
];

static PAIR_REQ_RSP_MASTER: [Cell; 4] = [
    /* PairingRsp */ Transition::new(&[A::ProcPairCmd], S::PairReqRsp),
    /* TkReq */ Transition::new(&[A::SendAppCback], S::WaitAppRsp),
    /* KeyReady */ Transition::new(&[A::GenerateConfirm], S::WaitConfirm),
    /* PublKeyExchReq */ Transition::new(&[A::ScStart, A::SendPublicKey], S::PublicKeyExch),
];

static PAIR_REQ_RSP_SLAVE: [Cell; 4] = [
    /* Confirm */ Transition::new(&[A::ProcConfirm], S::PairReqRsp),
    /* TkReq */ Transition::new(&[A::SendAppCback], S::WaitAppRsp),
    /* KeyReady */ Transition::new(&[A::GenerateConfirm], S::WaitConfirm),
    /* PublKeyExchReq */ Transition::new(&[A::ScStart], S::PublicKeyExch),
];

static WAIT_CONFIRM_MASTER: [Cell; 1] = [
    /* KeyReady */ Transition::new(&[A::SendConfirm], S::Confirm),
];

static WAIT_CONFIRM_SLAVE: [Cell; 2] = [
    /* KeyReady */ Transition::new(&[A::ProcSlKey], S::WaitConfirm),
    /* Confirm */ Transition::new(&[A::ProcConfirm, A::SendConfirm], S::Rand),
];

static CONFIRM_MASTER: [Cell; 1] = [
    /* Confirm */ Transition::new(&[A::ProcConfirm, A::SendRand], S::Rand),
];

static CONFIRM_SLAVE: [Cell; 0] = [];

static RAND_MASTER: [Cell; 2] = [
    /* Rand */ Transition::new(&[A::ProcRand, A::ProcCompare], S::Rand),
    /* KeyReady */ Transition::new(&[A::StartEnc], S::EncPending),
];

static RAND_SLAVE: [Cell; 2] = [
    /* Rand */ Transition::new(&[A::ProcRand, A::ProcCompare], S::Rand),
    /* KeyReady */ Transition::new(&[A::SendRand], S::EncPending),
];

static PUBLIC_KEY_EXCH_MASTER: [Cell; 1] = [
    /* PublicKey */ Transition::new(&[A::ProcPublicKey], S::WaitCommitment),
];

static PUBLIC_KEY_EXCH_SLAVE: [Cell; 1] = [
    /* PublicKey */ Transition::new(&[A::ProcPublicKey, A::SendPublicKey, A::SendCommitment], S::WaitNonce),
];

static WAIT_COMMITMENT_MASTER: [Cell; 1] = [
    /* Confirm */ Transition::new(&[A::ProcConfirm, A::SendRand], S::WaitNonce),
];

static WAIT_COMMITMENT_SLAVE: [Cell; 0] = [];

static WAIT_NONCE_MASTER: [Cell; 1] = [
    /* Rand */ Transition::new(&[A::ProcRand, A::ProcNonce], S::WaitDhkCheck),
];

static WAIT_NONCE_SLAVE: [Cell; 1] = [
    /* Rand */ Transition::new(&[A::ProcRand, A::SendRand, A::ProcNonce], S::WaitDhkCheck),
];

static WAIT_DHK_CHECK_MASTER: [Cell; 1] = [
    /* DhkeyCheck */ Transition::new(&[A::ProcDhkeyCheck], S::EncPending),
];

static WAIT_DHK_CHECK_SLAVE: [Cell; 1] = [
    /* DhkeyCheck */ Transition::new(&[A::ProcDhkeyCheck], S::EncPending),
];

static ENC_PENDING_MASTER: [Cell; 4] = [
    /* KeyReady */ Transition::new(&[A::StartEnc], S::EncPending),
    /* Encrypted */ Transition::new(&[A::CheckAuthReq], S::EncPending),
    /* BondReq */ Transition::new(&[A::KeyDistribution], S::BondPending),
    /* KeyInfo */ Transition::new(&[A::ProcKeyInfo], S::EncPending),
];

static ENC_PENDING_SLAVE: [Cell; 3] = [
    /* Encrypted */ Transition::new(&[A::CheckAuthReq], S::EncPending),
    /* BondReq */ Transition::new(&[A::KeyDistribution], S::BondPending),
    /* KeyInfo */ Transition::new(&[A::ProcKeyInfo], S::EncPending),
];

static BOND_PENDING_MASTER: [Cell; 1] = [
    /* KeyInfo */ Transition::new(&[A::ProcKeyInfo], S::BondPending),
];

static BOND_PENDING_SLAVE: [Cell; 1] = [
    /* KeyInfo */ Transition::new(&[A::ProcKeyInfo], S::BondPending),
];

static STATES: &[&[&[Cell]]] = &[
    /* Idle */ &[&IDLE_MASTER, &IDLE_SLAVE],
    /* WaitAppRsp */ &[&WAIT_APP_RSP_MASTER, &WAIT_APP_RSP_SLAVE],
    /* SecReqPending */ &[&SEC_REQ_PENDING_MASTER, &SEC_REQ_PENDING_SLAVE],
    /* PairReqRsp */ &[&PAIR_REQ_RSP_MASTER, &PAIR_REQ_RSP_SLAVE],
    /* WaitConfirm */ &[&WAIT_CONFIRM_MASTER, &WAIT_CONFIRM_SLAVE],
    /* Confirm */ &[&CONFIRM_MASTER, &CONFIRM_SLAVE],
    /* Rand */ &[&RAND_MASTER, &RAND_SLAVE],
    /* PublicKeyExch */ &[&PUBLIC_KEY_EXCH_MASTER, &PUBLIC_KEY_EXCH_SLAVE],
    /* WaitCommitment */ &[&WAIT_COMMITMENT_MASTER, &WAIT_COMMITMENT_SLAVE],
    /* WaitNonce */ &[&WAIT_NONCE_MASTER, &WAIT_NONCE_SLAVE],
    /* WaitDhkCheck */ &[&WAIT_DHK_CHECK_MASTER, &WAIT_DHK_CHECK_SLAVE],
    /* EncPending */ &[&ENC_PENDING_MASTER, &ENC_PENDING_SLAVE],
    /* BondPending */ &[&BOND_PENDING_MASTER, &BOND_PENDING_SLAVE],
];

static ENTRY: &[&[&[u8]]] = &[
    // master
    &[
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // PairingReq
        &[  __,  __,  __,   1,  __,  __,  __,  __,  __,  __,  __,  __,  __], // PairingRsp
        &[  __,  __,  __,  __,  __,   1,  __,  __,   1,  __,  __,  __,  __], // Confirm
        &[  __,  __,  __,  __,  __,  __,   1,  __,  __,   1,  __,  __,  __], // Rand
        &[  __, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1], // PairingFailed
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   4,   1], // KeyInfo
        &[   2,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // SecurityReq
        &[  __,  __,  __,  __,  __,  __,  __,   1,  __,  __,  __,  __,  __], // PublicKey
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   1,  __,  __], // DhkeyCheck
        &[  __,   3,  __,   3,   1,  __,   2,  __,  __,  __,  __,   1,  __], // KeyReady
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   2,  __], // Encrypted
        &[   1,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // L2capConn
        &[  __, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3], // L2capDisconn
        &[  __,   2,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // IoRsp
        &[  __,   1,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // ApiSecGrant
        &[  __,  __,  __,   2,  __,  __,  __,  __,  __,  __,  __,  __,  __], // TkReq
        &[  __, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2], // AuthCmpl
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   3,  __], // BondReq
        &[  __,  __,  __,   4,  __,  __,  __,  __,  __,  __,  __,  __,  __], // PublKeyExchReq
    ],
    // slave
    &[
        &[   2,  __,   1,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // PairingReq
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // PairingRsp
        &[  __,   3,  __,   1,   2,  __,  __,  __,  __,  __,  __,  __,  __], // Confirm
        &[  __,  __,  __,  __,  __,  __,   1,  __,  __,   1,  __,  __,  __], // Rand
        &[  __, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1, X|1], // PairingFailed
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   3,   1], // KeyInfo
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // SecurityReq
        &[  __,  __,  __,  __,  __,  __,  __,   1,  __,  __,  __,  __,  __], // PublicKey
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   1,  __,  __], // DhkeyCheck
        &[  __,   4,  __,   3,   1,  __,   2,  __,  __,  __,  __,  __,  __], // KeyReady
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   1,  __], // Encrypted
        &[   1,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // L2capConn
        &[  __, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3, X|3], // L2capDisconn
        &[  __,   2,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // IoRsp
        &[  __,   1,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __], // ApiSecGrant
        &[  __,  __,  __,   2,  __,  __,  __,  __,  __,  __,  __,  __,  __], // TkReq
        &[  __, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2, X|2], // AuthCmpl
        &[  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,  __,   2,  __], // BondReq
        &[  __,  __,  __,   4,  __,  __,  __,  __,  __,  __,  __,  __,  __], // PublKeyExchReq
    ],
];

static ALL: [Cell; 3] = [
    /* PairingFailed */ Transition::new(&[A::ProcPairFail, A::PairingCmpl], S::Idle),
    /* AuthCmpl */ Transition::new(&[A::SendPairFail, A::PairingCmpl], S::Idle),
    /* L2capDisconn */ Transition::new(&[A::PairTerminate], S::Idle),
];

/// The LE pairing state machine.
pub static LE_SM: StateMachine<MappedTable<LeState, LeEvt, LeAction>> =
    StateMachine::new("smp-le", MappedTable::new(ENTRY, STATES, &ALL));

/// One LE pairing procedure with a peer.
pub struct LeSession {
    pairing: Pairing,
    state: LeState,
    tk: Key128,
    own_rand: Key128,
    peer_rand: Key128,
    own_confirm: Key128,
    peer_confirm: Option<Key128>,
    own_pk: Option<PublicKey>,
    peer_pk: Option<PublicKey>,
    dhkey: Option<DhKey>,
    /// STK or LTK the link is encrypted with.
    key: Option<Key128>,
}

impl Session for LeSession {
    fn open(env: &Env, remote: BdAddr, role: Role, session: u32) -> Self {
        Self {
            pairing: Pairing::new(env, remote, Transport::Le, role, session),
            state: LeState::Idle,
            tk: [0; 16],
            own_rand: [0; 16],
            peer_rand: [0; 16],
            own_confirm: [0; 16],
            peer_confirm: None,
            own_pk: None,
            peer_pk: None,
            dhkey: None,
            key: None,
        }
    }

    fn is_idle(&self) -> bool {
        self.state == LeState::Idle
    }

    fn is_finished(&self) -> bool {
        self.pairing.is_finished()
    }

    fn session(&self) -> u32 {
        self.pairing.session
    }
}

impl LeSession {
    pub fn remote(&self) -> BdAddr {
        self.pairing.remote
    }

    pub fn role(&self) -> Role {
        self.pairing.role
    }

    pub fn model(&self) -> Option<Model> {
        self.pairing.model
    }

    /// STK or LTK for the controller's key request.
    pub fn session_key(&self) -> Option<Key128> {
        self.key
    }

    pub fn rsp_timer_armed(&self) -> bool {
        self.pairing.rsp_timer_armed()
    }
}

impl ControlBlock for LeSession {
    type State = LeState;
    type Event = LeEvt;
    type Action = LeAction;
    type Data = Body;
    type Context = Env;

    fn state(&self) -> LeState {
        self.state
    }

    fn set_state(&mut self, next: LeState) {
        self.state = next;
    }

    fn role(&self) -> usize {
        self.pairing.role.index()
    }

    fn perform(&mut self, env: &mut Env, action: LeAction, data: &mut Option<Body>) {
        if self.pairing.is_finished() {
            log::debug!("{}: {:?} skipped, pairing over", self.pairing.remote, action);
            return;
        }
        match action {
            LeAction::ProcSecReq => {
                if let Some(Body::Pdu(Pdu::SecurityReq(auth_req))) = data {
                    log::debug!("{}: security request {:?}", self.pairing.remote, auth_req);
                }
            }
            LeAction::SendAppCback => self.send_app_cback(env, data),
            LeAction::ProcSecGrant => self.proc_sec_grant(env, data),
            LeAction::IoCapReq => self.reenter(env, LeEvt::IoRsp, Body::IoRsp),
            LeAction::SendPairReq => self.send_pair_req(env),
            LeAction::ProcIoRsp => self.proc_io_rsp(env),
            LeAction::ProcPairCmd => self.proc_pair_cmd(env, data),
            LeAction::GenerateConfirm => self.generate_confirm(env, data),
            LeAction::SendConfirm => {
                self.send(env, Pdu::Confirm(self.own_confirm));
            }
            LeAction::ProcSlKey => {
                if self.peer_confirm.is_some() {
                    // The master's confirm arrived while ours was computed.
                    let _ = LE_SM.execute(self, env, LeEvt::Confirm, None);
                }
            }
            LeAction::ProcConfirm => {
                if let Some(Body::Pdu(Pdu::Confirm(confirm))) = data {
                    self.peer_confirm = Some(*confirm);
                }
            }
            LeAction::SendRand => {
                self.send(env, Pdu::Random(self.own_rand));
            }
            LeAction::ProcRand => {
                if let Some(Body::Pdu(Pdu::Random(rand))) = data {
                    self.peer_rand = *rand;
                }
            }
            LeAction::ProcCompare => self.proc_compare(env),
            LeAction::StartEnc => self.start_enc(env),
            LeAction::CheckAuthReq => self.check_auth_req(env, data),
            LeAction::KeyDistribution => self.key_distribution(env),
            LeAction::ProcKeyInfo => {
                if let Some(Body::Pdu(Pdu::KeyInfo(key))) = data {
                    self.pairing.store_key(env, *key);
                }
                if self.state == LeState::BondPending {
                    self.key_distribution(env);
                }
            }
            LeAction::ScStart => {
                self.own_pk = Some(env.crypto.public_key());
                self.own_rand = env.crypto.random();
            }
            LeAction::SendPublicKey => {
                if let Some(own_pk) = self.own_pk {
                    self.send(env, Pdu::PublicKey(own_pk));
                }
            }
            LeAction::ProcPublicKey => self.proc_public_key(env, data),
            LeAction::SendCommitment => self.send_commitment(env),
            LeAction::ProcNonce => self.proc_nonce(env),
            LeAction::ProcDhkeyCheck => self.proc_dhkey_check(env, data),
            LeAction::ProcPairFail => {
                self.pairing.reason = match data {
                    Some(Body::Pdu(Pdu::PairingFailed(reason))) => *reason,
                    _ => Reason::Unspecified,
                };
            }
            LeAction::SendPairFail => {
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
            LeAction::PairingCmpl => self.pairing.finish(env),
            LeAction::PairTerminate => {
                self.pairing.reason = Reason::ConnTimeout;
                self.pairing.finish(env);
            }
        }
    }
}

impl LeSession {
    fn reenter(&mut self, env: &mut Env, event: LeEvt, body: Body) {
        let _ = LE_SM.execute(self, env, event, Some(body));
    }

    fn fail(&mut self, env: &mut Env, reason: Reason) {
        self.reenter(env, LeEvt::AuthCmpl, Body::AuthCmpl(reason));
    }

    /// Sends `pdu`, failing the pairing when the link refuses it.
    fn send(&mut self, env: &mut Env, pdu: Pdu) -> bool {
        if self.pairing.send(env, pdu) {
            return true;
        }
        self.fail(env, Reason::Unspecified);
        false
    }

    fn send_app_cback(&mut self, env: &mut Env, data: &mut Option<Body>) {
        let remote = self.pairing.remote;
        let event = match data {
            Some(Body::TkReq) => SmpEvent::PasskeyReq { remote },
            _ => SmpEvent::SecRequest { remote },
        };
        self.pairing.notify(env, event);
    }

    fn proc_sec_grant(&mut self, env: &mut Env, data: &mut Option<Body>) {
        match data {
            Some(Body::SecGrant(true)) => self.reenter(env, LeEvt::IoRsp, Body::IoRsp),
            _ => self.fail(env, Reason::PairingNotSupported),
        }
    }

    fn send_pair_req(&mut self, env: &mut Env) {
        let preq = env.config.pair_params();
        self.pairing.preq = Some(preq);
        self.send(env, Pdu::PairingReq(preq));
    }

    fn proc_io_rsp(&mut self, env: &mut Env) {
        let Some(preq) = self.pairing.preq else {
            // Locally started as slave: ask the master to pair.
            let auth_req = env.config.auth_req;
            if self.send(env, Pdu::SecurityReq(auth_req)) {
                self.state = LeState::SecReqPending;
            }
            return;
        };

        let pres = self.pairing.response_to(env, &preq);
        self.pairing.pres = Some(pres);
        self.select_model();
        if self.send(env, Pdu::PairingRsp(pres)) {
            self.start_model(env);
        }
    }

    fn proc_pair_cmd(&mut self, env: &mut Env, data: &mut Option<Body>) {
        let params = match data {
            Some(Body::Pdu(Pdu::PairingReq(params) | Pdu::PairingRsp(params))) => *params,
            _ => return,
        };
        if !params.is_valid() {
            log::warn!(
                "{}: key size {} out of range",
                self.pairing.remote,
                params.max_key_size
            );
            self.fail(env, Reason::EncKeySize);
            return;
        }

        if self.pairing.is_master() {
            self.pairing.pres = Some(params);
            self.select_model();
            self.start_model(env);
        } else {
            self.pairing.preq = Some(params);
        }
    }

    fn select_model(&mut self) {
        let (Some(preq), Some(pres)) = (self.pairing.preq, self.pairing.pres) else {
            return;
        };
        let chosen = model::choose(&preq, &pres, self.pairing.is_master());
        log::debug!("{}: association model {:?}", self.pairing.remote, chosen);
        self.pairing.model = Some(chosen);
        self.pairing.negotiate_keys();
    }

    fn start_model(&mut self, env: &mut Env) {
        match self.pairing.model {
            Some(Model::ScJustWorks) => self.reenter(env, LeEvt::PublKeyExchReq, Body::PublKeyExchReq),
            Some(Model::Passkey(Entry::Input)) => self.reenter(env, LeEvt::TkReq, Body::TkReq),
            Some(Model::Passkey(Entry::Display)) => {
                let passkey = model::passkey_from(&env.crypto.random());
                self.pairing.notify(
                    env,
                    SmpEvent::PasskeyNotify {
                        remote: self.pairing.remote,
                        passkey,
                    },
                );
                let tk = model::passkey_tk(passkey);
                self.reenter(env, LeEvt::KeyReady, Body::KeyReady(LocalKey::Tk(tk)));
            }
            Some(Model::JustWorks) | None => {
                self.reenter(env, LeEvt::KeyReady, Body::KeyReady(LocalKey::Tk([0; 16])))
            }
        }
    }

    fn generate_confirm(&mut self, env: &mut Env, data: &mut Option<Body>) {
        if let Some(Body::KeyReady(LocalKey::Tk(tk))) = data {
            self.tk = *tk;
        }
        let (Some(preq), Some(pres)) = (self.pairing.preq, self.pairing.pres) else {
            log::error!("{}: confirm without pairing parameters", self.pairing.remote);
            self.fail(env, Reason::Unspecified);
            return;
        };

        let (ia, ra) = self.pairing.addrs(env);
        self.own_rand = env.crypto.random();
        self.own_confirm = env.crypto.c1(&self.tk, &self.own_rand, &preq, &pres, ia, ra);
        self.reenter(env, LeEvt::KeyReady, Body::KeyReady(LocalKey::Confirm));
    }

    fn proc_compare(&mut self, env: &mut Env) {
        let (Some(preq), Some(pres)) = (self.pairing.preq, self.pairing.pres) else {
            self.fail(env, Reason::Unspecified);
            return;
        };
        let (ia, ra) = self.pairing.addrs(env);
        let expected = env.crypto.c1(&self.tk, &self.peer_rand, &preq, &pres, ia, ra);
        if self.peer_confirm != Some(expected) {
            log::warn!("{}: peer confirm value mismatch", self.pairing.remote);
            self.fail(env, Reason::ConfirmValueFailed);
            return;
        }

        let (srand, mrand) = if self.pairing.is_master() {
            (self.peer_rand, self.own_rand)
        } else {
            (self.own_rand, self.peer_rand)
        };
        self.key = Some(env.crypto.s1(&self.tk, &srand, &mrand));
        self.reenter(env, LeEvt::KeyReady, Body::KeyReady(LocalKey::Stk));
    }

    fn start_enc(&mut self, env: &mut Env) {
        let Some(key) = self.key else {
            self.fail(env, Reason::Unspecified);
            return;
        };
        let status = env.link.start_encryption(self.pairing.remote, &key);
        if !status.is_ok() {
            log::warn!("{}: encryption not started: {}", self.pairing.remote, status);
            self.fail(env, Reason::EncFailed);
        }
    }

    fn check_auth_req(&mut self, env: &mut Env, data: &mut Option<Body>) {
        if !matches!(data, Some(Body::Encrypted(true))) {
            self.fail(env, Reason::EncFailed);
            return;
        }
        if self.pairing.local_keys.is_empty() && self.pairing.peer_keys.is_empty() {
            self.reenter(env, LeEvt::AuthCmpl, Body::AuthCmpl(Reason::Success));
        } else {
            self.reenter(env, LeEvt::BondReq, Body::BondReq);
        }
    }

    fn key_distribution(&mut self, env: &mut Env) {
        match self.pairing.distribute(env) {
            Distribution::Waiting => {}
            Distribution::Done => {
                self.reenter(env, LeEvt::AuthCmpl, Body::AuthCmpl(Reason::Success))
            }
            Distribution::Failed => self.fail(env, Reason::Unspecified),
        }
    }

    fn proc_public_key(&mut self, env: &mut Env, data: &mut Option<Body>) {
        let Some(Body::Pdu(Pdu::PublicKey(peer_pk))) = data else {
            return;
        };
        let Some(dhkey) = env.crypto.dhkey(peer_pk) else {
            log::warn!("{}: invalid public key", self.pairing.remote);
            self.fail(env, Reason::InvalidParameters);
            return;
        };
        self.peer_pk = Some(*peer_pk);
        self.dhkey = Some(dhkey);
    }

    fn send_commitment(&mut self, env: &mut Env) {
        let (Some(own_pk), Some(peer_pk)) = (self.own_pk, self.peer_pk) else {
            self.fail(env, Reason::Unspecified);
            return;
        };
        let commitment = env.crypto.f4(&own_pk, &peer_pk, &self.own_rand);
        self.send(env, Pdu::Confirm(commitment));
    }

    /// Derives the LTK once both nonces are known. The master also checks
    /// the slave's commitment and sends the first DHKey check.
    fn proc_nonce(&mut self, env: &mut Env) {
        let (Some(own_pk), Some(peer_pk), Some(dhkey)) = (self.own_pk, self.peer_pk, self.dhkey)
        else {
            self.fail(env, Reason::Unspecified);
            return;
        };
        let (a, b) = self.pairing.addrs(env);

        if self.pairing.is_master() {
            let expected = env.crypto.f4(&peer_pk, &own_pk, &self.peer_rand);
            if self.peer_confirm != Some(expected) {
                log::warn!("{}: commitment mismatch", self.pairing.remote);
                self.fail(env, Reason::ConfirmValueFailed);
                return;
            }
            let (na, nb) = (self.own_rand, self.peer_rand);
            let ltk = env.crypto.f5(&dhkey, &na, &nb, a, b);
            self.key = Some(ltk);
            let ea = env.crypto.f6(&ltk, &na, &nb, a, b);
            self.send(env, Pdu::DhKeyCheck(ea));
        } else {
            let (na, nb) = (self.peer_rand, self.own_rand);
            self.key = Some(env.crypto.f5(&dhkey, &na, &nb, a, b));
        }
    }

    fn proc_dhkey_check(&mut self, env: &mut Env, data: &mut Option<Body>) {
        let Some(Body::Pdu(Pdu::DhKeyCheck(check))) = data else {
            return;
        };
        let check = *check;
        let Some(ltk) = self.key else {
            self.fail(env, Reason::Unspecified);
            return;
        };
        let (a, b) = self.pairing.addrs(env);

        if self.pairing.is_master() {
            let (na, nb) = (self.own_rand, self.peer_rand);
            if env.crypto.f6(&ltk, &nb, &na, b, a) != check {
                self.fail(env, Reason::DhKeyCheckFailed);
                return;
            }
            self.reenter(env, LeEvt::KeyReady, Body::KeyReady(LocalKey::Ltk));
        } else {
            let (na, nb) = (self.peer_rand, self.own_rand);
            if env.crypto.f6(&ltk, &na, &nb, a, b) != check {
                self.fail(env, Reason::DhKeyCheckFailed);
                return;
            }
            let eb = env.crypto.f6(&ltk, &nb, &na, b, a);
            self.send(env, Pdu::DhKeyCheck(eb));
        }
    }
}
