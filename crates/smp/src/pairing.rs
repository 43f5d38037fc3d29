//! State shared by the LE and BR/EDR pairing sessions.

use std::sync::Arc;

use btc::{BdAddr, Envelope, ProfileId, TimeEvent};

use crate::api::{SecLevel, SmpEvent};
use crate::model::Model;
use crate::msg::{Body, Role, SmpMsg, Transport};
use crate::pdu::{DistKey, KeyMask, PairParams, Pdu, Reason};
use crate::profile::Env;

/// Progress of the key distribution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Distribution {
    /// Peer keys are still expected.
    Waiting,
    Done,
    /// A key could not be sent.
    Failed,
}

pub(crate) struct Pairing {
    /// Generation number, unique per opened session.
    pub session: u32,
    pub remote: BdAddr,
    pub transport: Transport,
    pub role: Role,
    pub preq: Option<PairParams>,
    pub pres: Option<PairParams>,
    pub model: Option<Model>,
    /// Keys still to send.
    pub local_keys: KeyMask,
    /// Keys still expected from the peer.
    pub peer_keys: KeyMask,
    /// Keys the peer delivered.
    pub received: KeyMask,
    pub reason: Reason,
    finished: bool,
    rsp_timer: Arc<TimeEvent>,
}

impl Pairing {
    pub fn new(env: &Env, remote: BdAddr, transport: Transport, role: Role, session: u32) -> Self {
        let expiry = SmpMsg {
            remote,
            transport,
            body: Body::RspTimeout { session },
        };
        let envelope = Envelope::callback(ProfileId::DM_SEC, expiry.act());
        let rsp_timer = TimeEvent::with_args(envelope, expiry);
        env.wheel.register(&rsp_timer);

        Self {
            session,
            remote,
            transport,
            role,
            preq: None,
            pres: None,
            model: None,
            local_keys: KeyMask::NONE,
            peer_keys: KeyMask::NONE,
            received: KeyMask::NONE,
            reason: Reason::Success,
            finished: false,
            rsp_timer,
        }
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn rsp_timer_armed(&self) -> bool {
        self.rsp_timer.is_armed()
    }

    /// Initiator and responder addresses.
    pub fn addrs(&self, env: &Env) -> (BdAddr, BdAddr) {
        if self.is_master() {
            (env.config.local_addr, self.remote)
        } else {
            (self.remote, env.config.local_addr)
        }
    }

    pub fn notify(&self, env: &mut Env, event: SmpEvent) {
        env.handler.on_event(event);
    }

    /// Sends `pdu` and restarts the response timer. Returns `false` when
    /// the link refused it.
    pub fn send(&mut self, env: &mut Env, pdu: Pdu) -> bool {
        let status = env.link.send(self.remote, self.transport, &pdu);
        if !status.is_ok() {
            log::warn!("{}: {:?} not sent: {}", self.remote, pdu, status);
            return false;
        }
        if !matches!(pdu, Pdu::PairingFailed(_)) {
            self.rsp_timer.arm(env.config.rsp_timeout_ticks, None);
        }
        true
    }

    /// Our Pairing Response to `preq`: local parameters with the key masks
    /// narrowed to what the initiator asked for.
    pub fn response_to(&self, env: &Env, preq: &PairParams) -> PairParams {
        let mut pres = env.config.pair_params();
        pres.init_keys = preq.init_keys & pres.init_keys;
        pres.resp_keys = preq.resp_keys & pres.resp_keys;
        if !preq.auth_req.bond() || !pres.auth_req.bond() {
            pres.init_keys = KeyMask::NONE;
            pres.resp_keys = KeyMask::NONE;
        }
        pres
    }

    /// Settles the keys each side distributes from the Pairing Response.
    pub fn negotiate_keys(&mut self) {
        let (Some(preq), Some(pres)) = (self.preq, self.pres) else {
            return;
        };
        let (mut init, mut resp) = if preq.auth_req.bond() && pres.auth_req.bond() {
            (pres.init_keys, pres.resp_keys)
        } else {
            (KeyMask::NONE, KeyMask::NONE)
        };

        // Link keys are never derived here; the LTK comes from the DHKey
        // under Secure Connections and BR/EDR only carries identity keys.
        let mut derived = KeyMask::LINK;
        if self.transport == Transport::BrEdr || self.model.is_some_and(Model::is_secure_connections) {
            derived.insert(KeyMask::ENC);
        }
        init.remove(derived);
        resp.remove(derived);

        if self.is_master() {
            self.local_keys = init;
            self.peer_keys = resp;
        } else {
            self.local_keys = resp;
            self.peer_keys = init;
        }
        log::debug!(
            "{}: distributing {:?}, expecting {:?}",
            self.remote,
            self.local_keys,
            self.peer_keys
        );
    }

    /// Sends our keys when it is our turn: the responder first, the
    /// initiator once every responder key arrived.
    pub fn distribute(&mut self, env: &mut Env) -> Distribution {
        let our_turn = !self.is_master() || self.peer_keys.is_empty();
        if our_turn && !self.local_keys.is_empty() {
            for key in self.local_key_material(env) {
                if !self.send(env, Pdu::KeyInfo(key)) {
                    return Distribution::Failed;
                }
            }
            self.local_keys = KeyMask::NONE;
        }

        if self.local_keys.is_empty() && self.peer_keys.is_empty() {
            Distribution::Done
        } else {
            Distribution::Waiting
        }
    }

    fn local_key_material(&self, env: &mut Env) -> Vec<DistKey> {
        let mut keys = Vec::new();
        if self.local_keys.contains(KeyMask::ENC) {
            let ltk = env.crypto.random();
            let extra = env.crypto.random();
            let mut rand = [0; 8];
            rand.copy_from_slice(&extra[2..10]);
            keys.push(DistKey::Enc {
                ltk,
                ediv: u16::from_le_bytes([extra[0], extra[1]]),
                rand: u64::from_le_bytes(rand),
            });
        }
        if self.local_keys.contains(KeyMask::ID) {
            keys.push(DistKey::Id {
                irk: env.config.irk,
                addr: env.config.local_addr,
            });
        }
        if self.local_keys.contains(KeyMask::CSRK) {
            keys.push(DistKey::Csrk(env.crypto.random()));
        }
        keys
    }

    /// Records a key from the peer. Returns `false` for a key that was not
    /// negotiated.
    pub fn store_key(&mut self, env: &mut Env, key: DistKey) -> bool {
        let mask = key.mask();
        if !self.peer_keys.contains(mask) {
            log::warn!("{}: unexpected {:?} key", self.remote, mask);
            return false;
        }
        self.peer_keys.remove(mask);
        self.received.insert(mask);
        self.notify(
            env,
            SmpEvent::Key {
                remote: self.remote,
                key,
            },
        );
        true
    }

    /// Reports the outcome once and stops the response timer.
    pub fn finish(&mut self, env: &mut Env) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.rsp_timer.disarm();

        let success = self.reason == Reason::Success;
        let sec_level = match self.model {
            _ if !success => SecLevel::None,
            Some(model) if model.is_authenticated() => SecLevel::Authenticated,
            _ => SecLevel::Unauthenticated,
        };
        if success {
            log::debug!("{}: pairing complete at {:?}", self.remote, sec_level);
        } else {
            log::warn!("{}: pairing failed: {}", self.remote, self.reason);
        }
        self.notify(
            env,
            SmpEvent::Complete {
                remote: self.remote,
                reason: self.reason,
                sec_level,
                secure_connections: success && self.model.is_some_and(Model::is_secure_connections),
                keys: self.received,
            },
        );
    }
}
