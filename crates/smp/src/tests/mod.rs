use std::sync::{Arc, Mutex};

use bsm::Status;
use btc::{BdAddr, Dispatcher, ProfileId, TimerWheel};

use crate::api::{SmpCrypto, SmpEvent, SmpLink};
use crate::config::SmpConfig;
use crate::le::LeState;
use crate::msg::{Body, SmpMsg, Transport};
use crate::pdu::{AuthReq, DhKey, IoCap, Key128, PairParams, Pdu, PublicKey};
use crate::profile::Smp;

mod le;

const MASTER: BdAddr = BdAddr::new([0x00, 0x1b, 0xdc, 0x07, 0x31, 0x01]);
const SLAVE: BdAddr = BdAddr::new([0x00, 0x1b, 0xdc, 0x07, 0x31, 0x02]);

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkCall {
    Send(BdAddr, Transport, Pdu),
    Encrypt(BdAddr, Key128),
}

#[derive(Default)]
struct LinkState {
    calls: Vec<LinkCall>,
    refuse_send: bool,
    refuse_encrypt: bool,
}

/// SMP channel that records every command and encryption request.
#[derive(Clone, Default)]
struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    fn calls(&self) -> Vec<LinkCall> {
        core::mem::take(&mut self.state.lock().unwrap().calls)
    }

    /// Commands sent, without the encryption requests.
    fn sent(&self) -> Vec<Pdu> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LinkCall::Send(_, _, pdu) => Some(pdu),
                LinkCall::Encrypt(..) => None,
            })
            .collect()
    }

    fn refuse_send(&self) {
        self.state.lock().unwrap().refuse_send = true;
    }

    fn refuse_encrypt(&self) {
        self.state.lock().unwrap().refuse_encrypt = true;
    }
}

impl SmpLink for MockLink {
    fn send(&mut self, remote: BdAddr, transport: Transport, pdu: &Pdu) -> Status {
        let mut state = self.state.lock().unwrap();
        state.calls.push(LinkCall::Send(remote, transport, pdu.clone()));
        if state.refuse_send {
            Status::Fail
        } else {
            Status::Success
        }
    }

    fn start_encryption(&mut self, remote: BdAddr, key: &Key128) -> Status {
        let mut state = self.state.lock().unwrap();
        state.calls.push(LinkCall::Encrypt(remote, *key));
        if state.refuse_encrypt {
            Status::Fail
        } else {
            Status::Success
        }
    }
}

/// Folds every input byte, position dependent, into 16 bytes.
fn mix(tag: u8, parts: &[&[u8]]) -> Key128 {
    let mut out = [tag; 16];
    let mut n = 0usize;
    for part in parts {
        for &byte in *part {
            let slot = n % 16;
            out[slot] = out[slot].rotate_left(3) ^ byte.wrapping_add(n as u8).wrapping_mul(31);
            n += 1;
        }
    }
    out
}

fn params_bytes(params: &PairParams) -> [u8; 6] {
    [
        params.io_cap as u8,
        params.oob as u8,
        params.auth_req.0,
        params.max_key_size,
        params.init_keys.0,
        params.resp_keys.0,
    ]
}

/// Deterministic stand-in for the crypto toolbox. Both sides agree on every
/// derived value as long as they feed the same inputs; the "DH" secret is
/// the sum of both seeds.
struct MockCrypto {
    seed: u8,
    counter: u8,
}

impl MockCrypto {
    fn new(seed: u8) -> Self {
        Self { seed, counter: 0 }
    }
}

impl SmpCrypto for MockCrypto {
    fn random(&mut self) -> Key128 {
        self.counter = self.counter.wrapping_add(1);
        mix(0x52, &[&[self.seed, self.counter]])
    }

    fn c1(
        &mut self,
        tk: &Key128,
        rand: &Key128,
        preq: &PairParams,
        pres: &PairParams,
        ia: BdAddr,
        ra: BdAddr,
    ) -> Key128 {
        mix(
            0xc1,
            &[tk, rand, &params_bytes(preq), &params_bytes(pres), &ia.0, &ra.0],
        )
    }

    fn s1(&mut self, tk: &Key128, srand: &Key128, mrand: &Key128) -> Key128 {
        mix(0x51, &[tk, srand, mrand])
    }

    fn public_key(&mut self) -> PublicKey {
        [self.seed; 64]
    }

    fn dhkey(&mut self, peer: &PublicKey) -> Option<DhKey> {
        if peer[0] == 0 {
            return None;
        }
        Some([self.seed.wrapping_add(peer[0]); 32])
    }

    fn f4(&mut self, u: &PublicKey, v: &PublicKey, nonce: &Key128) -> Key128 {
        mix(0xf4, &[u, v, nonce])
    }

    fn f5(&mut self, dhkey: &DhKey, na: &Key128, nb: &Key128, a: BdAddr, b: BdAddr) -> Key128 {
        mix(0xf5, &[dhkey, na, nb, &a.0, &b.0])
    }

    fn f6(&mut self, ltk: &Key128, n1: &Key128, n2: &Key128, a: BdAddr, b: BdAddr) -> Key128 {
        mix(0xf6, &[ltk, n1, n2, &a.0, &b.0])
    }
}

type Events = Arc<Mutex<Vec<SmpEvent>>>;

/// One Security Manager behind its own pump. Messages are usually handed
/// to `hdl_event` directly; timer expiries go through the pump.
struct Side {
    pump: Dispatcher,
    wheel: TimerWheel,
    link: MockLink,
    events: Events,
}

impl Side {
    fn new(addr: BdAddr, seed: u8, config: SmpConfig) -> Self {
        let builder = Dispatcher::builder();
        let wheel = TimerWheel::new(builder.sender());
        let link = MockLink::default();
        let events = Events::default();
        let sink = Arc::clone(&events);
        let smp = Smp::new(
            Box::new(link.clone()),
            Box::new(MockCrypto::new(seed)),
            Box::new(move |event| sink.lock().unwrap().push(event)),
            wheel.clone(),
            SmpConfig {
                local_addr: addr,
                ..config
            },
        );
        let pump = builder.register(ProfileId::DM_SEC, Box::new(smp)).build();
        Self {
            pump,
            wheel,
            link,
            events,
        }
    }

    fn smp(&mut self) -> &mut Smp {
        self.pump.profile_mut::<Smp>(ProfileId::DM_SEC).unwrap()
    }

    fn events(&self) -> Vec<SmpEvent> {
        core::mem::take(&mut *self.events.lock().unwrap())
    }

    fn deliver(&mut self, remote: BdAddr, body: Body) {
        self.smp().hdl_event(SmpMsg::le(remote, body));
    }

    fn deliver_br(&mut self, remote: BdAddr, body: Body) {
        self.smp().hdl_event(SmpMsg::br(remote, body));
    }

    fn le_state(&mut self, remote: BdAddr) -> Option<LeState> {
        use bsm::ControlBlock;
        self.smp().le_session(remote).map(|session| session.state())
    }

    /// Advances the response timers and dispatches whatever expired.
    fn tick(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.wheel.tick().unwrap();
        }
        self.pump.run_until_idle();
    }
}

/// A master and a slave whose links are wired to each other.
struct Pair {
    master: Side,
    slave: Side,
}

impl Pair {
    fn new(master: SmpConfig, slave: SmpConfig) -> Self {
        Self {
            master: Side::new(MASTER, 0x11, master),
            slave: Side::new(SLAVE, 0x22, slave),
        }
    }

    /// Both sides with the same configuration.
    fn with(config: SmpConfig) -> Self {
        Self::new(config.clone(), config)
    }

    /// Carries commands both ways until neither side sends anything. An
    /// encryption request succeeds when the slave holds the same key.
    fn run(&mut self) {
        loop {
            let from_master = self.master.link.calls();
            let from_slave = self.slave.link.calls();
            if from_master.is_empty() && from_slave.is_empty() {
                break;
            }
            for call in from_master {
                match call {
                    LinkCall::Send(_, transport, pdu) => {
                        self.slave.smp().hdl_event(SmpMsg {
                            remote: MASTER,
                            transport,
                            body: Body::Pdu(pdu),
                        });
                    }
                    LinkCall::Encrypt(_, key) => {
                        let ok = self.slave.smp().session_key(MASTER) == Some(key);
                        self.master.deliver(SLAVE, Body::Encrypted(ok));
                        self.slave.deliver(MASTER, Body::Encrypted(ok));
                    }
                }
            }
            for call in from_slave {
                if let LinkCall::Send(_, transport, pdu) = call {
                    self.master.smp().hdl_event(SmpMsg {
                        remote: SLAVE,
                        transport,
                        body: Body::Pdu(pdu),
                    });
                }
            }
        }
    }
}

fn just_works() -> SmpConfig {
    SmpConfig::default()
}

fn mitm(io_cap: IoCap) -> SmpConfig {
    SmpConfig::builder()
        .io_cap(io_cap)
        .auth_req(AuthReq(AuthReq::BOND | AuthReq::MITM))
        .build()
}

fn secure_connections() -> SmpConfig {
    SmpConfig::builder()
        .auth_req(AuthReq(AuthReq::BOND | AuthReq::SC))
        .build()
}

/// The `Complete` events among `events`.
fn completions(events: &[SmpEvent]) -> Vec<&SmpEvent> {
    events
        .iter()
        .filter(|event| matches!(event, SmpEvent::Complete { .. }))
        .collect()
}

impl Pair {
    /// Hands the master's pending commands to the slave.
    fn to_slave(&mut self) {
        for pdu in self.master.link.sent() {
            self.slave.deliver(MASTER, Body::Pdu(pdu));
        }
    }

    /// Hands the slave's pending commands to the master.
    fn to_master(&mut self) {
        for pdu in self.slave.link.sent() {
            self.master.deliver(SLAVE, Body::Pdu(pdu));
        }
    }
}
