//! Boundaries of the Security Manager profile.
//!
//! * [`SmpHandler`] receives requests for user interaction and the outcome
//!   of every pairing.
//! * [`SmpLink`] carries commands to the peer and starts link encryption.
//! * [`SmpCrypto`] supplies the random numbers and key derivation functions.
//! * [`SmpApi`] turns application calls and link indications into transport
//!   messages.

use bsm::{Result, Status};
use btc::{BdAddr, Envelope, ProfileId, Sender};

use crate::model::passkey_tk;
use crate::msg::{Body, LocalKey, Role, SmpMsg, Transport};
use crate::pdu::{DhKey, DistKey, Key128, KeyMask, PairParams, Pdu, PublicKey, Reason};

/// Security level reached by a finished pairing.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecLevel {
    None,
    Unauthenticated,
    Authenticated,
}

/// Application-facing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmpEvent {
    /// The peer wants to pair; answer with [`SmpApi::sec_grant`].
    SecRequest { remote: BdAddr },
    /// Enter the passkey shown on the peer; answer with
    /// [`SmpApi::passkey_reply`].
    PasskeyReq { remote: BdAddr },
    /// Show `passkey` to the user.
    PasskeyNotify { remote: BdAddr, passkey: u32 },
    /// A key the peer distributed.
    Key { remote: BdAddr, key: DistKey },
    Complete {
        remote: BdAddr,
        reason: Reason,
        sec_level: SecLevel,
        /// Set when a successful pairing used LE Secure Connections.
        secure_connections: bool,
        /// Keys received from the peer.
        keys: KeyMask,
    },
}

pub trait SmpHandler: Send {
    fn on_event(&mut self, event: SmpEvent);
}

impl<F> SmpHandler for F
where
    F: FnMut(SmpEvent) + Send,
{
    fn on_event(&mut self, event: SmpEvent) {
        self(event)
    }
}

/// L2CAP fixed channel and controller access.
pub trait SmpLink: Send {
    fn send(&mut self, remote: BdAddr, transport: Transport, pdu: &Pdu) -> Status;

    /// Starts encryption with `key`; the result arrives as
    /// [`Body::Encrypted`].
    fn start_encryption(&mut self, remote: BdAddr, key: &Key128) -> Status;
}

/// Cryptographic toolbox. Addresses are passed as the initiator's first.
pub trait SmpCrypto: Send {
    fn random(&mut self) -> Key128;

    /// Legacy confirm value function c1.
    fn c1(
        &mut self,
        tk: &Key128,
        rand: &Key128,
        preq: &PairParams,
        pres: &PairParams,
        ia: BdAddr,
        ra: BdAddr,
    ) -> Key128;

    /// Legacy key generation function s1.
    fn s1(&mut self, tk: &Key128, srand: &Key128, mrand: &Key128) -> Key128;

    /// Own P-256 public key.
    fn public_key(&mut self) -> PublicKey;

    /// `None` when `peer` is not a valid point.
    fn dhkey(&mut self, peer: &PublicKey) -> Option<DhKey>;

    /// Commitment function f4.
    fn f4(&mut self, u: &PublicKey, v: &PublicKey, nonce: &Key128) -> Key128;

    /// LTK part of key generation function f5.
    fn f5(&mut self, dhkey: &DhKey, na: &Key128, nb: &Key128, a: BdAddr, b: BdAddr) -> Key128;

    /// Check value function f6.
    fn f6(&mut self, ltk: &Key128, n1: &Key128, n2: &Key128, a: BdAddr, b: BdAddr) -> Key128;
}

/// Posts Security Manager messages through the transport.
#[derive(Clone)]
pub struct SmpApi {
    sender: Sender,
}

impl SmpApi {
    pub fn new(sender: Sender) -> Self {
        Self { sender }
    }

    pub fn request(&self, msg: SmpMsg) -> Result<()> {
        let envelope = Envelope::call(ProfileId::DM_SEC, msg.act());
        self.sender.post(envelope, msg)
    }

    pub fn indicate(&self, msg: SmpMsg) -> Result<()> {
        let envelope = Envelope::callback(ProfileId::DM_SEC, msg.act());
        self.sender.post(envelope, msg)
    }

    /// Starts pairing with `remote`. As slave this sends a Security Request.
    pub fn pair(&self, remote: BdAddr, role: Role, transport: Transport) -> Result<()> {
        self.request(SmpMsg {
            remote,
            transport,
            body: Body::L2capConn { role },
        })
    }

    pub fn sec_grant(&self, remote: BdAddr, transport: Transport, granted: bool) -> Result<()> {
        self.request(SmpMsg {
            remote,
            transport,
            body: Body::SecGrant(granted),
        })
    }

    /// `None` cancels the passkey entry and fails the pairing.
    pub fn passkey_reply(&self, remote: BdAddr, passkey: Option<u32>) -> Result<()> {
        let body = match passkey {
            Some(passkey) => Body::KeyReady(LocalKey::Tk(passkey_tk(passkey))),
            None => Body::AuthCmpl(Reason::PasskeyEntryFailed),
        };
        self.request(SmpMsg::le(remote, body))
    }

    pub fn cancel(&self, remote: BdAddr, transport: Transport) -> Result<()> {
        self.request(SmpMsg {
            remote,
            transport,
            body: Body::AuthCmpl(Reason::Unspecified),
        })
    }

    pub fn pdu_received(&self, remote: BdAddr, transport: Transport, pdu: Pdu) -> Result<()> {
        self.indicate(SmpMsg {
            remote,
            transport,
            body: Body::Pdu(pdu),
        })
    }

    pub fn encrypted(&self, remote: BdAddr, success: bool) -> Result<()> {
        self.indicate(SmpMsg::le(remote, Body::Encrypted(success)))
    }

    pub fn disconnected(&self, remote: BdAddr, transport: Transport) -> Result<()> {
        self.indicate(SmpMsg {
            remote,
            transport,
            body: Body::L2capDisconn,
        })
    }
}
