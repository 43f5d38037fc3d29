//! Messages delivered to the Security Manager profile.

use bsm::EventId;
use btc::{BdAddr, ProfileId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::br::BrEvt;
use crate::le::LeEvt;
use crate::pdu::{Key128, Pdu, Reason};

/// Envelope action code of messages that no table knows.
pub const ACT_UNKNOWN: u16 = 0x09ff;
/// BR/EDR event codes start after the LE ones.
const BR_BASE: u16 = 0x40;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transport {
    Le,
    BrEdr,
}

/// Link role. The master always initiates pairing.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    /// Row of the entry map.
    pub const fn index(self) -> usize {
        match self {
            Role::Master => 0,
            Role::Slave => 1,
        }
    }
}

/// Key material produced locally, fed back as `KeyReady`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKey {
    /// Temporary key, from the model or from the user's passkey.
    Tk(Key128),
    /// Own confirm value computed.
    Confirm,
    /// Short term key computed.
    Stk,
    /// Secure Connections LTK checked.
    Ltk,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Command received from the peer.
    Pdu(Pdu),
    /// Security channel up; pairing starts in `role`.
    L2capConn { role: Role },
    L2capDisconn,
    /// Local IO capabilities are available.
    IoRsp,
    /// Local BR/EDR key distribution is available.
    KeysRsp,
    /// The application's answer to a security request.
    SecGrant(bool),
    /// The model needs a passkey from the user.
    TkReq,
    KeyReady(LocalKey),
    /// Link encryption changed; `false` when it failed.
    Encrypted(bool),
    AuthCmpl(Reason),
    /// The response timer of pairing session `session` expired.
    RspTimeout { session: u32 },
    BondReq,
    PublKeyExchReq,
}

impl Body {
    /// LE table event; `None` for bodies the LE table has no row for.
    pub fn le_event(&self) -> Option<LeEvt> {
        let event = match self {
            Body::Pdu(pdu) => match pdu {
                Pdu::PairingReq(_) => LeEvt::PairingReq,
                Pdu::PairingRsp(_) => LeEvt::PairingRsp,
                Pdu::Confirm(_) => LeEvt::Confirm,
                Pdu::Random(_) => LeEvt::Rand,
                Pdu::PairingFailed(_) => LeEvt::PairingFailed,
                Pdu::KeyInfo(_) => LeEvt::KeyInfo,
                Pdu::SecurityReq(_) => LeEvt::SecurityReq,
                Pdu::PublicKey(_) => LeEvt::PublicKey,
                Pdu::DhKeyCheck(_) => LeEvt::DhkeyCheck,
            },
            Body::L2capConn { .. } => LeEvt::L2capConn,
            Body::L2capDisconn => LeEvt::L2capDisconn,
            Body::IoRsp => LeEvt::IoRsp,
            Body::SecGrant(_) => LeEvt::ApiSecGrant,
            Body::TkReq => LeEvt::TkReq,
            Body::KeyReady(_) => LeEvt::KeyReady,
            Body::Encrypted(_) => LeEvt::Encrypted,
            Body::AuthCmpl(_) | Body::RspTimeout { .. } => LeEvt::AuthCmpl,
            Body::BondReq => LeEvt::BondReq,
            Body::PublKeyExchReq => LeEvt::PublKeyExchReq,
            Body::KeysRsp => return None,
        };
        Some(event)
    }

    /// BR/EDR table event.
    pub fn br_event(&self) -> Option<BrEvt> {
        let event = match self {
            Body::Pdu(Pdu::PairingReq(_)) => BrEvt::PairingReq,
            Body::Pdu(Pdu::PairingRsp(_)) => BrEvt::PairingRsp,
            Body::Pdu(Pdu::PairingFailed(_)) => BrEvt::PairingFailed,
            Body::Pdu(Pdu::KeyInfo(_)) => BrEvt::KeyInfo,
            Body::L2capConn { .. } => BrEvt::L2capConn,
            Body::L2capDisconn => BrEvt::L2capDisconn,
            Body::KeysRsp => BrEvt::KeysRsp,
            Body::SecGrant(_) => BrEvt::ApiSecGrant,
            Body::AuthCmpl(_) | Body::RspTimeout { .. } => BrEvt::AuthCmpl,
            Body::BondReq => BrEvt::BondReq,
            _ => return None,
        };
        Some(event)
    }
}

/// One event for the pairing session with `remote` on `transport`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmpMsg {
    pub remote: BdAddr,
    pub transport: Transport,
    pub body: Body,
}

impl SmpMsg {
    pub fn le(remote: BdAddr, body: Body) -> Self {
        Self {
            remote,
            transport: Transport::Le,
            body,
        }
    }

    pub fn br(remote: BdAddr, body: Body) -> Self {
        Self {
            remote,
            transport: Transport::BrEdr,
            body,
        }
    }

    /// Envelope action code, namespaced by the security profile id.
    pub fn act(&self) -> u16 {
        let code = match self.transport {
            Transport::Le => self.body.le_event().map(|event| event.to_raw(ProfileId::DM_SEC.0)),
            Transport::BrEdr => self
                .body
                .br_event()
                .map(|event| event.to_raw(ProfileId::DM_SEC.0) + BR_BASE),
        };
        code.unwrap_or(ACT_UNKNOWN)
    }
}
