//! Messages delivered to the GATT client profile.
//!
//! Each message owns its arguments, so it can cross the transport and be
//! parked in a control block without referring back to its producer.

use bsm::{EventId, Status};
use btc::{BdAddr, ProfileId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sm::GattcEvt;

/// Envelope action code of messages handled outside the state machine.
pub const ACT_REFRESH: u16 = 0x0340;
pub const ACT_DEREGISTER: u16 = 0x0341;

/// ATT procedure a queued command stands for.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    ReadMulti,
    Write,
    ExecWrite,
    CfgMtu,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    WithResponse,
    NoResponse,
    Prepare,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The local application closed the connection.
    LocalHost,
    /// The link went down underneath.
    LinkLoss,
    PeerUser,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattcMsg {
    ApiOpen {
        client_if: u8,
        remote: BdAddr,
        is_direct: bool,
    },
    IntOpenFail {
        client_if: u8,
        remote: BdAddr,
    },
    ApiCancelOpen {
        client_if: u8,
        remote: BdAddr,
    },
    IntCancelOpenOk {
        client_if: u8,
        remote: BdAddr,
    },
    ApiRead {
        conn_id: u16,
        handle: u16,
    },
    ApiWrite {
        conn_id: u16,
        handle: u16,
        kind: WriteKind,
        value: Vec<u8>,
    },
    ApiExec {
        conn_id: u16,
        execute: bool,
    },
    ApiCfgMtu {
        conn_id: u16,
    },
    ApiClose {
        conn_id: u16,
    },
    ApiSearch {
        conn_id: u16,
        uuid: Option<u16>,
    },
    ApiConfirm {
        conn_id: u16,
        handle: u16,
    },
    ApiReadMulti {
        conn_id: u16,
        handles: Vec<u16>,
    },
    IntConn {
        client_if: u8,
        remote: BdAddr,
        conn_id: u16,
        mtu: u16,
    },
    IntDiscover {
        conn_id: u16,
    },
    DiscoverCmpl {
        conn_id: u16,
        status: Status,
    },
    OpCmpl {
        conn_id: u16,
        op: Op,
        status: Status,
        value: Vec<u8>,
    },
    IntDisconn {
        conn_id: u16,
        reason: CloseReason,
    },
    /// Drops the cached server database of `remote`.
    ApiRefresh {
        remote: BdAddr,
    },
    ApiDeregister {
        client_if: u8,
    },
}

impl GattcMsg {
    /// State machine event of this message; `None` for messages the
    /// profile handles itself.
    pub fn event(&self) -> Option<GattcEvt> {
        let event = match self {
            GattcMsg::ApiOpen { .. } => GattcEvt::ApiOpen,
            GattcMsg::IntOpenFail { .. } => GattcEvt::IntOpenFail,
            GattcMsg::ApiCancelOpen { .. } => GattcEvt::ApiCancelOpen,
            GattcMsg::IntCancelOpenOk { .. } => GattcEvt::IntCancelOpenOk,
            GattcMsg::ApiRead { .. } => GattcEvt::ApiRead,
            GattcMsg::ApiWrite { .. } => GattcEvt::ApiWrite,
            GattcMsg::ApiExec { .. } => GattcEvt::ApiExec,
            GattcMsg::ApiCfgMtu { .. } => GattcEvt::ApiCfgMtu,
            GattcMsg::ApiClose { .. } => GattcEvt::ApiClose,
            GattcMsg::ApiSearch { .. } => GattcEvt::ApiSearch,
            GattcMsg::ApiConfirm { .. } => GattcEvt::ApiConfirm,
            GattcMsg::ApiReadMulti { .. } => GattcEvt::ApiReadMulti,
            GattcMsg::IntConn { .. } => GattcEvt::IntConn,
            GattcMsg::IntDiscover { .. } => GattcEvt::IntDiscover,
            GattcMsg::DiscoverCmpl { .. } => GattcEvt::DiscoverCmpl,
            GattcMsg::OpCmpl { .. } => GattcEvt::OpCmpl,
            GattcMsg::IntDisconn { .. } => GattcEvt::IntDisconn,
            GattcMsg::ApiRefresh { .. } | GattcMsg::ApiDeregister { .. } => return None,
        };
        Some(event)
    }

    /// Envelope action code, namespaced by the GATT client profile id.
    pub fn act(&self) -> u16 {
        match (self.event(), self) {
            (Some(event), _) => event.to_raw(ProfileId::GATTC.0),
            (None, GattcMsg::ApiRefresh { .. }) => ACT_REFRESH,
            (None, _) => ACT_DEREGISTER,
        }
    }

    /// Connection id for messages keyed by connection.
    pub fn conn_id(&self) -> Option<u16> {
        match *self {
            GattcMsg::ApiRead { conn_id, .. }
            | GattcMsg::ApiWrite { conn_id, .. }
            | GattcMsg::ApiExec { conn_id, .. }
            | GattcMsg::ApiCfgMtu { conn_id }
            | GattcMsg::ApiClose { conn_id }
            | GattcMsg::ApiSearch { conn_id, .. }
            | GattcMsg::ApiConfirm { conn_id, .. }
            | GattcMsg::ApiReadMulti { conn_id, .. }
            | GattcMsg::IntDiscover { conn_id }
            | GattcMsg::DiscoverCmpl { conn_id, .. }
            | GattcMsg::OpCmpl { conn_id, .. }
            | GattcMsg::IntDisconn { conn_id, .. } => Some(conn_id),
            _ => None,
        }
    }

    /// ATT procedure of a queueable command.
    pub fn op(&self) -> Option<Op> {
        match self {
            GattcMsg::ApiRead { .. } => Some(Op::Read),
            GattcMsg::ApiReadMulti { .. } => Some(Op::ReadMulti),
            GattcMsg::ApiWrite { .. } => Some(Op::Write),
            GattcMsg::ApiExec { .. } => Some(Op::ExecWrite),
            GattcMsg::ApiCfgMtu { .. } => Some(Op::CfgMtu),
            _ => None,
        }
    }
}
