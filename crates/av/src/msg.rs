//! Messages delivered to the A2DP profile.

use bsm::EventId;
use btc::{BdAddr, ProfileId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Envelope action code of `ApiDisable`, which bypasses the machine.
pub const ACT_DISABLE: u16 = 0x0d40;

/// Stream end point type of the peer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sep {
    /// The peer plays audio; we are the source.
    Sink,
    /// The peer sends audio; we are the sink.
    Source,
}

bsm::define_ids! {
    pub enum AvEvt: EventId {
        ConnectReq,
        DisconnectReq,
        StartStreamReq,
        StopStreamReq,
        SuspendStreamReq,
        Pending,
        Open,
        Reject,
        Close,
        Start,
        Suspend,
        Stop,
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvMsg {
    ConnectReq {
        remote: BdAddr,
    },
    DisconnectReq {
        remote: BdAddr,
    },
    StartStreamReq,
    StopStreamReq,
    SuspendStreamReq,
    /// Incoming connection from `remote`.
    Pending {
        remote: BdAddr,
    },
    Open {
        success: bool,
        sep: Sep,
    },
    Reject,
    /// Signalling channel closed. `reason` is the HCI disconnect reason,
    /// 0 for a normal close.
    Close {
        reason: u8,
    },
    Start {
        success: bool,
        /// The stack is suspending the stream it just started.
        suspending: bool,
    },
    Suspend {
        success: bool,
        /// We asked for the suspend.
        initiator: bool,
    },
    Stop {
        success: bool,
    },
    /// Tear the profile down once the link is idle.
    ApiDisable,
}

impl AvMsg {
    pub fn event(&self) -> Option<AvEvt> {
        let event = match self {
            AvMsg::ConnectReq { .. } => AvEvt::ConnectReq,
            AvMsg::DisconnectReq { .. } => AvEvt::DisconnectReq,
            AvMsg::StartStreamReq => AvEvt::StartStreamReq,
            AvMsg::StopStreamReq => AvEvt::StopStreamReq,
            AvMsg::SuspendStreamReq => AvEvt::SuspendStreamReq,
            AvMsg::Pending { .. } => AvEvt::Pending,
            AvMsg::Open { .. } => AvEvt::Open,
            AvMsg::Reject => AvEvt::Reject,
            AvMsg::Close { .. } => AvEvt::Close,
            AvMsg::Start { .. } => AvEvt::Start,
            AvMsg::Suspend { .. } => AvEvt::Suspend,
            AvMsg::Stop { .. } => AvEvt::Stop,
            AvMsg::ApiDisable => return None,
        };
        Some(event)
    }

    /// Envelope action code, namespaced by the A2DP profile id.
    pub fn act(&self) -> u16 {
        self.event()
            .map_or(ACT_DISABLE, |event| event.to_raw(ProfileId::A2DP.0))
    }
}
