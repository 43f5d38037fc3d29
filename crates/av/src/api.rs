//! Boundaries of the A2DP profile.
//!
//! * [`AvHandler`] receives connection and audio state reports.
//! * [`AvLink`] is the AVDTP lower layer the state handlers drive.
//! * [`AvApi`] turns application calls and lower-layer indications into
//!   transport messages.

use bsm::{Result, Status};
use btc::{BdAddr, Envelope, ProfileId, Sender};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::msg::{AvMsg, Sep};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscReason {
    Normal,
    Abnormal,
}

impl DiscReason {
    /// Any non-zero HCI reason is abnormal.
    pub const fn from_hci(reason: u8) -> Self {
        if reason == 0 {
            DiscReason::Normal
        } else {
            DiscReason::Abnormal
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    Disconnected(DiscReason),
    Connecting,
    Connected,
    Disconnecting,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioState {
    /// The peer suspended the stream.
    RemoteSuspend,
    Stopped,
    Started,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvEvent {
    Connection { remote: BdAddr, state: ConnState },
    Audio { remote: BdAddr, state: AudioState },
}

pub trait AvHandler: Send {
    fn on_event(&mut self, event: AvEvent);
}

impl<F> AvHandler for F
where
    F: FnMut(AvEvent) + Send,
{
    fn on_event(&mut self, event: AvEvent) {
        self(event)
    }
}

/// AVDTP operations of the lower layer. Results come back as
/// [`AvMsg::Open`], [`AvMsg::Start`] and friends through the transport.
pub trait AvLink: Send {
    fn open(&mut self, remote: BdAddr, with_rc: bool) -> Status;

    /// Drops an incoming connection we do not want.
    fn disconnect(&mut self, remote: BdAddr) -> Status;

    fn close(&mut self) -> Status;

    fn start(&mut self) -> Status;

    /// Stops the stream; `suspend` keeps the stream configured.
    fn stop(&mut self, suspend: bool) -> Status;
}

/// Posts A2DP messages through the transport.
#[derive(Clone)]
pub struct AvApi {
    sender: Sender,
}

impl AvApi {
    pub fn new(sender: Sender) -> Self {
        Self { sender }
    }

    pub fn request(&self, msg: AvMsg) -> Result<()> {
        let envelope = Envelope::call(ProfileId::A2DP, msg.act());
        self.sender.post(envelope, msg)
    }

    pub fn indicate(&self, msg: AvMsg) -> Result<()> {
        let envelope = Envelope::callback(ProfileId::A2DP, msg.act());
        self.sender.post(envelope, msg)
    }

    pub fn connect(&self, remote: BdAddr) -> Result<()> {
        self.request(AvMsg::ConnectReq { remote })
    }

    pub fn disconnect(&self, remote: BdAddr) -> Result<()> {
        self.request(AvMsg::DisconnectReq { remote })
    }

    pub fn start_stream(&self) -> Result<()> {
        self.request(AvMsg::StartStreamReq)
    }

    pub fn suspend_stream(&self) -> Result<()> {
        self.request(AvMsg::SuspendStreamReq)
    }

    pub fn stop_stream(&self) -> Result<()> {
        self.request(AvMsg::StopStreamReq)
    }

    pub fn disable(&self) -> Result<()> {
        self.request(AvMsg::ApiDisable)
    }

    pub fn incoming(&self, remote: BdAddr) -> Result<()> {
        self.indicate(AvMsg::Pending { remote })
    }

    pub fn opened(&self, success: bool, sep: Sep) -> Result<()> {
        self.indicate(AvMsg::Open { success, sep })
    }

    pub fn closed(&self, reason: u8) -> Result<()> {
        self.indicate(AvMsg::Close { reason })
    }

    pub fn started(&self, success: bool) -> Result<()> {
        self.indicate(AvMsg::Start {
            success,
            suspending: false,
        })
    }

    pub fn suspended(&self, success: bool, initiator: bool) -> Result<()> {
        self.indicate(AvMsg::Suspend { success, initiator })
    }
}
