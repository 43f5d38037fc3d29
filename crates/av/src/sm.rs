//! A2DP connection states.
//!
//! One handler per state, in [`AV_HANDLERS`] order. Handlers change state
//! explicitly; the engine only runs the EXIT and ENTER handlers around the
//! switch.

use core::fmt;

use bsm::{define_ids, FlatMachine, SmEvent, StateHandler};
use btc::BdAddr;

use crate::api::{AudioState, AvEvent, AvHandler, AvLink, ConnState, DiscReason};
use crate::config::AvConfig;
use crate::msg::{AvMsg, Sep};

define_ids! {
    pub enum AvState: StateId {
        Idle,
        Opening,
        Opened,
        Started,
        Closing,
    }
}

/// Pending stream operations.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(pub u8);

impl Flags {
    pub const NONE: Self = Self(0);
    pub const LOCAL_SUSPEND_PENDING: Self = Self(0x01);
    pub const REMOTE_SUSPEND: Self = Self(0x02);
    pub const PENDING_START: Self = Self(0x04);
    pub const PENDING_STOP: Self = Self(0x08);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl core::ops::BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#04x})", self.0)
    }
}

/// The single A2DP link.
pub struct AvCb {
    pub(crate) link: Box<dyn AvLink>,
    pub(crate) handler: Box<dyn AvHandler>,
    pub(crate) config: AvConfig,
    peer: BdAddr,
    peer_sep: Option<Sep>,
    flags: Flags,
}

impl AvCb {
    pub(crate) fn new(link: Box<dyn AvLink>, handler: Box<dyn AvHandler>, config: AvConfig) -> Self {
        Self {
            link,
            handler,
            config,
            peer: BdAddr::ANY,
            peer_sep: None,
            flags: Flags::NONE,
        }
    }

    pub fn peer(&self) -> BdAddr {
        self.peer
    }

    pub fn peer_sep(&self) -> Option<Sep> {
        self.peer_sep
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    fn report_connection(&mut self, remote: BdAddr, state: ConnState) {
        log::debug!("{}: connection {:?}", remote, state);
        self.handler.on_event(AvEvent::Connection { remote, state });
    }

    fn report_peer(&mut self, state: ConnState) {
        let peer = self.peer;
        self.report_connection(peer, state);
    }

    fn report_audio(&mut self, state: AudioState) {
        let remote = self.peer;
        log::debug!("{}: audio {:?}", remote, state);
        self.handler.on_event(AvEvent::Audio { remote, state });
    }

    /// Starts the AVDTP open towards the current peer.
    fn open(&mut self) -> bool {
        let status = self.link.open(self.peer, self.config.with_rc);
        if !status.is_ok() {
            log::warn!("{}: open refused: {}", self.peer, status);
        }
        status.is_ok()
    }
}

pub type Machine = FlatMachine<AvCb, AvState, AvMsg>;

pub static AV_HANDLERS: [StateHandler<AvCb, AvState, AvMsg>; 5] =
    [idle, opening, opened, started, closing];

fn idle(sm: &mut Machine, event: SmEvent<AvMsg>) -> bool {
    let cb = sm.context_mut();
    match event {
        SmEvent::Enter => {
            cb.peer = BdAddr::ANY;
            cb.peer_sep = None;
            cb.flags = Flags::NONE;
            true
        }
        SmEvent::Exit => true,
        SmEvent::Event(AvMsg::ConnectReq { remote } | AvMsg::Pending { remote }) => {
            cb.peer = remote;
            if cb.open() {
                sm.change_state(AvState::Opening);
            } else {
                cb.report_peer(ConnState::Disconnected(DiscReason::Normal));
                cb.peer = BdAddr::ANY;
            }
            true
        }
        SmEvent::Event(AvMsg::DisconnectReq { remote }) => {
            log::warn!("{}: no link to disconnect", remote);
            cb.report_connection(remote, ConnState::Disconnected(DiscReason::Normal));
            true
        }
        SmEvent::Event(_) => false,
    }
}

fn opening(sm: &mut Machine, event: SmEvent<AvMsg>) -> bool {
    let cb = sm.context_mut();
    match event {
        SmEvent::Enter => {
            cb.report_peer(ConnState::Connecting);
            true
        }
        SmEvent::Exit => true,
        SmEvent::Event(AvMsg::Reject) => {
            log::warn!("{}: open rejected", cb.peer);
            cb.report_peer(ConnState::Disconnected(DiscReason::Normal));
            sm.change_state(AvState::Idle);
            true
        }
        SmEvent::Event(AvMsg::Open { success, sep }) => {
            if success {
                cb.peer_sep = Some(sep);
                cb.report_peer(ConnState::Connected);
                sm.change_state(AvState::Opened);
            } else {
                log::warn!("{}: open failed", cb.peer);
                cb.report_peer(ConnState::Disconnected(DiscReason::Normal));
                sm.change_state(AvState::Idle);
            }
            true
        }
        SmEvent::Event(AvMsg::ConnectReq { remote }) => {
            if remote == cb.peer {
                log::debug!("{}: already opening", remote);
            } else {
                cb.report_connection(remote, ConnState::Disconnected(DiscReason::Normal));
            }
            true
        }
        SmEvent::Event(AvMsg::Pending { remote }) => {
            if remote == cb.peer {
                log::debug!("{}: incoming while opening, ignored", remote);
            } else {
                log::debug!("{}: busy with {}, dropping incoming", remote, cb.peer);
                cb.link.disconnect(remote);
            }
            true
        }
        SmEvent::Event(_) => false,
    }
}

fn opened(sm: &mut Machine, event: SmEvent<AvMsg>) -> bool {
    let cb = sm.context_mut();
    match event {
        SmEvent::Enter => {
            cb.flags.remove(Flags::PENDING_STOP | Flags::PENDING_START);
            true
        }
        SmEvent::Exit => {
            cb.flags.remove(Flags::PENDING_START);
            true
        }
        SmEvent::Event(AvMsg::StartStreamReq) => {
            if cb.link.start().is_ok() {
                cb.flags.insert(Flags::PENDING_START);
            }
            true
        }
        SmEvent::Event(AvMsg::Start {
            success,
            suspending,
        }) => {
            if success && suspending {
                return true;
            }
            let remote_start = !cb.flags.contains(Flags::PENDING_START)
                && cb.peer_sep == Some(Sep::Sink)
                && cb.config.suspend_remote_start;
            if !success {
                log::warn!("{}: start failed", cb.peer);
                return false;
            }
            sm.change_state(AvState::Started);
            if remote_start {
                log::debug!("{}: peer started the stream, suspending", sm.context().peer);
                sm.dispatch(AvMsg::SuspendStreamReq);
            }
            true
        }
        SmEvent::Event(AvMsg::DisconnectReq { .. }) => {
            cb.link.close();
            cb.report_peer(ConnState::Disconnecting);
            true
        }
        SmEvent::Event(AvMsg::Close { reason }) => {
            cb.report_peer(ConnState::Disconnected(DiscReason::from_hci(reason)));
            sm.change_state(AvState::Idle);
            true
        }
        SmEvent::Event(AvMsg::ConnectReq { remote }) => {
            if remote == cb.peer {
                log::debug!("{}: already connected", remote);
            } else {
                cb.report_connection(remote, ConnState::Disconnected(DiscReason::Normal));
            }
            true
        }
        SmEvent::Event(_) => false,
    }
}

fn started(sm: &mut Machine, event: SmEvent<AvMsg>) -> bool {
    let cb = sm.context_mut();
    match event {
        SmEvent::Enter => {
            cb.flags.remove(Flags::REMOTE_SUSPEND);
            cb.report_audio(AudioState::Started);
            true
        }
        SmEvent::Exit => true,
        // Started by the peer first; nothing left to do.
        SmEvent::Event(AvMsg::StartStreamReq) => true,
        SmEvent::Event(AvMsg::StopStreamReq | AvMsg::SuspendStreamReq) => {
            cb.flags.insert(Flags::LOCAL_SUSPEND_PENDING);
            cb.flags.remove(Flags::REMOTE_SUSPEND);
            if !cb.link.stop(true).is_ok() {
                cb.flags.remove(Flags::LOCAL_SUSPEND_PENDING);
            }
            true
        }
        SmEvent::Event(AvMsg::DisconnectReq { .. }) => {
            cb.link.close();
            cb.report_peer(ConnState::Disconnecting);
            sm.change_state(AvState::Closing);
            true
        }
        SmEvent::Event(AvMsg::Suspend { success, initiator }) => {
            if !success {
                cb.flags.remove(Flags::LOCAL_SUSPEND_PENDING);
                return false;
            }
            if initiator {
                cb.report_audio(AudioState::Stopped);
            } else {
                if !cb.flags.contains(Flags::LOCAL_SUSPEND_PENDING) {
                    cb.flags.insert(Flags::REMOTE_SUSPEND);
                }
                cb.report_audio(AudioState::RemoteSuspend);
            }
            sm.change_state(AvState::Opened);
            sm.context_mut().flags.remove(Flags::LOCAL_SUSPEND_PENDING);
            true
        }
        SmEvent::Event(AvMsg::Stop { success }) => {
            cb.flags.insert(Flags::PENDING_STOP);
            cb.report_audio(AudioState::Stopped);
            if success {
                sm.change_state(AvState::Opened);
            }
            true
        }
        SmEvent::Event(AvMsg::Close { reason }) => {
            cb.flags.insert(Flags::PENDING_STOP);
            cb.report_peer(ConnState::Disconnected(DiscReason::from_hci(reason)));
            sm.change_state(AvState::Idle);
            true
        }
        SmEvent::Event(_) => false,
    }
}

fn closing(sm: &mut Machine, event: SmEvent<AvMsg>) -> bool {
    let cb = sm.context_mut();
    match event {
        SmEvent::Enter | SmEvent::Exit => true,
        SmEvent::Event(AvMsg::Stop { .. } | AvMsg::StopStreamReq) => true,
        SmEvent::Event(AvMsg::Close { reason }) => {
            cb.report_peer(ConnState::Disconnected(DiscReason::from_hci(reason)));
            sm.change_state(AvState::Idle);
            true
        }
        SmEvent::Event(_) => false,
    }
}
