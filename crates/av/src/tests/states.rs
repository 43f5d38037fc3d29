use bsm::Status;
use btc::BdAddr;

use crate::api::{AudioState, AvEvent, ConnState, DiscReason};
use crate::config::AvConfig;
use crate::msg::{AvMsg, Sep};
use crate::sm::{AvState, Flags};

use super::{Harness, LinkCall, OTHER, PEER};

fn conn(remote: BdAddr, state: ConnState) -> AvEvent {
    AvEvent::Connection { remote, state }
}

fn audio(state: AudioState) -> AvEvent {
    AvEvent::Audio {
        remote: PEER,
        state,
    }
}

const NORMAL: ConnState = ConnState::Disconnected(DiscReason::Normal);

#[test]
fn connect_reports_connecting_then_connected() {
    let mut h = Harness::new(AvConfig::default());
    assert_eq!(h.send(AvMsg::ConnectReq { remote: PEER }), Status::Success);
    assert_eq!(h.link.calls(), vec![LinkCall::Open(PEER, false)]);
    assert_eq!(h.events(), vec![conn(PEER, ConnState::Connecting)]);
    assert_eq!(h.state(), Some(AvState::Opening));

    h.send(AvMsg::Open {
        success: true,
        sep: Sep::Sink,
    });
    assert_eq!(h.events(), vec![conn(PEER, ConnState::Connected)]);
    assert_eq!(h.state(), Some(AvState::Opened));
    let cb = h.av.control_block().unwrap();
    assert_eq!(cb.peer(), PEER);
    assert_eq!(cb.peer_sep(), Some(Sep::Sink));
    assert!(h.av.stream_ready());
}

#[test]
fn control_channel_follows_the_configuration() {
    let mut h = Harness::new(AvConfig::builder().with_rc(true).build());
    h.send(AvMsg::ConnectReq { remote: PEER });
    assert_eq!(h.link.calls(), vec![LinkCall::Open(PEER, true)]);
}

#[test]
fn incoming_connection_opens_towards_the_caller() {
    let mut h = Harness::new(AvConfig::default());
    h.send(AvMsg::Pending { remote: OTHER });
    assert_eq!(h.link.calls(), vec![LinkCall::Open(OTHER, false)]);
    assert_eq!(h.events(), vec![conn(OTHER, ConnState::Connecting)]);
}

#[test]
fn failed_open_returns_to_idle() {
    let mut h = Harness::new(AvConfig::default());
    h.send(AvMsg::ConnectReq { remote: PEER });
    h.events();
    h.send(AvMsg::Open {
        success: false,
        sep: Sep::Sink,
    });
    assert_eq!(h.events(), vec![conn(PEER, NORMAL)]);
    assert_eq!(h.state(), Some(AvState::Idle));
    assert_eq!(h.av.control_block().unwrap().peer(), BdAddr::ANY);
}

#[test]
fn rejected_open_returns_to_idle() {
    let mut h = Harness::new(AvConfig::default());
    h.send(AvMsg::ConnectReq { remote: PEER });
    h.events();
    h.send(AvMsg::Reject);
    assert_eq!(h.events(), vec![conn(PEER, NORMAL)]);
    assert_eq!(h.state(), Some(AvState::Idle));
}

#[test]
fn refused_open_never_leaves_idle() {
    let mut h = Harness::new(AvConfig::default());
    h.link.refuse();
    assert_eq!(h.send(AvMsg::ConnectReq { remote: PEER }), Status::Success);
    assert_eq!(h.link.calls(), vec![LinkCall::Open(PEER, false)]);
    assert_eq!(h.events(), vec![conn(PEER, NORMAL)]);
    assert_eq!(h.state(), Some(AvState::Idle));
}

#[test]
fn second_peer_is_turned_away_while_opening() {
    let mut h = Harness::new(AvConfig::default());
    h.send(AvMsg::ConnectReq { remote: PEER });
    h.link.calls();
    h.events();

    h.send(AvMsg::ConnectReq { remote: OTHER });
    assert_eq!(h.events(), vec![conn(OTHER, NORMAL)]);
    h.send(AvMsg::Pending { remote: OTHER });
    assert_eq!(h.link.calls(), vec![LinkCall::Disconnect(OTHER)]);

    h.send(AvMsg::ConnectReq { remote: PEER });
    h.send(AvMsg::Pending { remote: PEER });
    assert!(h.link.calls().is_empty());
    assert!(h.events().is_empty());
    assert_eq!(h.state(), Some(AvState::Opening));
    assert_eq!(h.av.control_block().unwrap().peer(), PEER);
}

#[test]
fn disconnect_without_a_link_reports_disconnected() {
    let mut h = Harness::new(AvConfig::default());
    assert_eq!(h.send(AvMsg::DisconnectReq { remote: PEER }), Status::Success);
    assert_eq!(h.events(), vec![conn(PEER, NORMAL)]);
    assert!(h.link.calls().is_empty());
}

#[test]
fn stream_requests_in_idle_are_unhandled() {
    let mut h = Harness::new(AvConfig::default());
    assert_eq!(h.send(AvMsg::StartStreamReq), Status::Unhandled);
    assert_eq!(h.send(AvMsg::Close { reason: 0 }), Status::Unhandled);
    assert!(h.events().is_empty());
    assert_eq!(h.state(), Some(AvState::Idle));
}

#[test]
fn local_start_streams_audio() {
    let mut h = Harness::opened();
    h.send(AvMsg::StartStreamReq);
    assert_eq!(h.link.calls(), vec![LinkCall::Start]);
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::PENDING_START);

    h.send(AvMsg::Start {
        success: true,
        suspending: false,
    });
    assert_eq!(h.events(), vec![audio(AudioState::Started)]);
    assert_eq!(h.state(), Some(AvState::Started));
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::NONE);
    assert!(h.link.calls().is_empty());
    assert!(h.av.stream_started_ready());
}

#[test]
fn stream_started_by_the_sink_is_suspended() {
    let mut h = Harness::opened();
    h.send(AvMsg::Start {
        success: true,
        suspending: false,
    });
    assert_eq!(h.events(), vec![audio(AudioState::Started)]);
    assert_eq!(h.link.calls(), vec![LinkCall::Stop(true)]);
    assert_eq!(h.state(), Some(AvState::Started));
    assert!(!h.av.stream_started_ready());
}

#[test]
fn peer_start_can_be_accepted() {
    let mut h = Harness::new(AvConfig::builder().suspend_remote_start(false).build());
    h.send(AvMsg::ConnectReq { remote: PEER });
    h.send(AvMsg::Open {
        success: true,
        sep: Sep::Sink,
    });
    h.link.calls();
    h.send(AvMsg::Start {
        success: true,
        suspending: false,
    });
    assert!(h.link.calls().is_empty());
    assert!(h.av.stream_started_ready());
}

#[test]
fn failed_start_stays_opened() {
    let mut h = Harness::opened();
    h.send(AvMsg::StartStreamReq);
    let status = h.send(AvMsg::Start {
        success: false,
        suspending: false,
    });
    assert_eq!(status, Status::Unhandled);
    assert_eq!(h.state(), Some(AvState::Opened));
    assert!(h.events().is_empty());
}

#[test]
fn start_that_is_being_suspended_is_ignored() {
    let mut h = Harness::opened();
    let status = h.send(AvMsg::Start {
        success: true,
        suspending: true,
    });
    assert_eq!(status, Status::Success);
    assert_eq!(h.state(), Some(AvState::Opened));
    assert!(h.link.calls().is_empty());
}

#[test]
fn local_suspend_stops_audio() {
    let mut h = Harness::started();
    h.send(AvMsg::SuspendStreamReq);
    assert_eq!(h.link.calls(), vec![LinkCall::Stop(true)]);
    assert_eq!(
        h.av.control_block().unwrap().flags(),
        Flags::LOCAL_SUSPEND_PENDING
    );
    assert!(!h.av.stream_started_ready());

    h.send(AvMsg::Suspend {
        success: true,
        initiator: true,
    });
    assert_eq!(h.events(), vec![audio(AudioState::Stopped)]);
    assert_eq!(h.state(), Some(AvState::Opened));
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::NONE);
    assert!(h.av.stream_ready());
}

#[test]
fn remote_suspend_blocks_the_stream_until_restarted() {
    let mut h = Harness::started();
    h.send(AvMsg::Suspend {
        success: true,
        initiator: false,
    });
    assert_eq!(h.events(), vec![audio(AudioState::RemoteSuspend)]);
    assert_eq!(h.state(), Some(AvState::Opened));
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::REMOTE_SUSPEND);
    assert!(!h.av.stream_ready());

    h.send(AvMsg::StartStreamReq);
    h.send(AvMsg::Start {
        success: true,
        suspending: false,
    });
    assert_eq!(h.events(), vec![audio(AudioState::Started)]);
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::NONE);
}

#[test]
fn failed_suspend_keeps_streaming() {
    let mut h = Harness::started();
    h.send(AvMsg::StopStreamReq);
    let status = h.send(AvMsg::Suspend {
        success: false,
        initiator: true,
    });
    assert_eq!(status, Status::Unhandled);
    assert_eq!(h.state(), Some(AvState::Started));
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::NONE);
    assert!(h.events().is_empty());
}

#[test]
fn stop_returns_to_opened_only_on_success() {
    let mut h = Harness::started();
    h.send(AvMsg::Stop { success: false });
    assert_eq!(h.events(), vec![audio(AudioState::Stopped)]);
    assert_eq!(h.state(), Some(AvState::Started));
    assert!(!h.av.stream_started_ready());

    h.send(AvMsg::Stop { success: true });
    assert_eq!(h.state(), Some(AvState::Opened));
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::NONE);
}

#[test]
fn disconnect_while_streaming_waits_in_closing() {
    let mut h = Harness::started();
    h.send(AvMsg::DisconnectReq { remote: PEER });
    assert_eq!(h.link.calls(), vec![LinkCall::Close]);
    assert_eq!(h.events(), vec![conn(PEER, ConnState::Disconnecting)]);
    assert_eq!(h.state(), Some(AvState::Closing));

    assert_eq!(h.send(AvMsg::Stop { success: true }), Status::Success);
    assert_eq!(h.send(AvMsg::StartStreamReq), Status::Unhandled);
    h.send(AvMsg::Close { reason: 0x13 });
    assert_eq!(
        h.events(),
        vec![conn(PEER, ConnState::Disconnected(DiscReason::Abnormal))]
    );
    assert_eq!(h.state(), Some(AvState::Idle));
}

#[test]
fn disconnect_while_opened_waits_for_the_close() {
    let mut h = Harness::opened();
    h.send(AvMsg::DisconnectReq { remote: PEER });
    assert_eq!(h.link.calls(), vec![LinkCall::Close]);
    assert_eq!(h.events(), vec![conn(PEER, ConnState::Disconnecting)]);
    assert_eq!(h.state(), Some(AvState::Opened));

    h.send(AvMsg::Close { reason: 0 });
    assert_eq!(h.events(), vec![conn(PEER, NORMAL)]);
    assert_eq!(h.state(), Some(AvState::Idle));
    assert_eq!(h.av.control_block().unwrap().peer_sep(), None);
}

#[test]
fn link_loss_while_streaming_goes_idle() {
    let mut h = Harness::started();
    h.send(AvMsg::Close { reason: 0x08 });
    assert_eq!(
        h.events(),
        vec![conn(PEER, ConnState::Disconnected(DiscReason::Abnormal))]
    );
    assert_eq!(h.state(), Some(AvState::Idle));
    assert_eq!(h.av.control_block().unwrap().flags(), Flags::NONE);
}

#[test]
fn connect_to_another_peer_while_opened_is_refused() {
    let mut h = Harness::opened();
    h.send(AvMsg::ConnectReq { remote: PEER });
    assert!(h.events().is_empty());
    h.send(AvMsg::ConnectReq { remote: OTHER });
    assert_eq!(h.events(), vec![conn(OTHER, NORMAL)]);
    assert!(h.link.calls().is_empty());
    assert_eq!(h.state(), Some(AvState::Opened));
}
