use std::sync::{Arc, Mutex};

use bsm::Status;
use btc::BdAddr;

use crate::api::{AvEvent, AvLink};
use crate::config::AvConfig;
use crate::msg::{AvMsg, Sep};
use crate::profile::Av;
use crate::sm::AvState;

mod states;

const PEER: BdAddr = BdAddr::new([0x00, 0x1b, 0xdc, 0x0a, 0x2d, 0x01]);
const OTHER: BdAddr = BdAddr::new([0x00, 0x1b, 0xdc, 0x0a, 0x2d, 0x02]);

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkCall {
    Open(BdAddr, bool),
    Disconnect(BdAddr),
    Close,
    Start,
    Stop(bool),
}

#[derive(Default)]
struct LinkState {
    calls: Vec<LinkCall>,
    refuse: bool,
}

/// AVDTP layer that records every call.
#[derive(Clone, Default)]
struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    fn calls(&self) -> Vec<LinkCall> {
        core::mem::take(&mut self.state.lock().unwrap().calls)
    }

    fn refuse(&self) {
        self.state.lock().unwrap().refuse = true;
    }

    fn record(&mut self, call: LinkCall) -> Status {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.refuse {
            Status::Fail
        } else {
            Status::Success
        }
    }
}

impl AvLink for MockLink {
    fn open(&mut self, remote: BdAddr, with_rc: bool) -> Status {
        self.record(LinkCall::Open(remote, with_rc))
    }

    fn disconnect(&mut self, remote: BdAddr) -> Status {
        self.record(LinkCall::Disconnect(remote))
    }

    fn close(&mut self) -> Status {
        self.record(LinkCall::Close)
    }

    fn start(&mut self) -> Status {
        self.record(LinkCall::Start)
    }

    fn stop(&mut self, suspend: bool) -> Status {
        self.record(LinkCall::Stop(suspend))
    }
}

type Events = Arc<Mutex<Vec<AvEvent>>>;

struct Harness {
    av: Av,
    link: MockLink,
    events: Events,
}

impl Harness {
    fn new(config: AvConfig) -> Self {
        let link = MockLink::default();
        let events = Events::default();
        let sink = Arc::clone(&events);
        let mut av = Av::new(config);
        av.enable(
            Box::new(link.clone()),
            Box::new(move |event| sink.lock().unwrap().push(event)),
        )
        .unwrap();
        Self { av, link, events }
    }

    fn events(&self) -> Vec<AvEvent> {
        core::mem::take(&mut *self.events.lock().unwrap())
    }

    fn send(&mut self, msg: AvMsg) -> Status {
        self.av.dispatch(msg)
    }

    fn state(&self) -> Option<AvState> {
        self.av.state()
    }

    /// Connects to `PEER` as the source of a sink peer; history cleared.
    fn opened() -> Self {
        let mut harness = Self::new(AvConfig::default());
        harness.send(AvMsg::ConnectReq { remote: PEER });
        harness.send(AvMsg::Open {
            success: true,
            sep: Sep::Sink,
        });
        assert_eq!(harness.state(), Some(AvState::Opened));
        harness.link.calls();
        harness.events();
        harness
    }

    /// A local start acknowledged by the peer; history cleared.
    fn started() -> Self {
        let mut harness = Self::opened();
        harness.send(AvMsg::StartStreamReq);
        harness.send(AvMsg::Start {
            success: true,
            suspending: false,
        });
        assert_eq!(harness.state(), Some(AvState::Started));
        harness.link.calls();
        harness.events();
        harness
    }
}
