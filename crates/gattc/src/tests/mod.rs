use std::sync::{Arc, Mutex};

use bsm::Status;
use btc::{BdAddr, Dispatcher};

use crate::api::{GattClient, GattcEvent};
use crate::config::GattcConfig;
use crate::msg::{GattcMsg, WriteKind};
use crate::profile::Gattc;

mod queue;
mod table;

const PEER: BdAddr = BdAddr::new([0x00, 0x1b, 0xdc, 0x07, 0x31, 0x9e]);
const OTHER: BdAddr = BdAddr::new([0x00, 0x1b, 0xdc, 0x07, 0x31, 0x9f]);
const CONN: u16 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkCall {
    Connect(BdAddr),
    CancelConnect(BdAddr),
    Disconnect(u16),
    Discover(u16),
    Read(u16, u16),
    ReadMulti(u16, Vec<u16>),
    Write(u16, u16, Vec<u8>),
    Exec(u16, bool),
    CfgMtu(u16),
    Confirm(u16, u16),
}

#[derive(Default)]
struct LinkState {
    calls: Vec<LinkCall>,
    refuse: Vec<&'static str>,
    down: bool,
}

/// Lower layer that records every call and fails the ones named in
/// `refuse`.
#[derive(Clone, Default)]
struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    fn calls(&self) -> Vec<LinkCall> {
        core::mem::take(&mut self.state.lock().unwrap().calls)
    }

    fn refuse(&self, what: &'static str) {
        self.state.lock().unwrap().refuse.push(what);
    }

    fn set_down(&self, down: bool) {
        self.state.lock().unwrap().down = down;
    }

    fn record(&mut self, what: &'static str, call: LinkCall) -> Status {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.refuse.contains(&what) {
            Status::Fail
        } else {
            Status::Success
        }
    }
}

impl GattClient for MockLink {
    fn connect(&mut self, _client_if: u8, remote: BdAddr, _is_direct: bool) -> Status {
        self.record("connect", LinkCall::Connect(remote))
    }

    fn cancel_connect(&mut self, _client_if: u8, remote: BdAddr) -> Status {
        self.record("cancel_connect", LinkCall::CancelConnect(remote))
    }

    fn disconnect(&mut self, conn_id: u16) -> Status {
        self.record("disconnect", LinkCall::Disconnect(conn_id))
    }

    fn discover(&mut self, conn_id: u16) -> Status {
        self.record("discover", LinkCall::Discover(conn_id))
    }

    fn read(&mut self, conn_id: u16, handle: u16) -> Status {
        self.record("read", LinkCall::Read(conn_id, handle))
    }

    fn read_multi(&mut self, conn_id: u16, handles: &[u16]) -> Status {
        self.record("read_multi", LinkCall::ReadMulti(conn_id, handles.to_vec()))
    }

    fn write(&mut self, conn_id: u16, handle: u16, _kind: WriteKind, value: &[u8]) -> Status {
        self.record("write", LinkCall::Write(conn_id, handle, value.to_vec()))
    }

    fn execute_write(&mut self, conn_id: u16, execute: bool) -> Status {
        self.record("execute_write", LinkCall::Exec(conn_id, execute))
    }

    fn configure_mtu(&mut self, conn_id: u16) -> Status {
        self.record("configure_mtu", LinkCall::CfgMtu(conn_id))
    }

    fn confirm(&mut self, conn_id: u16, handle: u16) -> Status {
        self.record("confirm", LinkCall::Confirm(conn_id, handle))
    }

    fn is_link_up(&self, _remote: BdAddr) -> bool {
        !self.state.lock().unwrap().down
    }
}

type Events = Arc<Mutex<Vec<GattcEvent>>>;

/// A profile with one registered client, driven directly through
/// `hdl_event`.
struct Harness {
    gattc: Gattc,
    link: MockLink,
    events: Events,
    client_if: u8,
    _pump: Dispatcher,
}

impl Harness {
    fn new(config: GattcConfig) -> Self {
        let pump = Dispatcher::builder().build();
        let link = MockLink::default();
        let mut gattc = Gattc::new(Box::new(link.clone()), pump.sender(), config);
        let events = Events::default();
        let sink = Arc::clone(&events);
        let client_if = gattc
            .register(Box::new(move |event| sink.lock().unwrap().push(event)))
            .unwrap();
        assert_eq!(
            core::mem::take(&mut *events.lock().unwrap()),
            vec![GattcEvent::Reg {
                status: Status::Success,
                client_if
            }]
        );
        Self {
            gattc,
            link,
            events,
            client_if,
            _pump: pump,
        }
    }

    fn without_discovery() -> Self {
        Self::new(GattcConfig::builder().auto_discover(false).build())
    }

    fn events(&self) -> Vec<GattcEvent> {
        core::mem::take(&mut *self.events.lock().unwrap())
    }

    fn open(&mut self, remote: BdAddr) {
        self.gattc.hdl_event(GattcMsg::ApiOpen {
            client_if: self.client_if,
            remote,
            is_direct: true,
        });
    }

    /// Opens and completes the connection to [`PEER`] as [`CONN`].
    fn connect(&mut self) {
        self.open(PEER);
        self.gattc.hdl_event(GattcMsg::IntConn {
            client_if: self.client_if,
            remote: PEER,
            conn_id: CONN,
            mtu: 0,
        });
    }

    fn read(&mut self, handle: u16) -> btc::Disposition {
        self.gattc.hdl_event(GattcMsg::ApiRead {
            conn_id: CONN,
            handle,
        })
    }

    fn read_done(&mut self, value: &[u8]) {
        self.gattc.hdl_event(GattcMsg::OpCmpl {
            conn_id: CONN,
            op: crate::msg::Op::Read,
            status: Status::Success,
            value: value.to_vec(),
        });
    }
}
