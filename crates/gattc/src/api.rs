//! Boundaries of the GATT client profile.
//!
//! * [`GattcHandler`] receives the outcome of every application request.
//! * [`GattClient`] is the ATT/GATT lower layer the actions drive.
//! * [`GattcApi`] turns application calls and lower-layer indications into
//!   transport messages.

use bsm::{Result, Status};
use btc::{BdAddr, Envelope, ProfileId, Sender};

use crate::msg::{CloseReason, GattcMsg, Op, WriteKind};

/// Application-facing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattcEvent {
    Reg {
        status: Status,
        client_if: u8,
    },
    Dereg {
        client_if: u8,
    },
    Open {
        status: Status,
        conn_id: u16,
        remote: BdAddr,
        mtu: u16,
    },
    Close {
        status: Status,
        conn_id: u16,
        remote: BdAddr,
        reason: CloseReason,
    },
    CancelOpen {
        status: Status,
    },
    /// Completion of a queued ATT procedure.
    OpCmpl {
        status: Status,
        conn_id: u16,
        op: Op,
        value: Vec<u8>,
    },
    SearchCmpl {
        status: Status,
        conn_id: u16,
    },
    DiscoverCmpl {
        status: Status,
        conn_id: u16,
    },
    /// The command queue of `conn_id` refused a request (`is_full`) or has
    /// room again.
    QueueFull {
        conn_id: u16,
        is_full: bool,
    },
}

pub trait GattcHandler: Send {
    fn on_event(&mut self, event: GattcEvent);
}

impl<F> GattcHandler for F
where
    F: FnMut(GattcEvent) + Send,
{
    fn on_event(&mut self, event: GattcEvent) {
        self(event)
    }
}

/// ATT client operations of the lower layer.
///
/// Each call only starts a procedure. Results come back as
/// [`GattcMsg::IntConn`], [`GattcMsg::DiscoverCmpl`], [`GattcMsg::OpCmpl`]
/// and friends through the transport.
pub trait GattClient: Send {
    fn connect(&mut self, client_if: u8, remote: BdAddr, is_direct: bool) -> Status;

    fn cancel_connect(&mut self, client_if: u8, remote: BdAddr) -> Status;

    fn disconnect(&mut self, conn_id: u16) -> Status;

    fn discover(&mut self, conn_id: u16) -> Status;

    fn read(&mut self, conn_id: u16, handle: u16) -> Status;

    fn read_multi(&mut self, conn_id: u16, handles: &[u16]) -> Status;

    fn write(&mut self, conn_id: u16, handle: u16, kind: WriteKind, value: &[u8]) -> Status;

    fn execute_write(&mut self, conn_id: u16, execute: bool) -> Status;

    fn configure_mtu(&mut self, conn_id: u16) -> Status;

    fn confirm(&mut self, conn_id: u16, handle: u16) -> Status;

    /// Whether an LE link to `remote` is still up.
    fn is_link_up(&self, remote: BdAddr) -> bool {
        let _ = remote;
        true
    }
}

/// Posts GATT client messages through the transport.
#[derive(Clone)]
pub struct GattcApi {
    sender: Sender,
}

impl GattcApi {
    pub fn new(sender: Sender) -> Self {
        Self { sender }
    }

    /// Requests from the application.
    pub fn request(&self, msg: GattcMsg) -> Result<()> {
        let envelope = Envelope::call(ProfileId::GATTC, msg.act());
        self.sender.post(envelope, msg)
    }

    /// Indications and completions from the lower layer.
    pub fn indicate(&self, msg: GattcMsg) -> Result<()> {
        let envelope = Envelope::callback(ProfileId::GATTC, msg.act());
        self.sender.post(envelope, msg)
    }

    pub fn open(&self, client_if: u8, remote: BdAddr, is_direct: bool) -> Result<()> {
        self.request(GattcMsg::ApiOpen {
            client_if,
            remote,
            is_direct,
        })
    }

    pub fn cancel_open(&self, client_if: u8, remote: BdAddr) -> Result<()> {
        self.request(GattcMsg::ApiCancelOpen { client_if, remote })
    }

    pub fn close(&self, conn_id: u16) -> Result<()> {
        self.request(GattcMsg::ApiClose { conn_id })
    }

    pub fn read(&self, conn_id: u16, handle: u16) -> Result<()> {
        self.request(GattcMsg::ApiRead { conn_id, handle })
    }

    pub fn read_multi(&self, conn_id: u16, handles: &[u16]) -> Result<()> {
        self.request(GattcMsg::ApiReadMulti {
            conn_id,
            handles: handles.to_vec(),
        })
    }

    /// `value` is copied; the caller keeps its buffer.
    pub fn write(&self, conn_id: u16, handle: u16, kind: WriteKind, value: &[u8]) -> Result<()> {
        self.request(GattcMsg::ApiWrite {
            conn_id,
            handle,
            kind,
            value: value.to_vec(),
        })
    }

    pub fn execute_write(&self, conn_id: u16, execute: bool) -> Result<()> {
        self.request(GattcMsg::ApiExec { conn_id, execute })
    }

    pub fn configure_mtu(&self, conn_id: u16) -> Result<()> {
        self.request(GattcMsg::ApiCfgMtu { conn_id })
    }

    pub fn search(&self, conn_id: u16, uuid: Option<u16>) -> Result<()> {
        self.request(GattcMsg::ApiSearch { conn_id, uuid })
    }

    pub fn confirm(&self, conn_id: u16, handle: u16) -> Result<()> {
        self.request(GattcMsg::ApiConfirm { conn_id, handle })
    }

    pub fn refresh(&self, remote: BdAddr) -> Result<()> {
        self.request(GattcMsg::ApiRefresh { remote })
    }

    pub fn deregister(&self, client_if: u8) -> Result<()> {
        self.request(GattcMsg::ApiDeregister { client_if })
    }

    pub fn connected(&self, client_if: u8, remote: BdAddr, conn_id: u16, mtu: u16) -> Result<()> {
        self.indicate(GattcMsg::IntConn {
            client_if,
            remote,
            conn_id,
            mtu,
        })
    }

    pub fn disconnected(&self, conn_id: u16, reason: CloseReason) -> Result<()> {
        self.indicate(GattcMsg::IntDisconn { conn_id, reason })
    }

    pub fn op_complete(&self, conn_id: u16, op: Op, status: Status, value: &[u8]) -> Result<()> {
        self.indicate(GattcMsg::OpCmpl {
            conn_id,
            op,
            status,
            value: value.to_vec(),
        })
    }

    pub fn discovery_complete(&self, conn_id: u16, status: Status) -> Result<()> {
        self.indicate(GattcMsg::DiscoverCmpl { conn_id, status })
    }
}
