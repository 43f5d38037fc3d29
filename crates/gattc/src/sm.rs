//! GATT client state machine.
//!
//! Four states per connection control block. Every cell holds at most one
//! action; an empty cell ignores the event and keeps the state.

use bsm::{define_ids, DirectTable, StateMachine, Transition};

define_ids! {
    /// Connection phase of one client/server pair.
    pub enum GattcState: StateId {
        Idle,
        WaitConn,
        Conn,
        Discover,
    }
}

define_ids! {
    pub enum GattcEvt: EventId {
        ApiOpen,
        IntOpenFail,
        ApiCancelOpen,
        IntCancelOpenOk,
        ApiRead,
        ApiWrite,
        ApiExec,
        ApiCfgMtu,
        ApiClose,
        ApiSearch,
        ApiConfirm,
        ApiReadMulti,
        IntConn,
        IntDiscover,
        DiscoverCmpl,
        OpCmpl,
        IntDisconn,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GattcAction {
    Open,
    OpenFail,
    CancelOpen,
    CancelOpenOk,
    CancelOpenError,
    Conn,
    StartDiscover,
    DiscCmpl,
    QCmd,
    Close,
    CloseFail,
    Read,
    Write,
    Exec,
    CfgMtu,
    OpCmpl,
    Search,
    Confirm,
    ReadMulti,
    IgnoreOpCmpl,
    DiscClose,
    RestartDiscover,
    Fail,
}

type Cell = Transition<GattcAction, GattcState>;

const fn ignore(state: GattcState) -> Cell {
    Transition::new(&[], state)
}

use GattcAction as A;
use GattcState as S;

static IDLE: [Cell; GattcEvt::ALL.len()] = [
    /* ApiOpen */ Transition::new(&[A::Open], S::WaitConn),
    /* IntOpenFail */ ignore(S::Idle),
    /* ApiCancelOpen */ ignore(S::Idle),
    /* IntCancelOpenOk */ ignore(S::Idle),
    /* ApiRead */ Transition::new(&[A::Fail], S::Idle),
    /* ApiWrite */ Transition::new(&[A::Fail], S::Idle),
    /* ApiExec */ Transition::new(&[A::Fail], S::Idle),
    /* ApiCfgMtu */ Transition::new(&[A::Fail], S::Idle),
    /* ApiClose */ Transition::new(&[A::CloseFail], S::Idle),
    /* ApiSearch */ Transition::new(&[A::Fail], S::Idle),
    /* ApiConfirm */ Transition::new(&[A::Fail], S::Idle),
    /* ApiReadMulti */ Transition::new(&[A::Fail], S::Idle),
    /* IntConn */ Transition::new(&[A::Conn], S::Conn),
    /* IntDiscover */ ignore(S::Idle),
    /* DiscoverCmpl */ ignore(S::Idle),
    /* OpCmpl */ ignore(S::Idle),
    /* IntDisconn */ ignore(S::Idle),
];

static WAIT_CONN: [Cell; GattcEvt::ALL.len()] = [
    /* ApiOpen */ Transition::new(&[A::Open], S::WaitConn),
    /* IntOpenFail */ Transition::new(&[A::OpenFail], S::Idle),
    /* ApiCancelOpen */ Transition::new(&[A::CancelOpen], S::WaitConn),
    /* IntCancelOpenOk */ Transition::new(&[A::CancelOpenOk], S::Idle),
    /* ApiRead */ Transition::new(&[A::Fail], S::WaitConn),
    /* ApiWrite */ Transition::new(&[A::Fail], S::WaitConn),
    /* ApiExec */ Transition::new(&[A::Fail], S::WaitConn),
    /* ApiCfgMtu */ Transition::new(&[A::Fail], S::WaitConn),
    /* ApiClose */ Transition::new(&[A::CancelOpen], S::WaitConn),
    /* ApiSearch */ Transition::new(&[A::Fail], S::WaitConn),
    /* ApiConfirm */ Transition::new(&[A::Fail], S::WaitConn),
    /* ApiReadMulti */ Transition::new(&[A::Fail], S::WaitConn),
    /* IntConn */ Transition::new(&[A::Conn], S::Conn),
    /* IntDiscover */ ignore(S::WaitConn),
    /* DiscoverCmpl */ ignore(S::WaitConn),
    /* OpCmpl */ ignore(S::WaitConn),
    /* IntDisconn */ Transition::new(&[A::OpenFail], S::Idle),
];

static CONN: [Cell; GattcEvt::ALL.len()] = [
    /* ApiOpen */ Transition::new(&[A::Conn], S::Conn),
    /* IntOpenFail */ ignore(S::Conn),
    /* ApiCancelOpen */ Transition::new(&[A::CancelOpenError], S::Conn),
    /* IntCancelOpenOk */ ignore(S::Conn),
    /* ApiRead */ Transition::new(&[A::Read], S::Conn),
    /* ApiWrite */ Transition::new(&[A::Write], S::Conn),
    /* ApiExec */ Transition::new(&[A::Exec], S::Conn),
    /* ApiCfgMtu */ Transition::new(&[A::CfgMtu], S::Conn),
    /* ApiClose */ Transition::new(&[A::Close], S::Idle),
    /* ApiSearch */ Transition::new(&[A::Search], S::Conn),
    /* ApiConfirm */ Transition::new(&[A::Confirm], S::Conn),
    /* ApiReadMulti */ Transition::new(&[A::ReadMulti], S::Conn),
    /* IntConn */ ignore(S::Conn),
    /* IntDiscover */ Transition::new(&[A::StartDiscover], S::Discover),
    /* DiscoverCmpl */ ignore(S::Conn),
    /* OpCmpl */ Transition::new(&[A::OpCmpl], S::Conn),
    /* IntDisconn */ Transition::new(&[A::Close], S::Idle),
];

static DISCOVER: [Cell; GattcEvt::ALL.len()] = [
    /* ApiOpen */ Transition::new(&[A::Conn], S::Discover),
    /* IntOpenFail */ ignore(S::Discover),
    /* ApiCancelOpen */ Transition::new(&[A::CancelOpenError], S::Discover),
    /* IntCancelOpenOk */ ignore(S::Discover),
    /* ApiRead */ Transition::new(&[A::QCmd], S::Discover),
    /* ApiWrite */ Transition::new(&[A::QCmd], S::Discover),
    /* ApiExec */ Transition::new(&[A::QCmd], S::Discover),
    /* ApiCfgMtu */ Transition::new(&[A::QCmd], S::Discover),
    /* ApiClose */ Transition::new(&[A::DiscClose], S::Discover),
    /* ApiSearch */ Transition::new(&[A::QCmd], S::Discover),
    /* ApiConfirm */ Transition::new(&[A::Confirm], S::Discover),
    /* ApiReadMulti */ Transition::new(&[A::QCmd], S::Discover),
    /* IntConn */ Transition::new(&[A::Conn], S::Discover),
    /* IntDiscover */ Transition::new(&[A::RestartDiscover], S::Discover),
    /* DiscoverCmpl */ Transition::new(&[A::DiscCmpl], S::Conn),
    /* OpCmpl */ Transition::new(&[A::IgnoreOpCmpl], S::Discover),
    /* IntDisconn */ Transition::new(&[A::Close], S::Idle),
];

static ROWS: &[&[Cell]] = &[&IDLE, &WAIT_CONN, &CONN, &DISCOVER];

/// The GATT client state machine.
pub static GATTC_SM: StateMachine<DirectTable<GattcState, GattcEvt, GattcAction>> =
    StateMachine::new("gattc", DirectTable::new(ROWS));
