//! Connection control block and the GATT client actions.
//!
//! Actions never return a status to the engine. Failures are reported to
//! the application, or turned into further events that re-enter
//! [`GATTC_SM`] for the same control block.

use bsm::{Admission, CommandQueue, ControlBlock, Status};
use btc::BdAddr;

use crate::api::GattcEvent;
use crate::msg::{CloseReason, GattcMsg, Op};
use crate::profile::Env;
use crate::sm::{GattcAction, GattcEvt, GattcState, GATTC_SM};

/// Commands a connection can hold behind the in-flight one.
pub const CMD_QUEUE_DEPTH: usize = 30;

/// ATT default MTU for LE.
const DEFAULT_MTU: u16 = 23;

/// Pending service discovery relative to the command in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoUpdate {
    NoSchedule,
    /// Discovery must start once the in-flight command completes.
    DiscWaiting,
    /// The in-flight command completed; discovery may start.
    ReqWaiting,
}

pub struct Clcb {
    conn_id: u16,
    client_if: u8,
    remote: BdAddr,
    state: GattcState,
    queue: CommandQueue<GattcMsg, CMD_QUEUE_DEPTH>,
    status: Status,
    auto_update: AutoUpdate,
    disc_active: bool,
    mtu: u16,
    release: bool,
}

impl Clcb {
    pub fn new(client_if: u8, remote: BdAddr, max_pending: usize) -> Self {
        Self {
            conn_id: 0,
            client_if,
            remote,
            state: GattcState::Idle,
            queue: CommandQueue::with_limit(max_pending),
            status: Status::Success,
            auto_update: AutoUpdate::NoSchedule,
            disc_active: false,
            mtu: 0,
            release: false,
        }
    }

    pub fn conn_id(&self) -> u16 {
        self.conn_id
    }

    pub fn client_if(&self) -> u8 {
        self.client_if
    }

    pub fn remote(&self) -> BdAddr {
        self.remote
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn auto_update(&self) -> AutoUpdate {
        self.auto_update
    }

    pub fn disc_active(&self) -> bool {
        self.disc_active
    }

    /// Command the connection is currently running (or holding during
    /// discovery).
    pub fn in_flight(&self) -> Option<&GattcMsg> {
        self.queue.in_flight()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }

    /// Back in idle after a terminal action; the pool may free it.
    pub(crate) fn is_finished(&self) -> bool {
        self.release && self.state == GattcState::Idle
    }
}

impl ControlBlock for Clcb {
    type State = GattcState;
    type Event = GattcEvt;
    type Action = GattcAction;
    type Data = GattcMsg;
    type Context = Env;

    fn state(&self) -> GattcState {
        self.state
    }

    fn set_state(&mut self, next: GattcState) {
        self.state = next;
    }

    fn perform(&mut self, env: &mut Env, action: GattcAction, data: &mut Option<GattcMsg>) {
        match action {
            GattcAction::Open => self.open(env, data),
            GattcAction::OpenFail => self.open_fail(env),
            GattcAction::CancelOpen => self.cancel_open(env),
            GattcAction::CancelOpenOk => self.cancel_open_ok(env),
            GattcAction::CancelOpenError => {
                self.notify(env, GattcEvent::CancelOpen { status: Status::Fail })
            }
            GattcAction::Conn => self.conn(env, data),
            GattcAction::StartDiscover => self.start_discover(env),
            GattcAction::DiscCmpl => self.disc_cmpl(env, data),
            GattcAction::QCmd => {
                self.enqueue(env, data);
            }
            GattcAction::Close => self.close(env, data),
            GattcAction::CloseFail => {
                self.notify(env, self.close_event(Status::Fail, CloseReason::LocalHost))
            }
            GattcAction::Read
            | GattcAction::Write
            | GattcAction::Exec
            | GattcAction::CfgMtu
            | GattcAction::ReadMulti => self.start_op(env, data),
            GattcAction::OpCmpl => self.op_cmpl(env, data),
            GattcAction::Search => self.search(env),
            GattcAction::Confirm => self.confirm(env, data),
            GattcAction::IgnoreOpCmpl => {
                log::debug!("conn {}: completion during discovery ignored", self.conn_id);
            }
            GattcAction::DiscClose => self.disc_close(env, data),
            GattcAction::RestartDiscover => {
                self.status = Status::Fail;
                self.auto_update = AutoUpdate::DiscWaiting;
            }
            GattcAction::Fail => self.fail(env, data),
        }
    }
}

impl Clcb {
    fn notify(&self, env: &mut Env, event: GattcEvent) {
        env.notify(self.client_if, event);
    }

    fn close_event(&self, status: Status, reason: CloseReason) -> GattcEvent {
        GattcEvent::Close {
            status,
            conn_id: self.conn_id,
            remote: self.remote,
            reason,
        }
    }

    /// Reports the single completion owed for `cmd`.
    fn complete(&self, env: &mut Env, cmd: &GattcMsg, status: Status) {
        let event = match cmd {
            GattcMsg::ApiSearch { .. } => GattcEvent::SearchCmpl {
                status,
                conn_id: self.conn_id,
            },
            _ => match cmd.op() {
                Some(op) => GattcEvent::OpCmpl {
                    status,
                    conn_id: self.conn_id,
                    op,
                    value: Vec::new(),
                },
                None => return,
            },
        };
        self.notify(env, event);
    }

    fn open(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        let Some(GattcMsg::ApiOpen { is_direct, .. }) = data.as_ref() else {
            return;
        };
        let status = env.link.connect(self.client_if, self.remote, *is_direct);
        if !status.is_ok() {
            log::warn!("{}: connect failed: {}", self.remote, status);
            let _ = GATTC_SM.execute(self, env, GattcEvt::IntOpenFail, None);
        }
    }

    fn open_fail(&mut self, env: &mut Env) {
        self.status = Status::Fail;
        self.notify(
            env,
            GattcEvent::Open {
                status: Status::Fail,
                conn_id: self.conn_id,
                remote: self.remote,
                mtu: 0,
            },
        );
        self.release = true;
    }

    fn cancel_open(&mut self, env: &mut Env) {
        if env.link.cancel_connect(self.client_if, self.remote).is_ok() {
            let _ = GATTC_SM.execute(self, env, GattcEvt::IntCancelOpenOk, None);
        } else {
            self.notify(env, GattcEvent::CancelOpen {
                status: Status::Fail,
            });
        }
    }

    fn cancel_open_ok(&mut self, env: &mut Env) {
        self.notify(env, GattcEvent::CancelOpen {
            status: Status::Success,
        });
        self.release = true;
    }

    fn conn(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        let from_link = match data.as_ref() {
            Some(GattcMsg::IntConn { conn_id, mtu, .. }) => {
                self.conn_id = *conn_id;
                self.mtu = *mtu;
                true
            }
            _ => false,
        };
        if self.mtu == 0 {
            self.mtu = DEFAULT_MTU;
        }

        self.notify(
            env,
            GattcEvent::Open {
                status: Status::Success,
                conn_id: self.conn_id,
                remote: self.remote,
                mtu: self.mtu,
            },
        );

        if from_link
            && self.state == GattcState::Conn
            && env.config.auto_discover
            && !env.cache.contains(&self.remote)
        {
            let _ = GATTC_SM.execute(self, env, GattcEvt::IntDiscover, None);
        }
    }

    fn start_discover(&mut self, env: &mut Env) {
        if self.queue.is_busy() && self.auto_update != AutoUpdate::ReqWaiting {
            // A command is outstanding: discover after its completion.
            self.auto_update = AutoUpdate::DiscWaiting;
            self.state = GattcState::Conn;
            return;
        }

        self.auto_update = AutoUpdate::NoSchedule;
        self.status = env.link.discover(self.conn_id);
        if self.status.is_ok() {
            self.disc_active = true;
            return;
        }

        log::warn!("conn {}: discovery failed to start: {}", self.conn_id, self.status);
        let failed = GattcMsg::DiscoverCmpl {
            conn_id: self.conn_id,
            status: self.status,
        };
        let _ = GATTC_SM.execute(self, env, GattcEvt::DiscoverCmpl, Some(failed));
    }

    fn disc_cmpl(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        let status = match data.as_ref() {
            Some(GattcMsg::DiscoverCmpl { status, .. }) => *status,
            _ => self.status,
        };
        self.disc_active = false;
        self.status = status;
        if status.is_ok() {
            env.cache.insert(self.remote);
        } else {
            env.cache.remove(&self.remote);
        }
        self.notify(env, GattcEvent::DiscoverCmpl {
            status,
            conn_id: self.conn_id,
        });

        if self.auto_update == AutoUpdate::DiscWaiting {
            // A held command has not reached the link; rediscover first.
            self.auto_update = AutoUpdate::ReqWaiting;
            let _ = GATTC_SM.execute(self, env, GattcEvt::IntDiscover, None);
        } else if let Some(cmd) = self.queue.take_in_flight() {
            self.resume(env, cmd);
            self.pop_next(env);
        }
    }

    /// Runs a held command through the state machine again.
    fn resume(&mut self, env: &mut Env, cmd: GattcMsg) {
        if !env.link.is_link_up(self.remote) {
            self.complete(env, &cmd, Status::Fail);
            return;
        }
        let Some(event) = cmd.event() else {
            return;
        };
        let outcome = GATTC_SM.execute(self, env, event, Some(cmd));
        if !outcome.handled() {
            if let Some(cmd) = outcome.into_data() {
                self.complete(env, &cmd, Status::Fail);
            }
        }
    }

    /// Admits `data` as the in-flight command. Returns `true` when the
    /// caller should start it now.
    fn enqueue(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) -> bool {
        match self.queue.admit(data) {
            Admission::Started => true,
            Admission::Queued => {
                log::debug!(
                    "conn {}: command queued ({} pending)",
                    self.conn_id,
                    self.queue.pending_len()
                );
                false
            }
            Admission::Full => {
                log::warn!("conn {}: command queue full", self.conn_id);
                if let Some(cmd) = data.as_ref() {
                    self.complete(env, cmd, Status::NoMem);
                }
                self.notify(env, GattcEvent::QueueFull {
                    conn_id: self.conn_id,
                    is_full: true,
                });
                false
            }
        }
    }

    fn start_op(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        if !self.enqueue(env, data) {
            return;
        }
        let Some(cmd) = self.queue.in_flight() else {
            return;
        };

        let conn_id = self.conn_id;
        let link = &mut env.link;
        let (op, status) = match cmd {
            GattcMsg::ApiRead { handle, .. } => (Op::Read, link.read(conn_id, *handle)),
            GattcMsg::ApiReadMulti { handles, .. } => (Op::ReadMulti, link.read_multi(conn_id, handles)),
            GattcMsg::ApiWrite {
                handle,
                kind,
                value,
                ..
            } => (Op::Write, link.write(conn_id, *handle, *kind, value)),
            GattcMsg::ApiExec { execute, .. } => (Op::ExecWrite, link.execute_write(conn_id, *execute)),
            GattcMsg::ApiCfgMtu { .. } => (Op::CfgMtu, link.configure_mtu(conn_id)),
            other => {
                log::error!("conn {}: {:?} is not an ATT request", conn_id, other);
                return;
            }
        };

        if !status.is_ok() {
            log::warn!("conn {}: {:?} not started: {}", conn_id, op, status);
            let failed = GattcMsg::OpCmpl {
                conn_id,
                op,
                status,
                value: Vec::new(),
            };
            if let Err(err) = env.api.indicate(failed.clone()) {
                log::error!("conn {}: completion not posted ({}), completing inline", conn_id, err);
                let _ = GATTC_SM.execute(self, env, GattcEvt::OpCmpl, Some(failed));
            }
        }
    }

    fn op_cmpl(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        let Some(GattcMsg::OpCmpl {
            op, status, value, ..
        }) = data.as_mut()
        else {
            return;
        };
        let (op, status, value) = (*op, *status, core::mem::take(value));

        let Some(pending) = self.queue.in_flight().and_then(GattcMsg::op) else {
            log::error!("conn {}: {:?} completion without a pending command", self.conn_id, op);
            return;
        };
        if pending != op {
            log::error!("conn {}: expected {:?} completion, got {:?}", self.conn_id, pending, op);
            return;
        }

        self.queue.take_in_flight();
        if op == Op::CfgMtu && status.is_ok() {
            if let [lo, hi] = value.as_slice() {
                self.mtu = u16::from_le_bytes([*lo, *hi]);
            }
        }
        self.notify(
            env,
            GattcEvent::OpCmpl {
                status,
                conn_id: self.conn_id,
                op,
                value,
            },
        );

        self.pop_next(env);

        if self.auto_update == AutoUpdate::DiscWaiting {
            self.auto_update = AutoUpdate::ReqWaiting;
            let _ = GATTC_SM.execute(self, env, GattcEvt::IntDiscover, None);
        }
    }

    /// Resumes held commands until one of them is outstanding again.
    fn pop_next(&mut self, env: &mut Env) {
        while !self.queue.is_busy() {
            let Some(next) = self.queue.next_pending() else {
                break;
            };
            self.resume(env, next);
        }
        if self.queue.clear_full() {
            self.notify(env, GattcEvent::QueueFull {
                conn_id: self.conn_id,
                is_full: false,
            });
        }
    }

    /// Completes every held command with `Fail`.
    fn flush(&mut self, env: &mut Env) {
        let held: Vec<GattcMsg> = self.queue.drain().collect();
        for cmd in &held {
            self.complete(env, cmd, Status::Fail);
        }
    }

    fn close(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        let (status, reason) = match data.as_ref() {
            Some(GattcMsg::IntDisconn { reason, .. }) => (Status::Success, *reason),
            _ => (env.link.disconnect(self.conn_id), CloseReason::LocalHost),
        };

        self.disc_active = false;
        self.auto_update = AutoUpdate::NoSchedule;
        self.flush(env);
        self.notify(env, self.close_event(status, reason));
        self.release = true;
    }

    fn disc_close(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        self.auto_update = AutoUpdate::NoSchedule;
        self.flush(env);

        if self.disc_active {
            let aborted = GattcMsg::DiscoverCmpl {
                conn_id: self.conn_id,
                status: Status::Fail,
            };
            let _ = GATTC_SM.execute(self, env, GattcEvt::DiscoverCmpl, Some(aborted));
        } else {
            self.state = GattcState::Conn;
        }

        if self.state == GattcState::Conn {
            self.close(env, data);
            self.state = GattcState::Idle;
        }
    }

    fn search(&mut self, env: &mut Env) {
        let status = if env.cache.contains(&self.remote) {
            Status::Success
        } else {
            Status::Fail
        };
        self.notify(env, GattcEvent::SearchCmpl {
            status,
            conn_id: self.conn_id,
        });
    }

    fn confirm(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        let Some(GattcMsg::ApiConfirm { handle, .. }) = data.as_ref() else {
            return;
        };
        let status = env.link.confirm(self.conn_id, *handle);
        if !status.is_ok() {
            log::warn!("conn {}: confirm of {:#06x} failed: {}", self.conn_id, handle, status);
        }
    }

    fn fail(&mut self, env: &mut Env, data: &mut Option<GattcMsg>) {
        log::error!(
            "{}: {:?} not supported in {:?}",
            self.remote,
            data.as_ref().and_then(GattcMsg::event),
            self.state
        );
        if let Some(cmd) = data.as_ref() {
            self.complete(env, cmd, Status::InvalidState);
        }
    }
}
