//! # bsm
//!
//! State machine engines shared by every Bluedroid profile and procedure.
//!
//! ## Module Overview
//! - [`status`] – Outcome vocabulary shared by actions, engines and transport.
//! - [`id`]     – Dense state/event identifiers and the [`define_ids!`] macro.
//! - [`flat`]   – One handler per state (BTC style).
//! - [`table`]  – `[state][event] -> (actions, next state)` dispatch (BTA style).
//! - [`entry`]  – Role-indexed entry maps with a shared all-states table (SMP style).
//! - [`queue`]  – Per control block command queuing discipline.
//!
//! The engines never own control blocks: profiles keep them in their own
//! registries and hand them to [`StateMachine::execute`] one event at a time.

pub mod entry;
pub mod flat;
pub mod id;
pub mod queue;
pub mod status;
pub mod table;

pub use entry::{MappedTable, Selector, ALL_TABLE, IGNORE};
pub use flat::{FlatMachine, SmEvent, StateHandler};
pub use id::{EventId, StateId, EVENT_MASK};
pub use queue::{Admission, CommandQueue};
pub use status::{Error, Result, Status};
pub use table::{
    ControlBlock, DirectTable, Lookup, Outcome, StateMachine, TableError, Transition,
};
