//! # gattc
//!
//! GATT client profile. Every connection between a registered client and a
//! server is a control block ([`Clcb`]) driven by the table in [`sm`]; the
//! [`Gattc`] profile owns the control blocks and routes transport messages
//! to them.
//!
//! ## Module Overview
//! - [`msg`]     – Owned request/indication messages and their event ids.
//! - [`api`]     – Application callback, lower-layer trait and [`GattcApi`].
//! - [`sm`]      – States, actions and the transition table.
//! - [`clcb`]    – Connection control block and the action bodies.
//! - [`profile`] – Control-block pool, registration and `hdl_event`.
//! - [`config`]  – Profile configuration.
//!
//! A connection runs at most one ATT request at a time. Further requests
//! wait in a bounded per-connection queue; requests made during service
//! discovery are held until discovery completes.

pub mod api;
pub mod clcb;
pub mod config;
pub mod msg;
pub mod profile;
pub mod sm;

pub use api::{GattClient, GattcApi, GattcEvent, GattcHandler};
pub use clcb::{AutoUpdate, Clcb, CMD_QUEUE_DEPTH};
pub use config::{GattcConfig, GattcConfigBuilder};
pub use msg::{CloseReason, GattcMsg, Op, WriteKind};
pub use profile::{Env, Gattc, CLCB_MAX};
pub use sm::{GattcAction, GattcEvt, GattcState, GATTC_SM};

#[cfg(test)]
mod tests;
