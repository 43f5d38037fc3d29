//! # smp
//!
//! Security Manager pairing. Each pairing with a peer is a session driven
//! by an entry-mapped table: LE sessions by [`LE_SM`], whose master and
//! slave roles select different rows, BR/EDR sessions by [`BR_SM`].
//!
//! ## Module Overview
//! - [`pdu`]     – SMP commands, key masks and failure reasons.
//! - [`msg`]     – Owned messages and their LE / BR/EDR event ids.
//! - [`model`]   – Association model selection and passkey helpers.
//! - [`api`]     – Application callback, link and crypto traits, [`SmpApi`].
//! - [`le`]      – LE states, actions, table and [`LeSession`].
//! - [`br`]      – BR/EDR states, actions, table and [`BrSession`].
//! - [`profile`] – Session registry and `hdl_event`.
//! - [`config`]  – Local pairing parameters.
//!
//! A session that sends a command waits for the peer under a response
//! timer. Pairing failure, timeout and link loss reach the shared
//! all-states rows from every state, so a session never outlives its
//! procedure.

pub mod api;
pub mod br;
pub mod config;
pub mod le;
pub mod model;
pub mod msg;
pub mod pdu;
pub mod profile;

mod pairing;

pub use api::{SecLevel, SmpApi, SmpCrypto, SmpEvent, SmpHandler, SmpLink};
pub use br::{BrAction, BrEvt, BrSession, BrState, BR_SM};
pub use config::{SmpConfig, SmpConfigBuilder, RSP_TIMEOUT_TICKS};
pub use le::{LeAction, LeEvt, LeSession, LeState, LE_SM};
pub use model::{Entry, Model};
pub use msg::{Body, LocalKey, Role, SmpMsg, Transport};
pub use pdu::{AuthReq, DistKey, IoCap, KeyMask, PairParams, Pdu, Reason};
pub use profile::{Env, Smp};

#[cfg(test)]
mod tests;
