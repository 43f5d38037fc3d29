//! # av
//!
//! A2DP connection handling. One audio link at a time is tracked by a flat
//! state machine ([`bsm::FlatMachine`]) whose state handlers live in [`sm`];
//! the [`Av`] profile owns the machine and feeds it transport messages.
//!
//! ## Module Overview
//! - [`msg`]     – Requests and lower-layer indications, with event ids.
//! - [`api`]     – Application events, lower-layer trait and [`AvApi`].
//! - [`sm`]      – States, the control block and one handler per state.
//! - [`profile`] – Enable/disable and `hdl_event`.
//! - [`config`]  – Profile configuration.
//!
//! Connection and audio state changes are reported to the application from
//! the handlers and from the ENTER actions of `Opening` and `Started`.

pub mod api;
pub mod config;
pub mod msg;
pub mod profile;
pub mod sm;

pub use api::{AudioState, AvApi, AvEvent, AvHandler, AvLink, ConnState, DiscReason};
pub use config::{AvConfig, AvConfigBuilder};
pub use msg::{AvEvt, AvMsg, Sep};
pub use profile::Av;
pub use sm::{AvCb, AvState, Flags, AV_HANDLERS};

#[cfg(test)]
mod tests;
