//! # btc
//!
//! The context-switch transport of the Bluedroid port: every API call and
//! every lower-layer callback is turned into an owned [`Message`] and posted
//! to one dispatch context, which routes it to the registered [`Profile`].
//!
//! ## Module Overview
//! - [`msg`]        – Envelope, profile identifiers and owned messages.
//! - [`config`]     – Transport sizing and idle hook.
//! - [`transport`]  – Producer side: [`Sender`] with deep-copy submit.
//! - [`dispatcher`] – Consumer side: profile registry and message pump.
//! - [`time`]       – Tick-driven time events posted through the transport.
//!
//! Producers may live on any thread. Profiles only ever run on the thread
//! that drives the [`Dispatcher`].

#[cfg(not(any(feature = "std", feature = "lock-free")))]
compile_error!("enable either the `std` or the `lock-free` feature");

pub mod config;
pub mod dispatcher;
pub mod msg;
pub mod time;
pub mod transport;

mod sync;

pub use config::{TransportConfig, TransportConfigBuilder};
pub use dispatcher::{
    DispatchStats, Dispatcher, DispatcherBuilder, DispatcherHandle, Disposition, Profile,
};
pub use msg::{BdAddr, Envelope, Message, Payload, ProfileId, Sig};
pub use time::{TimeEvent, TimerWheel};
pub use transport::Sender;

#[cfg(test)]
mod tests;
