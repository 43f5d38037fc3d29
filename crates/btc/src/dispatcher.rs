//! Consumer side of the context switch.
//!
//! The [`Dispatcher`] owns every registered [`Profile`] and hands each
//! queued [`Message`] to its target, one at a time and in queue order.
//! Profiles therefore never need locks for their own state.

use core::any::Any;
use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bsm::{Error, Result};

use crate::config::TransportConfig;
use crate::msg::{Message, ProfileId, Sig};
use crate::transport::{Sender, Shared};

/// How long a blocked pump sleeps before rechecking for shutdown.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// What a profile did with a message's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Arguments were dropped when the handler returned.
    Released,
    /// A control block kept the arguments for a later completion.
    Retained,
}

/// A subsystem reachable through the transport.
pub trait Profile: Send {
    /// Handles a [`Sig::ApiCall`] message.
    fn call(&mut self, msg: Message) -> Disposition;

    /// Handles a [`Sig::ApiCallback`] message.
    fn callback(&mut self, msg: Message) -> Disposition {
        log::debug!("callback {:?} not handled", msg.envelope());
        Disposition::Released
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Counters kept by the pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub released: u64,
    pub retained: u64,
    /// Messages for a profile that is not registered.
    pub dropped: u64,
}

pub struct DispatcherBuilder {
    config: TransportConfig,
    shared: Arc<Shared>,
    profiles: Vec<(ProfileId, Box<dyn Profile>)>,
}

impl DispatcherBuilder {
    pub fn new(config: TransportConfig) -> Self {
        let shared = Shared::new(&config);
        Self {
            config,
            shared,
            profiles: Vec::new(),
        }
    }

    /// Sender for profiles that post to themselves; valid before `build`.
    pub fn sender(&self) -> Sender {
        Sender::new(Arc::clone(&self.shared))
    }

    pub fn register(mut self, pid: ProfileId, profile: Box<dyn Profile>) -> Self {
        self.profiles.push((pid, profile));
        self
    }

    /// Builds the dispatcher. Duplicate or surplus registrations are logged
    /// and left out.
    pub fn build(self) -> Dispatcher {
        let mut dispatcher = Dispatcher {
            config: self.config,
            shared: self.shared,
            profiles: BTreeMap::new(),
            stats: DispatchStats::default(),
        };
        for (pid, profile) in self.profiles {
            if let Err(err) = dispatcher.register(pid, profile) {
                log::error!("{}: profile {:?} not registered: {}", dispatcher.config.name, pid, err);
            }
        }
        dispatcher
    }
}

pub struct Dispatcher {
    config: TransportConfig,
    shared: Arc<Shared>,
    profiles: BTreeMap<ProfileId, Box<dyn Profile>>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn sender(&self) -> Sender {
        Sender::new(Arc::clone(&self.shared))
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Adds a profile. Fails with `Fail` if `pid` is taken and with `NoMem`
    /// once `max_profiles` are registered.
    pub fn register(&mut self, pid: ProfileId, profile: Box<dyn Profile>) -> Result<()> {
        if self.profiles.contains_key(&pid) {
            return Err(Error::Fail);
        }
        if self.profiles.len() >= self.config.max_profiles {
            return Err(Error::NoMem);
        }
        self.profiles.insert(pid, profile);
        Ok(())
    }

    pub fn unregister(&mut self, pid: ProfileId) -> Option<Box<dyn Profile>> {
        self.profiles.remove(&pid)
    }

    /// Typed access to a registered profile.
    pub fn profile_mut<P: Profile + 'static>(&mut self, pid: ProfileId) -> Option<&mut P> {
        self.profiles
            .get_mut(&pid)
            .and_then(|profile| profile.as_any_mut().downcast_mut::<P>())
    }

    /// Delivers at most one message. Returns `false` when the queue was
    /// empty.
    pub fn dispatch_once(&mut self) -> bool {
        let Some(msg) = self.shared.pop() else {
            return false;
        };

        let envelope = msg.envelope();
        let Some(profile) = self.profiles.get_mut(&envelope.pid) else {
            log::warn!("{}: no profile for {:?}", self.config.name, envelope);
            self.stats.dropped += 1;
            return true;
        };

        let disposition = match envelope.sig {
            Sig::ApiCall => profile.call(msg),
            Sig::ApiCallback => profile.callback(msg),
        };
        match disposition {
            Disposition::Released => self.stats.released += 1,
            Disposition::Retained => self.stats.retained += 1,
        }
        true
    }

    /// Drains the queue, including messages posted while draining, then
    /// runs the idle callback.
    pub fn run_until_idle(&mut self) {
        while self.dispatch_once() {}
        if let Some(idle) = self.config.idle_callback {
            idle();
        }
    }

    /// Pumps until [`shutdown`](Self::shutdown) and the queue is empty.
    pub fn run(&mut self) {
        log::debug!("{}: pump started", self.config.name);
        loop {
            self.run_until_idle();
            if !self.shared.is_enabled() && self.shared.is_empty() {
                break;
            }
            self.shared.wait(IDLE_POLL);
        }
        log::debug!("{}: pump stopped", self.config.name);
    }

    /// Stops admission. Already queued messages are still delivered by a
    /// running pump; new submissions fail with `InvalidState`.
    pub fn shutdown(&self) {
        self.shared.disable();
    }

    /// Moves the pump onto its own thread.
    pub fn spawn(mut self) -> DispatcherHandle {
        let sender = self.sender();
        let shared = Arc::clone(&self.shared);
        let name = self.config.name;
        let join = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                self.run();
                self
            });
        match join {
            Ok(join) => DispatcherHandle {
                sender,
                shared,
                join: Some(join),
            },
            Err(err) => {
                log::error!("{}: cannot spawn pump: {}", name, err);
                shared.disable();
                DispatcherHandle {
                    sender,
                    shared,
                    join: None,
                }
            }
        }
    }
}

/// A pump running on its own thread.
pub struct DispatcherHandle {
    sender: Sender,
    shared: Arc<Shared>,
    join: Option<JoinHandle<Dispatcher>>,
}

impl DispatcherHandle {
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Stops admission, waits for the pump to drain and returns it.
    pub fn shutdown(mut self) -> Option<Dispatcher> {
        self.shared.disable();
        let join = self.join.take()?;
        match join.join() {
            Ok(dispatcher) => Some(dispatcher),
            Err(_) => {
                log::error!("pump thread panicked");
                None
            }
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.shared.disable();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
