//! Flat state machine engine (BTC style).
//!
//! Each state is a single handler function that receives every event
//! delivered in that state and reports whether it handled it. The engine
//! never changes state on its own: handlers call
//! [`FlatMachine::change_state`], which runs the EXIT handler of the current
//! state and the ENTER handler of the new one.

use crate::id::StateId;
use crate::status::{Error, Result, Status};

/// Event delivered to a state handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmEvent<E> {
    /// Synthetic: the state was just entered.
    Enter,
    /// Synthetic: the state is about to be left.
    Exit,
    Event(E),
}

/// Handler for one state. Returns `true` when the event was handled.
pub type StateHandler<C, S, E> = fn(&mut FlatMachine<C, S, E>, SmEvent<E>) -> bool;

pub struct FlatMachine<C: 'static, S: 'static, E: 'static> {
    name: &'static str,
    handlers: &'static [StateHandler<C, S, E>],
    state: S,
    context: C,
}

impl<C: 'static, S: StateId, E: 'static> FlatMachine<C, S, E> {
    /// Creates the machine in `initial` and runs that state's ENTER handler
    /// before returning, so entry actions precede any real event.
    ///
    /// `handlers` must hold exactly one handler per state.
    pub fn init(
        name: &'static str,
        handlers: &'static [StateHandler<C, S, E>],
        initial: S,
        context: C,
    ) -> Result<Self> {
        if handlers.len() != S::COUNT {
            log::error!(
                "{}: {} handlers for {} states",
                name,
                handlers.len(),
                S::COUNT
            );
            return Err(Error::Fail);
        }

        let mut machine = Self {
            name,
            handlers,
            state: initial,
            context,
        };
        if !machine.invoke(SmEvent::Enter) {
            log::debug!("{}: ENTER not handled in {:?}", name, initial);
        }
        Ok(machine)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Hands `event` to the current state's handler.
    pub fn dispatch(&mut self, event: E) -> Status {
        if self.invoke(SmEvent::Event(event)) {
            Status::Success
        } else {
            log::debug!("{}: event unhandled in {:?}", self.name, self.state);
            Status::Unhandled
        }
    }

    /// EXIT on the current state, switch, ENTER on `next`.
    ///
    /// Returns `Unhandled` if either synthetic event was not handled.
    pub fn change_state(&mut self, next: S) -> Status {
        let mut status = Status::Success;
        if !self.invoke(SmEvent::Exit) {
            status = Status::Unhandled;
        }

        log::trace!("{}: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;

        if !self.invoke(SmEvent::Enter) {
            status = Status::Unhandled;
        }
        status
    }

    /// Releases the machine and hands back its context. No EXIT is sent.
    pub fn shutdown(self) -> C {
        log::trace!("{}: shutdown in {:?}", self.name, self.state);
        self.context
    }

    fn invoke(&mut self, event: SmEvent<E>) -> bool {
        let Some(handler) = self.handlers.get(self.state.index()).copied() else {
            log::error!("{}: no handler for {:?}", self.name, self.state);
            return false;
        };
        handler(self, event)
    }
}
