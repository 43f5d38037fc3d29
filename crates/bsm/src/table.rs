//! Table-driven state machine engine.
//!
//! A procedure is described by data: for each `(state, event)` a
//! [`Transition`] lists the actions to run, in order, and the next state.
//! [`StateMachine::execute`] is the single dispatch path used by every
//! table-driven profile.
//!
//! Two contracts matter to table and action authors:
//!
//! * The next state is written to the control block **before** the first
//!   action runs. An action that re-enters the engine for the same control
//!   block observes the post-transition state.
//! * Event data is handed to actions as `&mut Option<D>`. An action that
//!   keeps the data (for example to wait for a completion) takes it out of
//!   the option; the engine then reports the data as retained and the caller
//!   has nothing left to release.

use core::fmt;
use core::marker::PhantomData;

use crate::id::{EventId, StateId};

/// One table cell: ordered actions followed by the next state.
///
/// An empty action list is the IGNORE cell; it must keep the current state.
#[derive(Debug, Clone, Copy)]
pub struct Transition<A: 'static, S> {
    actions: &'static [A],
    next: S,
}

impl<A: 'static, S: Copy> Transition<A, S> {
    pub const fn new(actions: &'static [A], next: S) -> Self {
        Self { actions, next }
    }

    pub fn actions(&self) -> &'static [A] {
        self.actions
    }

    pub fn next(&self) -> S {
        self.next
    }

    pub fn is_ignore(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Malformed table detected by [`Lookup::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("{what}: expected {expected} entries, found {found}")]
    Shape {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("role {role} event {event} state {state}: selector {raw:#04x} out of range")]
    Selector {
        role: usize,
        event: usize,
        state: usize,
        raw: u8,
    },
    #[error("state {state} event {event}: IGNORE cell moves to state {next}")]
    IgnoreMoves {
        state: usize,
        event: usize,
        next: usize,
    },
}

/// Resolves the transition for an event delivered in a state.
pub trait Lookup {
    type State: StateId;
    type Event: EventId;
    type Action: Copy + fmt::Debug + 'static;

    /// `None` means the event is dropped: IGNORE selector or, for a
    /// malformed table, an out-of-range index (logged).
    fn lookup(
        &self,
        role: usize,
        state: Self::State,
        event: Self::Event,
    ) -> Option<&Transition<Self::Action, Self::State>>;

    /// Checks every dimension and index of the table.
    fn validate(&self) -> Result<(), TableError>;
}

/// Per-instance record driven by a [`StateMachine`].
pub trait ControlBlock {
    type State: StateId;
    type Event: EventId;
    type Action: Copy + fmt::Debug + 'static;
    type Data;
    /// Profile environment the actions need (lower layer, callbacks, ...).
    type Context: ?Sized;

    fn state(&self) -> Self::State;

    /// Only the engine calls this.
    fn set_state(&mut self, next: Self::State);

    /// Selects the role-specific table, 0 when the machine has one role.
    fn role(&self) -> usize {
        0
    }

    fn perform(
        &mut self,
        ctx: &mut Self::Context,
        action: Self::Action,
        data: &mut Option<Self::Data>,
    );
}

/// Result of one [`StateMachine::execute`] call.
#[derive(Debug)]
pub struct Outcome<D> {
    handled: bool,
    retained: bool,
    data: Option<D>,
}

impl<D> Outcome<D> {
    fn dropped(data: Option<D>) -> Self {
        Self {
            handled: false,
            retained: false,
            data,
        }
    }

    /// At least one action ran.
    pub fn handled(&self) -> bool {
        self.handled
    }

    /// An action took ownership of the event data.
    pub fn retained(&self) -> bool {
        self.retained
    }

    /// Data nobody claimed; dropping it releases the buffer.
    pub fn into_data(self) -> Option<D> {
        self.data
    }
}

/// `[state][event]` table, one role.
pub struct DirectTable<S: 'static, E, A: 'static> {
    rows: &'static [&'static [Transition<A, S>]],
    _event: PhantomData<fn() -> E>,
}

impl<S: 'static, E, A: 'static> DirectTable<S, E, A> {
    pub const fn new(rows: &'static [&'static [Transition<A, S>]]) -> Self {
        Self {
            rows,
            _event: PhantomData,
        }
    }
}

impl<S, E, A> Lookup for DirectTable<S, E, A>
where
    S: StateId,
    E: EventId,
    A: Copy + fmt::Debug + 'static,
{
    type State = S;
    type Event = E;
    type Action = A;

    fn lookup(&self, _role: usize, state: S, event: E) -> Option<&Transition<A, S>> {
        let cell = self
            .rows
            .get(state.index())
            .and_then(|row| row.get(event.index()));
        if cell.is_none() {
            log::error!("no table row for {:?} in {:?}", event, state);
        }
        cell
    }

    fn validate(&self) -> Result<(), TableError> {
        check_len("states", S::COUNT, self.rows.len())?;
        for (state, row) in self.rows.iter().enumerate() {
            check_len("events", E::COUNT, row.len())?;
            for (event, cell) in row.iter().enumerate() {
                let next = cell.next().index();
                if next >= S::COUNT {
                    return Err(TableError::Shape {
                        what: "next state",
                        expected: S::COUNT,
                        found: next,
                    });
                }
                if cell.is_ignore() && next != state {
                    return Err(TableError::IgnoreMoves { state, event, next });
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), TableError> {
    if expected == found {
        Ok(())
    } else {
        Err(TableError::Shape {
            what,
            expected,
            found,
        })
    }
}

/// A named engine bound to one table.
pub struct StateMachine<L> {
    name: &'static str,
    table: L,
}

impl<L: Lookup> StateMachine<L> {
    pub const fn new(name: &'static str, table: L) -> Self {
        Self { name, table }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> &L {
        &self.table
    }

    pub fn validate(&self) -> Result<(), TableError> {
        self.table.validate()
    }

    /// Delivers `event` to `cb`.
    ///
    /// Sets the next state, then runs the cell's actions in order. Events
    /// without a cell are dropped without touching the control block and
    /// their data is handed back in the [`Outcome`].
    pub fn execute<C>(
        &self,
        cb: &mut C,
        ctx: &mut C::Context,
        event: L::Event,
        data: Option<C::Data>,
    ) -> Outcome<C::Data>
    where
        C: ControlBlock<State = L::State, Event = L::Event, Action = L::Action>,
    {
        let state = cb.state();
        let Some(transition) = self.table.lookup(cb.role(), state, event) else {
            log::debug!("{}: {:?} ignored in {:?}", self.name, event, state);
            return Outcome::dropped(data);
        };

        let next = transition.next();
        log::trace!(
            "{}: {:?} + {:?} -> {:?} {:?}",
            self.name,
            state,
            event,
            next,
            transition.actions()
        );
        cb.set_state(next);

        let offered = data.is_some();
        let mut data = data;
        for &action in transition.actions() {
            cb.perform(ctx, action, &mut data);
        }

        Outcome {
            handled: !transition.is_ignore(),
            retained: offered && data.is_none(),
            data,
        }
    }
}
