//! Entry-map indirection for role-dependent tables.
//!
//! An entry map is a `[role][event][state]` matrix of raw selectors:
//!
//! * [`IGNORE`] (0) drops the event;
//! * `n` (1..=0x7F) selects row `n - 1` of the table for `(state, role)`;
//! * `n | ALL_TABLE` selects row `n - 1` of the shared all-states table.
//!
//! Cross-cutting events (link loss, pairing failure) are thereby written
//! once, in the all-states table, and reach it from any state whose entry
//! carries the flag.

use core::fmt;
use core::marker::PhantomData;

use crate::id::{EventId, StateId};
use crate::table::{check_len, Lookup, TableError, Transition};

pub const IGNORE: u8 = 0;
pub const ALL_TABLE: u8 = 0x80;

/// Decoded entry-map value. Row indexes are 0-based.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Ignore,
    State(usize),
    All(usize),
}

impl Selector {
    /// `None` for the malformed value `ALL_TABLE` with ordinal 0.
    pub const fn decode(raw: u8) -> Option<Self> {
        if raw == IGNORE {
            return Some(Selector::Ignore);
        }
        let ordinal = (raw & !ALL_TABLE) as usize;
        if ordinal == 0 {
            None
        } else if raw & ALL_TABLE != 0 {
            Some(Selector::All(ordinal - 1))
        } else {
            Some(Selector::State(ordinal - 1))
        }
    }
}

/// Entry map plus per-state, per-role tables and one all-states table.
pub struct MappedTable<S: 'static, E, A: 'static> {
    entry: &'static [&'static [&'static [u8]]],
    states: &'static [&'static [&'static [Transition<A, S>]]],
    all: &'static [Transition<A, S>],
    _event: PhantomData<fn() -> E>,
}

impl<S: 'static, E, A: 'static> MappedTable<S, E, A> {
    /// `entry` is indexed `[role][event][state]`, `states` `[state][role]`.
    pub const fn new(
        entry: &'static [&'static [&'static [u8]]],
        states: &'static [&'static [&'static [Transition<A, S>]]],
        all: &'static [Transition<A, S>],
    ) -> Self {
        Self {
            entry,
            states,
            all,
            _event: PhantomData,
        }
    }

    pub fn roles(&self) -> usize {
        self.entry.len()
    }
}

impl<S: StateId, E: EventId, A: 'static> MappedTable<S, E, A> {
    pub fn selector(&self, role: usize, state: S, event: E) -> Option<Selector> {
        let raw = *self
            .entry
            .get(role)?
            .get(event.index())?
            .get(state.index())?;
        Selector::decode(raw)
    }
}

impl<S, E, A> Lookup for MappedTable<S, E, A>
where
    S: StateId,
    E: EventId,
    A: Copy + fmt::Debug + 'static,
{
    type State = S;
    type Event = E;
    type Action = A;

    fn lookup(&self, role: usize, state: S, event: E) -> Option<&Transition<A, S>> {
        let cell = match self.selector(role, state, event) {
            Some(Selector::Ignore) => return None,
            Some(Selector::State(row)) => self
                .states
                .get(state.index())
                .and_then(|roles| roles.get(role))
                .and_then(|rows| rows.get(row)),
            Some(Selector::All(row)) => self.all.get(row),
            None => None,
        };
        if cell.is_none() {
            log::error!(
                "role {} has no entry for {:?} in {:?}",
                role,
                event,
                state
            );
        }
        cell
    }

    fn validate(&self) -> Result<(), TableError> {
        if self.entry.is_empty() {
            return Err(TableError::Shape {
                what: "roles",
                expected: 1,
                found: 0,
            });
        }
        check_len("states", S::COUNT, self.states.len())?;
        for roles in self.states {
            check_len("roles per state", self.entry.len(), roles.len())?;
        }

        for (role, events) in self.entry.iter().enumerate() {
            check_len("events", E::COUNT, events.len())?;
            for (event, row) in events.iter().enumerate() {
                check_len("entry columns", S::COUNT, row.len())?;
                for (state, &raw) in row.iter().enumerate() {
                    let in_range = match Selector::decode(raw) {
                        Some(Selector::Ignore) => true,
                        Some(Selector::State(index)) => index < self.states[state][role].len(),
                        Some(Selector::All(index)) => index < self.all.len(),
                        None => false,
                    };
                    if !in_range {
                        return Err(TableError::Selector {
                            role,
                            event,
                            state,
                            raw,
                        });
                    }
                }
            }
        }

        let cells = self
            .states
            .iter()
            .flat_map(|roles| roles.iter())
            .flat_map(|rows| rows.iter())
            .chain(self.all.iter());
        for cell in cells {
            let next = cell.next().index();
            if next >= S::COUNT {
                return Err(TableError::Shape {
                    what: "next state",
                    expected: S::COUNT,
                    found: next,
                });
            }
        }
        Ok(())
    }
}
