//! Command queuing discipline for one control block.
//!
//! A control block runs at most one command against the peer at a time: the
//! *in-flight* command. Commands arriving while one is in flight wait in a
//! bounded FIFO. Once that is full, new commands are refused and stay with
//! the caller, so backpressure reaches the source instead of memory growing.

use heapless::Deque;

/// What [`CommandQueue::admit`] did with a command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Became the in-flight command; the caller should start it now.
    Started,
    /// Parked behind the in-flight command.
    Queued,
    /// Refused; the command was left in the caller's slot.
    Full,
}

pub struct CommandQueue<D, const N: usize> {
    in_flight: Option<D>,
    pending: Deque<D, N>,
    limit: usize,
    full: bool,
}

impl<D, const N: usize> CommandQueue<D, N> {
    pub const fn new() -> Self {
        Self {
            in_flight: None,
            pending: Deque::new(),
            limit: N,
            full: false,
        }
    }

    /// Caps the pending FIFO below its compile-time capacity.
    pub fn with_limit(limit: usize) -> Self {
        let mut queue = Self::new();
        queue.limit = limit.min(N);
        queue
    }

    /// Takes the command out of `slot` unless the queue is saturated.
    ///
    /// An empty slot is treated as [`Admission::Full`]: there is nothing to
    /// admit and nothing was taken.
    pub fn admit(&mut self, slot: &mut Option<D>) -> Admission {
        if self.in_flight.is_none() {
            if let Some(command) = slot.take() {
                self.in_flight = Some(command);
                return Admission::Started;
            }
            return Admission::Full;
        }

        if self.pending.len() >= self.limit {
            self.full = true;
            return Admission::Full;
        }
        let Some(command) = slot.take() else {
            return Admission::Full;
        };
        match self.pending.push_back(command) {
            Ok(()) => Admission::Queued,
            Err(command) => {
                *slot = Some(command);
                self.full = true;
                Admission::Full
            }
        }
    }

    pub fn in_flight(&self) -> Option<&D> {
        self.in_flight.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Removes the in-flight command, typically on its completion.
    pub fn take_in_flight(&mut self) -> Option<D> {
        self.in_flight.take()
    }

    /// Pops the oldest waiting command.
    pub fn next_pending(&mut self) -> Option<D> {
        self.pending.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns whether a command was refused since the last call, and
    /// clears the mark.
    pub fn clear_full(&mut self) -> bool {
        core::mem::replace(&mut self.full, false)
    }

    /// Empties the queue, in-flight command first.
    pub fn drain(&mut self) -> impl Iterator<Item = D> + '_ {
        self.full = false;
        self.in_flight
            .take()
            .into_iter()
            .chain(core::iter::from_fn(move || self.pending.pop_front()))
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_empty()
    }
}

impl<D, const N: usize> Default for CommandQueue<D, N> {
    fn default() -> Self {
        Self::new()
    }
}
