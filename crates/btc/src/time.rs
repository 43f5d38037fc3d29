//! Time events.
//!
//! A [`TimeEvent`] is a one-shot or periodic countdown that, on expiry,
//! posts its envelope through the transport like any other message.
//! The [`TimerWheel`] only holds weak references: a time event whose owner
//! dropped it is pruned on the next tick and never fires.

use std::sync::{Arc, Weak};

use bsm::Result;

use crate::msg::{Envelope, Message, Payload};
use crate::sync::Mutex;
use crate::transport::Sender;

type ArgsFactory = Box<dyn Fn() -> Payload + Send>;

struct TimeEventInner {
    envelope: Envelope,
    args: Option<ArgsFactory>,
    remaining: u64,
    interval: Option<u64>,
    armed: bool,
}

pub struct TimeEvent {
    inner: Mutex<TimeEventInner>,
}

impl TimeEvent {
    /// A time event that posts `envelope` with no arguments.
    pub fn new(envelope: Envelope) -> Arc<Self> {
        Self::build(envelope, None)
    }

    /// A time event that posts a fresh clone of `args` on every expiry.
    pub fn with_args<A>(envelope: Envelope, args: A) -> Arc<Self>
    where
        A: Clone + Send + 'static,
    {
        Self::build(
            envelope,
            Some(Box::new(move || Box::new(args.clone()) as Payload)),
        )
    }

    fn build(envelope: Envelope, args: Option<ArgsFactory>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TimeEventInner {
                envelope,
                args,
                remaining: 0,
                interval: None,
                armed: false,
            }),
        })
    }

    /// Starts (or restarts) the countdown. `interval` makes it periodic.
    pub fn arm(&self, timeout_ticks: u64, interval_ticks: Option<u64>) {
        let mut inner = self.inner.lock();
        inner.remaining = timeout_ticks.max(1);
        inner.interval = interval_ticks.filter(|&ticks| ticks > 0);
        inner.armed = true;
        log::trace!("{:?} armed for {} ticks", inner.envelope, inner.remaining);
    }

    /// Returns whether the event was armed.
    pub fn disarm(&self) -> bool {
        let mut inner = self.inner.lock();
        let was_armed = inner.armed;
        inner.armed = false;
        inner.remaining = 0;
        was_armed
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Advances one tick and returns the message to post on expiry.
    pub fn poll(&self) -> Option<Message> {
        let mut inner = self.inner.lock();
        if !inner.armed {
            return None;
        }

        inner.remaining = inner.remaining.saturating_sub(1);
        if inner.remaining > 0 {
            return None;
        }

        match inner.interval {
            Some(period) => inner.remaining = period,
            None => inner.armed = false,
        }
        let args = inner.args.as_ref().map(|make| make());
        Some(Message::new(inner.envelope, args))
    }
}

struct WheelInner {
    sender: Sender,
    events: Vec<Weak<TimeEvent>>,
}

/// Tick source shared by every profile that owns time events.
#[derive(Clone)]
pub struct TimerWheel {
    inner: Arc<Mutex<WheelInner>>,
}

impl TimerWheel {
    pub fn new(sender: Sender) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WheelInner {
                sender,
                events: Vec::new(),
            })),
        }
    }

    pub fn register(&self, event: &Arc<TimeEvent>) {
        self.inner.lock().events.push(Arc::downgrade(event));
    }

    /// Number of live time events.
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advances every live time event by one tick and posts the expired
    /// ones. Returns the first transport error; later expiries are still
    /// posted.
    pub fn tick(&self) -> Result<()> {
        let (sender, fired) = {
            let mut inner = self.inner.lock();
            let mut fired = Vec::new();
            inner.events.retain(|weak| match weak.upgrade() {
                Some(event) => {
                    fired.extend(event.poll());
                    true
                }
                None => false,
            });
            (inner.sender.clone(), fired)
        };

        let mut result = Ok(());
        for message in fired {
            let envelope = message.envelope();
            if let Err(err) = sender.forward(message) {
                log::warn!("time event {:?} lost: {}", envelope, err);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}
