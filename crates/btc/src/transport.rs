//! Producer side of the context switch.
//!
//! `submit` copies the caller's arguments into an owned [`Message`] and
//! queues it for the dispatch context. Once it returns the caller may reuse
//! or destroy its arguments: the queued copy references nothing of theirs.
//! A submission either queues the whole message or nothing at all.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;

use bsm::{Error, Result};

use crate::config::TransportConfig;
use crate::msg::{Envelope, Message};
use crate::sync::{Mutex, Wakeup};

pub(crate) struct Shared {
    name: &'static str,
    queue: Mutex<VecDeque<Message>>,
    capacity: usize,
    enabled: AtomicBool,
    wakeup: Wakeup,
}

impl Shared {
    pub(crate) fn new(config: &TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            name: config.name,
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
            capacity: config.queue_capacity,
            enabled: AtomicBool::new(true),
            wakeup: Wakeup::new(),
        })
    }

    pub(crate) fn pop(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Stops admission. Messages already queued stay queued.
    pub(crate) fn disable(&self) {
        {
            let _queue = self.queue.lock();
            self.enabled.store(false, Ordering::Release);
        }
        self.wakeup.notify();
    }

    pub(crate) fn wait(&self, timeout: Duration) {
        self.wakeup.wait(timeout);
    }

    fn enqueue(&self, message: Message) -> Result<()> {
        let mut queue = self.queue.lock();
        if !self.enabled.load(Ordering::Acquire) {
            log::warn!("{}: {:?} rejected, transport shut down", self.name, message.envelope());
            return Err(Error::InvalidState);
        }
        if queue.len() >= self.capacity {
            log::warn!("{}: {:?} rejected, queue full", self.name, message.envelope());
            return Err(Error::Fail);
        }
        queue.push_back(message);
        drop(queue);

        self.wakeup.notify();
        Ok(())
    }
}

/// Cloneable handle for posting into one dispatcher from any thread.
#[derive(Clone)]
pub struct Sender {
    shared: Arc<Shared>,
}

impl Sender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Deep-copies `args` with `Clone` and queues the copy.
    pub fn submit<A>(&self, envelope: Envelope, args: &A) -> Result<()>
    where
        A: Clone + Send + 'static,
    {
        self.post(envelope, args.clone())
    }

    /// Queues a copy produced by `copy`. A copy that cannot be made
    /// (`None`) fails the call with `NoMem` and queues nothing.
    pub fn submit_with<A, F>(&self, envelope: Envelope, args: &A, copy: F) -> Result<()>
    where
        A: Send + 'static,
        F: FnOnce(&A) -> Option<A>,
    {
        let Some(args) = copy(args) else {
            log::warn!("{}: {:?} rejected, copy failed", self.shared.name, envelope);
            return Err(Error::NoMem);
        };
        self.post(envelope, args)
    }

    /// Queues arguments the caller already owns.
    pub fn post<A>(&self, envelope: Envelope, args: A) -> Result<()>
    where
        A: Send + 'static,
    {
        self.shared
            .enqueue(Message::new(envelope, Some(Box::new(args))))
    }

    /// Queues an envelope without arguments.
    pub fn signal(&self, envelope: Envelope) -> Result<()> {
        self.shared.enqueue(Message::new(envelope, None))
    }

    /// Re-queues a message taken from another queue, arguments untouched.
    pub fn forward(&self, message: Message) -> Result<()> {
        self.shared.enqueue(message)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }
}
