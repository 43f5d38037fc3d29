use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::dispatcher::{Disposition, Profile};
use crate::msg::{Envelope, Message};


/// Records every delivered envelope with its `Vec<u8>` arguments.
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<(Envelope, Option<Vec<u8>>)>>>,
}

impl Recorder {
    fn seen(&self) -> Vec<(Envelope, Option<Vec<u8>>)> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&mut self, msg: Message) -> Disposition {
        let envelope = msg.envelope();
        let args = msg.into_args::<Vec<u8>>();
        self.seen.lock().unwrap().push((envelope, args));
        Disposition::Released
    }
}

impl Profile for Recorder {
    fn call(&mut self, msg: Message) -> Disposition {
        self.record(msg)
    }

    fn callback(&mut self, msg: Message) -> Disposition {
        self.record(msg)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
