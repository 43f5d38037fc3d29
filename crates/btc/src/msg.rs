//! Messages crossing the context switch.

use core::any::Any;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Message kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sig {
    /// Request from the application API.
    ApiCall,
    /// Completion or indication from a lower layer.
    ApiCallback,
}

/// Target subsystem of a message.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileId(pub u8);

impl ProfileId {
    pub const MAIN_INIT: Self = Self(0);
    pub const DEV: Self = Self(1);
    pub const GATTS: Self = Self(2);
    pub const GATTC: Self = Self(3);
    pub const GAP_BLE: Self = Self(5);
    pub const DM_SEC: Self = Self(9);
    pub const ALARM: Self = Self(10);
    pub const GAP_BT: Self = Self(11);
    pub const A2DP: Self = Self(13);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }
}

/// Uniform header: what kind of message, for whom, which action.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Envelope {
    pub sig: Sig,
    pub pid: ProfileId,
    pub act: u16,
}

impl Envelope {
    pub const fn call(pid: ProfileId, act: u16) -> Self {
        Self {
            sig: Sig::ApiCall,
            pid,
            act,
        }
    }

    pub const fn callback(pid: ProfileId, act: u16) -> Self {
        Self {
            sig: Sig::ApiCallback,
            pid,
            act,
        }
    }
}

/// Owned, self-contained argument block. Dropping it releases everything it
/// references.
pub type Payload = Box<dyn Any + Send>;

/// Envelope plus its arguments, owned by whoever holds the message.
pub struct Message {
    envelope: Envelope,
    args: Option<Payload>,
}

impl Message {
    pub fn new(envelope: Envelope, args: Option<Payload>) -> Self {
        Self { envelope, args }
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    pub fn has_args(&self) -> bool {
        self.args.is_some()
    }

    pub fn args<A: 'static>(&self) -> Option<&A> {
        self.args.as_ref()?.downcast_ref()
    }

    /// Moves the arguments out as `A`. A payload of another type is logged
    /// and released.
    pub fn into_args<A: 'static>(self) -> Option<A> {
        let args = self.args?;
        match args.downcast::<A>() {
            Ok(args) => Some(*args),
            Err(_) => {
                log::error!(
                    "{:?}: payload is not {}",
                    self.envelope,
                    core::any::type_name::<A>()
                );
                None
            }
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("envelope", &self.envelope)
            .field("args", &self.args.is_some())
            .finish()
    }
}

/// Bluetooth device address, most significant byte first.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const ANY: Self = Self([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
