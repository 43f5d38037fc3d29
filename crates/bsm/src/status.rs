//! Outcome vocabulary.
//!
//! Every action, engine and transport operation reports one of the
//! [`Status`] values. Fallible APIs return [`Result`] whose error side is the
//! non-success subset in [`Error`].

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a stack operation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Fail,
    /// The current state has no handling for the event.
    Unhandled,
    /// Accepted; the result is reported later by a completion event.
    CmdStarted,
    NoMem,
    /// The target is not in a state that can take the request
    /// (stack disabled, control block torn down, wrong procedure phase).
    InvalidState,
}

impl Status {
    /// `Success` and `CmdStarted` both mean the request was admitted.
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Success | Status::CmdStarted)
    }

    pub fn from_result<T>(result: Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => err.into(),
        }
    }

    /// Converts to a `Result`, keeping the admitted status on the `Ok` side.
    pub fn into_result(self) -> Result<Status> {
        match self {
            Status::Success | Status::CmdStarted => Ok(self),
            Status::Fail => Err(Error::Fail),
            Status::Unhandled => Err(Error::Unhandled),
            Status::NoMem => Err(Error::NoMem),
            Status::InvalidState => Err(Error::InvalidState),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Success => "SUCCESS",
            Status::Fail => "FAIL",
            Status::Unhandled => "UNHANDLED",
            Status::CmdStarted => "CMD_STARTED",
            Status::NoMem => "NOMEM",
            Status::InvalidState => "INVALID_STATE",
        };
        f.write_str(text)
    }
}

/// Non-success outcomes, for `?` propagation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    #[error("operation failed")]
    Fail,
    #[error("event not handled in the current state")]
    Unhandled,
    #[error("out of memory")]
    NoMem,
    #[error("invalid state")]
    InvalidState,
}

impl From<Error> for Status {
    fn from(value: Error) -> Self {
        match value {
            Error::Fail => Status::Fail,
            Error::Unhandled => Status::Unhandled,
            Error::NoMem => Status::NoMem,
            Error::InvalidState => Status::InvalidState,
        }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
