//! Dense state and event identifiers.
//!
//! Tables are indexed by small integers starting at 0. Profiles define their
//! states and events as fieldless enums through [`define_ids!`], which keeps
//! the numbering dense and makes an out-of-range identifier unrepresentable
//! once a raw code has been decoded.

use core::fmt;

/// Events travelling through the transport carry the owning engine in the
/// high byte of the code; only the low byte indexes the table.
pub const EVENT_MASK: u16 = 0x00FF;

/// Identifier of a state, `0..COUNT`.
pub trait StateId: Copy + Eq + fmt::Debug + 'static {
    const COUNT: usize;

    fn index(self) -> usize;

    fn from_index(index: usize) -> Option<Self>;
}

/// Identifier of an event, `0..COUNT`.
pub trait EventId: Copy + Eq + fmt::Debug + 'static {
    const COUNT: usize;

    fn index(self) -> usize;

    fn from_index(index: usize) -> Option<Self>;

    /// Masks a namespaced event code into table range and decodes it.
    fn from_raw(raw: u16) -> Option<Self> {
        Self::from_index(usize::from(raw & EVENT_MASK))
    }

    /// Builds the namespaced code for `namespace` (usually a profile id).
    fn to_raw(self, namespace: u8) -> u16 {
        (u16::from(namespace) << 8) | (self.index() as u16 & EVENT_MASK)
    }
}

/// Defines a dense fieldless enum and implements [`StateId`] or [`EventId`]
/// for it.
///
/// The macro derives `Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd,
/// Ord`; do not derive those again.
///
/// ```
/// bsm::define_ids! {
///     pub enum LinkState: StateId { Idle, Up }
/// }
/// use bsm::StateId;
/// assert_eq!(LinkState::COUNT, 2);
/// assert_eq!(LinkState::from_index(1), Some(LinkState::Up));
/// ```
#[macro_export]
macro_rules! define_ids {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every identifier in index order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::$kind for $name {
            const COUNT: usize = $name::ALL.len();

            #[inline]
            fn index(self) -> usize {
                self as usize
            }

            #[inline]
            fn from_index(index: usize) -> Option<Self> {
                $name::ALL.get(index).copied()
            }
        }
    };
}
