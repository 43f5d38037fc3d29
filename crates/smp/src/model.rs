//! Association model selection.

use crate::pdu::{IoCap, Key128, PairParams};

/// What the local user does during passkey entry.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Input,
    Display,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// Legacy pairing with a zero TK.
    JustWorks,
    /// Legacy pairing with a six digit passkey as TK.
    Passkey(Entry),
    /// LE Secure Connections, unauthenticated.
    ScJustWorks,
}

impl Model {
    pub fn is_secure_connections(self) -> bool {
        self == Model::ScJustWorks
    }

    pub fn is_authenticated(self) -> bool {
        matches!(self, Model::Passkey(_))
    }
}

/// Picks the model from both pairing parameter blocks. `local_is_master`
/// selects which side of a passkey exchange is ours.
///
/// Secure Connections is only used when neither side asks for MITM
/// protection; otherwise the legacy IO capability mapping applies, with
/// numeric comparison falling back to Just Works.
pub fn choose(master: &PairParams, slave: &PairParams, local_is_master: bool) -> Model {
    let mitm = master.auth_req.mitm() || slave.auth_req.mitm();
    if !mitm {
        if master.auth_req.secure_connections() && slave.auth_req.secure_connections() {
            return Model::ScJustWorks;
        }
        return Model::JustWorks;
    }

    let Some((on_master, on_slave)) = passkey_roles(master.io_cap, slave.io_cap) else {
        return Model::JustWorks;
    };
    Model::Passkey(if local_is_master { on_master } else { on_slave })
}

/// Passkey duties of (master, slave), or `None` when the IO capabilities
/// only allow Just Works.
fn passkey_roles(master: IoCap, slave: IoCap) -> Option<(Entry, Entry)> {
    use Entry::{Display, Input};
    use IoCap::*;

    match (master, slave) {
        (_, NoInputNoOutput) | (NoInputNoOutput, _) => None,
        (KeyboardOnly | KeyboardDisplay, DisplayOnly) => Some((Input, Display)),
        (KeyboardOnly, DisplayYesNo) => Some((Input, Display)),
        (KeyboardOnly, KeyboardOnly) => Some((Input, Input)),
        (_, KeyboardOnly) => Some((Display, Input)),
        (DisplayOnly, KeyboardDisplay) => Some((Display, Input)),
        (KeyboardDisplay, KeyboardDisplay) => Some((Input, Display)),
        _ => None,
    }
}

/// TK of a legacy passkey: the value little endian, zero padded.
pub fn passkey_tk(passkey: u32) -> Key128 {
    let mut tk = [0; 16];
    tk[..4].copy_from_slice(&passkey.to_le_bytes());
    tk
}

/// Six digit passkey drawn from random bytes.
pub fn passkey_from(random: &Key128) -> u32 {
    let raw = u32::from_le_bytes([random[0], random[1], random[2], random[3]]);
    raw % 1_000_000
}
