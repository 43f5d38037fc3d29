//! Security Manager Protocol commands and their parameters.

use core::fmt;
use core::ops::{BitAnd, BitOr};

use btc::BdAddr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type Key128 = [u8; 16];
/// P-256 public key, X then Y.
pub type PublicKey = [u8; 64];
pub type DhKey = [u8; 32];

/// Smallest encryption key size either side may settle on.
pub const MIN_KEY_SIZE: u8 = 7;
pub const MAX_KEY_SIZE: u8 = 16;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoCap {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

/// AuthReq octet.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthReq(pub u8);

impl AuthReq {
    pub const BOND: u8 = 0b0000_0001;
    pub const MITM: u8 = 0b0000_0100;
    pub const SC: u8 = 0b0000_1000;

    pub fn bond(self) -> bool {
        self.0 & Self::BOND != 0
    }

    pub fn mitm(self) -> bool {
        self.0 & Self::MITM != 0
    }

    pub fn secure_connections(self) -> bool {
        self.0 & Self::SC != 0
    }
}

/// Key distribution flags.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyMask(pub u8);

impl KeyMask {
    pub const NONE: Self = Self(0);
    /// LTK with EDIV and Rand.
    pub const ENC: Self = Self(0b0001);
    /// IRK with the identity address.
    pub const ID: Self = Self(0b0010);
    pub const CSRK: Self = Self(0b0100);
    /// Link key derived from the LTK.
    pub const LINK: Self = Self(0b1000);
    pub const ALL: Self = Self(0b1111);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitAnd for KeyMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for KeyMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for KeyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMask({:#06b})", self.0)
    }
}

/// Body of Pairing Request and Pairing Response.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairParams {
    pub io_cap: IoCap,
    pub oob: bool,
    pub auth_req: AuthReq,
    pub max_key_size: u8,
    pub init_keys: KeyMask,
    pub resp_keys: KeyMask,
}

impl PairParams {
    pub fn is_valid(&self) -> bool {
        (MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&self.max_key_size)
    }
}

/// One distributed key; each maps to a single [`KeyMask`] bit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistKey {
    /// Encryption Information plus Central Identification.
    Enc { ltk: Key128, ediv: u16, rand: u64 },
    /// Identity Information plus Identity Address Information.
    Id { irk: Key128, addr: BdAddr },
    Csrk(Key128),
}

impl DistKey {
    pub fn mask(&self) -> KeyMask {
        match self {
            DistKey::Enc { .. } => KeyMask::ENC,
            DistKey::Id { .. } => KeyMask::ID,
            DistKey::Csrk(_) => KeyMask::CSRK,
        }
    }
}

/// Pairing failure reasons, including the local ones that never go on
/// the air.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Success,
    PasskeyEntryFailed,
    OobNotAvailable,
    AuthRequirements,
    ConfirmValueFailed,
    PairingNotSupported,
    EncKeySize,
    CommandNotSupported,
    Unspecified,
    RepeatedAttempts,
    InvalidParameters,
    DhKeyCheckFailed,
    NumericComparisonFailed,
    /// No response within the SMP timeout.
    RspTimeout,
    /// The link went down mid-procedure.
    ConnTimeout,
    EncFailed,
}

impl Reason {
    /// Code carried by Pairing Failed; `None` for local-only reasons.
    pub fn code(self) -> Option<u8> {
        let code = match self {
            Reason::PasskeyEntryFailed => 0x01,
            Reason::OobNotAvailable => 0x02,
            Reason::AuthRequirements => 0x03,
            Reason::ConfirmValueFailed => 0x04,
            Reason::PairingNotSupported => 0x05,
            Reason::EncKeySize => 0x06,
            Reason::CommandNotSupported => 0x07,
            Reason::Unspecified => 0x08,
            Reason::RepeatedAttempts => 0x09,
            Reason::InvalidParameters => 0x0a,
            Reason::DhKeyCheckFailed => 0x0b,
            Reason::NumericComparisonFailed => 0x0c,
            Reason::Success | Reason::RspTimeout | Reason::ConnTimeout | Reason::EncFailed => {
                return None
            }
        };
        Some(code)
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Reason::PasskeyEntryFailed,
            0x02 => Reason::OobNotAvailable,
            0x03 => Reason::AuthRequirements,
            0x04 => Reason::ConfirmValueFailed,
            0x05 => Reason::PairingNotSupported,
            0x06 => Reason::EncKeySize,
            0x07 => Reason::CommandNotSupported,
            0x09 => Reason::RepeatedAttempts,
            0x0a => Reason::InvalidParameters,
            0x0b => Reason::DhKeyCheckFailed,
            0x0c => Reason::NumericComparisonFailed,
            _ => Reason::Unspecified,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::Success => "success",
            Reason::PasskeyEntryFailed => "passkey entry failed",
            Reason::OobNotAvailable => "OOB data not available",
            Reason::AuthRequirements => "authentication requirements not met",
            Reason::ConfirmValueFailed => "confirm value does not match",
            Reason::PairingNotSupported => "pairing not supported",
            Reason::EncKeySize => "encryption key size too small",
            Reason::CommandNotSupported => "command not supported",
            Reason::Unspecified => "unspecified reason",
            Reason::RepeatedAttempts => "repeated attempts",
            Reason::InvalidParameters => "invalid parameters",
            Reason::DhKeyCheckFailed => "DHKey check failed",
            Reason::NumericComparisonFailed => "numeric comparison failed",
            Reason::RspTimeout => "response timeout",
            Reason::ConnTimeout => "connection lost",
            Reason::EncFailed => "encryption failed",
        };
        f.write_str(text)
    }
}

/// SMP command as exchanged with the peer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    PairingReq(PairParams),
    PairingRsp(PairParams),
    Confirm(Key128),
    Random(Key128),
    PairingFailed(Reason),
    KeyInfo(DistKey),
    SecurityReq(AuthReq),
    #[cfg_attr(feature = "serde", serde(with = "public_key"))]
    PublicKey(PublicKey),
    DhKeyCheck(Key128),
}

#[cfg(feature = "serde")]
mod public_key {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::PublicKey;

    pub fn serialize<S: Serializer>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error> {
        key.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PublicKey, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 64 bytes"))
    }
}
