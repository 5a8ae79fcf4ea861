//! Account and asset addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A 20-byte account address (users, providers, the registry itself).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, never a valid owner or asset.
    pub const ZERO: Self = Self([0; 20]);

    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Builds an address whose low 8 bytes hold `value`.
    #[must_use]
    pub const fn from_low_u64(value: u64) -> Self {
        let [b0, b1, b2, b3, b4, b5, b6, b7] = value.to_be_bytes();
        Self([
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, b0, b1, b2, b3, b4, b5, b6, b7,
        ])
    }

    /// Deterministic address in a reserved namespace, used for
    /// ledger-owned actors such as the registry and installed providers.
    #[must_use]
    pub const fn system(namespace: u8, index: u64) -> Self {
        let mut addr = Self::from_low_u64(index);
        addr.0[0] = 0xff;
        addr.0[1] = namespace;
        addr
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns `true` for the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Rejects the zero address.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAddress`] if `self` is zero.
    pub fn non_zero(self) -> Result<Self, LedgerError> {
        if self.is_zero() {
            Err(LedgerError::ZeroAddress)
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Identifier of a fungible asset (the token contract address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Address);

impl AssetId {
    /// Wraps the asset contract address.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// Returns the asset contract address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.0
    }

    /// Rejects the zero asset.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAddress`] if the asset address is zero.
    pub fn non_zero(self) -> Result<Self, LedgerError> {
        self.0.non_zero().map(Self)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
