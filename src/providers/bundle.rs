//! Bundle provider: one parent pool over contiguous child schedules.
//!
//! Children are minted right after the parent, so they occupy ids
//! `parent + 1 ..= lastChildId`. Children are owned by the bundle
//! provider's address; the parent's owner receives every release.
//! Resolved view: `[cumulativeRemaining, lastChildId]`.

use super::{ProviderClass, pool_id_param};
use crate::domain::PoolId;
use crate::error::LedgerError;
use crate::math::Amount;

/// Minimum number of children.
pub const MIN_CHILDREN: usize = 2;

/// Stored params of a bundle parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleParams {
    /// Highest child id.
    pub last_child: PoolId,
}

impl BundleParams {
    /// Stored params length.
    pub const LEN: usize = 1;

    /// Decodes stored params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch.
    pub fn decode(params: &[Amount]) -> Result<Self, LedgerError> {
        match params {
            [last] => Ok(Self {
                last_child: pool_id_param(*last)?,
            }),
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Bundle,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        vec![self.last_child.into()]
    }

    /// Ids of every child of `parent`, live or burned.
    pub fn children(&self, parent: PoolId) -> impl Iterator<Item = PoolId> {
        (parent.get() + 1..=self.last_child.get()).map(PoolId::new)
    }
}

/// Checks the shape of a bundle request before anything is minted.
///
/// # Errors
///
/// Returns [`LedgerError::ProvidersParamsLengthMismatch`] when the slices
/// differ and [`LedgerError::InvalidAddressesLength`] for fewer than
/// [`MIN_CHILDREN`] entries.
pub fn validate_entries(providers: usize, params: usize) -> Result<(), LedgerError> {
    if providers != params {
        return Err(LedgerError::ProvidersParamsLengthMismatch { providers, params });
    }
    if providers < MIN_CHILDREN {
        return Err(LedgerError::InvalidAddressesLength(providers));
    }
    Ok(())
}
