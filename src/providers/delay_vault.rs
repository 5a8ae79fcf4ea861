//! Delay vault: tiered deposits settled into a schedule on demand.
//!
//! Each deposit maps the depositor's cumulative total to a tier of an
//! ascending threshold table. Transferring the pool to the delay vault
//! provider settles it into the tier's schedule, starting and finishing
//! after the tier's delays.

use super::{DelayTier, ProviderClass};
use crate::error::LedgerError;
use crate::math::Amount;

/// Stored params of a delay-vault pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayParams {
    /// Deposited amount.
    pub amount: Amount,
    /// Current tier index.
    pub tier: usize,
}

impl DelayParams {
    /// Stored params length.
    pub const LEN: usize = 2;

    /// Decodes stored params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch.
    pub fn decode(params: &[Amount]) -> Result<Self, LedgerError> {
        match params {
            [amount, tier] => Ok(Self {
                amount: *amount,
                tier: usize::try_from(*tier).map_err(|_| LedgerError::ArithmeticOverflow)?,
            }),
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::DelayVault,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        vec![self.amount, Amount::try_from(self.tier).unwrap_or(Amount::MAX)]
    }

    /// Moves the pool to `new_tier`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTier`] unless
    /// `current < new_tier < count`.
    pub fn upgrade(&mut self, new_tier: usize, count: usize) -> Result<(), LedgerError> {
        if new_tier <= self.tier || new_tier >= count {
            return Err(LedgerError::InvalidTier {
                requested: new_tier,
                current: self.tier,
                count,
            });
        }
        self.tier = new_tier;
        Ok(())
    }
}

/// Index of the first tier whose limit covers `amount`, or the last tier
/// when `amount` exceeds every limit.
#[must_use]
pub fn the_type_of(tiers: &[DelayTier], amount: Amount) -> usize {
    tiers
        .iter()
        .position(|tier| amount <= tier.limit)
        .unwrap_or_else(|| tiers.len().saturating_sub(1))
}

/// Checks a tier table: non-empty, strictly ascending limits, and a
/// finish delay after the start delay for timed tiers.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidTierTable`] otherwise.
pub fn validate_tiers(tiers: &[DelayTier], classes: &[ProviderClass]) -> Result<(), LedgerError> {
    if tiers.is_empty() || tiers.len() != classes.len() {
        return Err(LedgerError::InvalidTierTable);
    }
    let ascending = tiers.windows(2).all(|pair| match pair {
        [lower, upper] => lower.limit < upper.limit,
        _ => true,
    });
    let timed_ok = tiers
        .iter()
        .zip(classes)
        .all(|(tier, class)| *class != ProviderClass::Timed || tier.finish_delay > tier.start_delay);
    if ascending && timed_ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidTierTable)
    }
}
