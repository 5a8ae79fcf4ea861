//! Deal provider: instant release, the root of every delegation chain.
//!
//! Layout: `[leftAmount]`. Everything left is withdrawable at once.

use crate::error::LedgerError;
use crate::math::{self, Amount};
use crate::providers::ProviderClass;

/// Amount released by one schedule step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawn {
    /// Amount released.
    pub released: Amount,
    /// Whether nothing is left.
    pub is_final: bool,
}

/// Stored params of a deal pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealParams {
    /// Committed amount not yet released.
    pub left: Amount,
}

impl DealParams {
    /// Stored params length.
    pub const LEN: usize = 1;

    /// Builds params from creation input `[amount]`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] for a zero amount and
    /// [`LedgerError::InvalidParamsLength`] for a malformed input.
    pub fn create(input: &[Amount]) -> Result<Self, LedgerError> {
        let params = Self::decode(input)?;
        if params.left == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        Ok(params)
    }

    /// Decodes stored params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch.
    pub fn decode(params: &[Amount]) -> Result<Self, LedgerError> {
        match params {
            [left] => Ok(Self { left: *left }),
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Deal,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        vec![self.left]
    }

    /// Everything left is withdrawable.
    #[must_use]
    pub const fn withdrawable(&self) -> Amount {
        self.left
    }

    /// Releases `min(requested, left)`.
    pub fn withdraw(&mut self, requested: Amount) -> Withdrawn {
        let released = requested.min(self.left);
        self.left -= released;
        Withdrawn {
            released,
            is_final: self.left == 0,
        }
    }

    /// Moves `amount` into a new deal, keeping `old + new == before`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SplitExceeded`] if `amount > left` and
    /// [`LedgerError::InvalidSplit`] if `amount` is zero or equals `left`.
    pub fn split(&mut self, amount: Amount) -> Result<Self, LedgerError> {
        if amount > self.left {
            return Err(LedgerError::SplitExceeded {
                requested: amount,
                available: self.left,
            });
        }
        if amount == 0 || amount == self.left {
            return Err(LedgerError::InvalidSplit {
                requested: amount,
                available: self.left,
            });
        }
        self.left = math::sub(self.left, amount)?;
        Ok(Self { left: amount })
    }

    /// Removes `fee` from the principal.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidSplit`] if nothing would remain.
    pub fn skim(&mut self, fee: Amount) -> Result<(), LedgerError> {
        if fee >= self.left {
            return Err(LedgerError::InvalidSplit {
                requested: fee,
                available: self.left,
            });
        }
        self.left -= fee;
        Ok(())
    }
}
