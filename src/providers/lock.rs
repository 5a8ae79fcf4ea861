//! Lock provider: cliff release over a deal.
//!
//! Layout: `[leftAmount, startTime]`. Nothing is withdrawable before
//! `startTime`; from then on the inner deal releases everything left.

use super::deal::{DealParams, Withdrawn};
use crate::error::LedgerError;
use crate::math::{Amount, Timestamp};
use crate::providers::ProviderClass;

/// Stored params of a lock pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockParams {
    /// Inner deal.
    pub deal: DealParams,
    /// Cliff.
    pub start: Timestamp,
}

pub(crate) fn to_timestamp(value: Amount) -> Result<Timestamp, LedgerError> {
    Timestamp::try_from(value).map_err(|_| LedgerError::ArithmeticOverflow)
}

impl LockParams {
    /// Stored params length.
    pub const LEN: usize = 2;

    /// Builds params from creation input `[amount, startTime]`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStartTime`] if `startTime < now`, plus
    /// the deal validation errors.
    pub fn create(input: &[Amount], now: Timestamp) -> Result<Self, LedgerError> {
        let params = Self::decode(input)?;
        DealParams::create(&params.deal.encode())?;
        if params.start < now {
            return Err(LedgerError::InvalidStartTime {
                start: params.start,
                now,
            });
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
            [left, start] => Ok(Self {
                deal: DealParams::decode(&[*left])?,
                start: to_timestamp(*start)?,
            }),
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Lock,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        let mut params = self.deal.encode();
        params.push(Amount::from(self.start));
        params
    }

    /// Zero before the cliff, the inner deal's amount after.
    #[must_use]
    pub const fn withdrawable(&self, now: Timestamp) -> Amount {
        if now < self.start {
            0
        } else {
            self.deal.withdrawable()
        }
    }

    /// Releases up to `requested`, gated by the cliff.
    pub fn withdraw(&mut self, now: Timestamp, requested: Amount) -> Withdrawn {
        let allowed = requested.min(self.withdrawable(now));
        self.deal.withdraw(allowed)
    }

    /// Splits the inner deal; both sides keep the same cliff.
    ///
    /// # Errors
    ///
    /// Propagates the deal split errors.
    pub fn split(&mut self, amount: Amount) -> Result<Self, LedgerError> {
        Ok(Self {
            deal: self.deal.split(amount)?,
            start: self.start,
        })
    }
}
