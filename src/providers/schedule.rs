//! Base-family schedules behind one enum.
//!
//! Deal, Lock and Timed pools (and the fee decorators that wrap them)
//! share one behavior surface; [`Schedule`] dispatches to the typed
//! params of each shape.

use super::ProviderClass;
use super::deal::{DealParams, Withdrawn};
use super::lock::LockParams;
use super::timed::TimedParams;
use crate::error::LedgerError;
use crate::math::{Amount, Timestamp};

/// A decoded base-family schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Instant release.
    Deal(DealParams),
    /// Cliff release.
    Lock(LockParams),
    /// Linear vesting.
    Timed(TimedParams),
}

impl Schedule {
    /// Builds a schedule of `class` from creation input.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnsupportedOperation`] for non-schedule
    /// classes and the per-shape validation errors otherwise.
    pub fn create(
        class: ProviderClass,
        input: &[Amount],
        now: Timestamp,
    ) -> Result<Self, LedgerError> {
        match class {
            ProviderClass::Deal => DealParams::create(input).map(Self::Deal),
            ProviderClass::Lock => LockParams::create(input, now).map(Self::Lock),
            ProviderClass::Timed => TimedParams::create(input, now).map(Self::Timed),
            other => Err(LedgerError::UnsupportedOperation {
                provider: other,
                operation: "schedule",
            }),
        }
    }

    /// Decodes stored params of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnsupportedOperation`] for non-schedule
    /// classes and [`LedgerError::InvalidParamsLength`] on a mismatch.
    pub fn decode(class: ProviderClass, params: &[Amount]) -> Result<Self, LedgerError> {
        match class {
            ProviderClass::Deal => DealParams::decode(params).map(Self::Deal),
            ProviderClass::Lock => LockParams::decode(params).map(Self::Lock),
            ProviderClass::Timed => TimedParams::decode(params).map(Self::Timed),
            other => Err(LedgerError::UnsupportedOperation {
                provider: other,
                operation: "schedule",
            }),
        }
    }

    /// Stored params length of `class`.
    #[must_use]
    pub const fn len_of(class: ProviderClass) -> Option<usize> {
        match class {
            ProviderClass::Deal => Some(DealParams::LEN),
            ProviderClass::Lock => Some(LockParams::LEN),
            ProviderClass::Timed => Some(TimedParams::LEN),
            _ => None,
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        match self {
            Self::Deal(p) => p.encode(),
            Self::Lock(p) => p.encode(),
            Self::Timed(p) => p.encode(),
        }
    }

    /// Amount still committed.
    #[must_use]
    pub const fn left(&self) -> Amount {
        match self {
            Self::Deal(p) => p.left,
            Self::Lock(p) => p.deal.left,
            Self::Timed(p) => p.left(),
        }
    }

    /// Amount releasable at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] only for corrupt params.
    pub fn withdrawable(&self, now: Timestamp) -> Result<Amount, LedgerError> {
        match self {
            Self::Deal(p) => Ok(p.withdrawable()),
            Self::Lock(p) => Ok(p.withdrawable(now)),
            Self::Timed(p) => p.withdrawable(now),
        }
    }

    /// Releases up to `requested`.
    ///
    /// # Errors
    ///
    /// Same as [`withdrawable`](Self::withdrawable).
    pub fn withdraw(&mut self, now: Timestamp, requested: Amount) -> Result<Withdrawn, LedgerError> {
        match self {
            Self::Deal(p) => Ok(p.withdraw(requested)),
            Self::Lock(p) => Ok(p.withdraw(now, requested)),
            Self::Timed(p) => p.withdraw(now, requested),
        }
    }

    /// Splits `amount` into a new schedule of the same shape.
    ///
    /// # Errors
    ///
    /// Returns the deal split errors.
    pub fn split(&mut self, amount: Amount) -> Result<Self, LedgerError> {
        match self {
            Self::Deal(p) => p.split(amount).map(Self::Deal),
            Self::Lock(p) => p.split(amount).map(Self::Lock),
            Self::Timed(p) => p.split(amount).map(Self::Timed),
        }
    }

    /// Removes `fee` from the principal.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidSplit`] if nothing would remain.
    pub fn skim(&mut self, fee: Amount) -> Result<(), LedgerError> {
        match self {
            Self::Deal(p) => p.skim(fee),
            Self::Lock(p) => p.deal.skim(fee),
            Self::Timed(p) => p.skim(fee),
        }
    }

    /// Builds a fresh schedule of `class` for `amount`, starting at
    /// `now + start_delay` and finishing at `now + finish_delay`.
    ///
    /// # Errors
    ///
    /// Propagates the creation errors of the shape.
    pub fn delayed(
        class: ProviderClass,
        amount: Amount,
        now: Timestamp,
        start_delay: u64,
        finish_delay: u64,
    ) -> Result<Self, LedgerError> {
        let start = Amount::from(now.saturating_add(start_delay));
        let finish = Amount::from(now.saturating_add(finish_delay));
        match class {
            ProviderClass::Deal => Self::create(class, &[amount], now),
            ProviderClass::Lock => Self::create(class, &[amount, start], now),
            _ => Self::create(class, &[amount, start, finish], now),
        }
    }
}
