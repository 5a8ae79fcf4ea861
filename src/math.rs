//! Fixed-point helpers shared by every provider.
//!
//! All amounts are `u128`. Products go through [`mul_div`], which computes
//! `floor(a * b / c)` exactly and never overflows while `b <= c`.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Token amount in the asset's smallest unit.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Scale of a [`Ratio`]: `RATIO_SCALE` represents 100%.
pub const RATIO_SCALE: u128 = 1_000_000_000_000_000_000;

/// Scale of the refund exchange rate (`rateToWei`).
pub const RATE_SCALE: u128 = 1_000_000_000_000_000_000_000;

/// Basis points in one whole.
pub const BPS_SCALE: u128 = 10_000;

/// Computes `floor(a * b / c)`.
///
/// Splits `a` into quotient and remainder by `c`, so the intermediate
/// products stay in range whenever the result does and `b <= c`.
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] if `c` is zero or the
/// result does not fit.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Result<Amount, LedgerError> {
    if c == 0 {
        return Err(LedgerError::ArithmeticOverflow);
    }
    let quotient = a / c;
    let remainder = a % c;
    let whole = quotient
        .checked_mul(b)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let part = remainder
        .checked_mul(b)
        .ok_or(LedgerError::ArithmeticOverflow)?
        / c;
    whole.checked_add(part).ok_or(LedgerError::ArithmeticOverflow)
}

/// Checked addition returning a ledger error.
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] on overflow.
pub fn add(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_add(b).ok_or(LedgerError::ArithmeticOverflow)
}

/// Checked subtraction returning a ledger error.
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] on underflow.
pub fn sub(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_sub(b).ok_or(LedgerError::ArithmeticOverflow)
}

/// Fraction of a pool, scaled by [`RATIO_SCALE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ratio(u128);

impl Ratio {
    /// Creates a ratio from its raw scaled value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRatio`] unless `0 < raw < RATIO_SCALE`.
    pub const fn new(raw: u128) -> Result<Self, LedgerError> {
        if raw == 0 || raw >= RATIO_SCALE {
            return Err(LedgerError::InvalidRatio(raw));
        }
        Ok(Self(raw))
    }

    /// Creates a ratio from a whole percentage.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRatio`] unless `0 < percent < 100`.
    pub const fn from_percent(percent: u128) -> Result<Self, LedgerError> {
        if percent >= 100 {
            return Err(LedgerError::InvalidRatio(RATIO_SCALE));
        }
        Self::new(percent * (RATIO_SCALE / 100))
    }

    /// Ratio of `part` to `whole`, floored.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRatio`] if the result is not strictly
    /// between zero and one.
    pub fn of(part: Amount, whole: Amount) -> Result<Self, LedgerError> {
        if part >= whole {
            return Err(LedgerError::InvalidRatio(RATIO_SCALE));
        }
        Self::new(mul_div(RATIO_SCALE, part, whole)?)
    }

    /// Returns the raw scaled value.
    #[must_use]
    pub const fn raw(self) -> u128 {
        self.0
    }

    /// Applies the ratio to `amount`, flooring.
    ///
    /// # Errors
    ///
    /// Never fails for a valid ratio; kept fallible for uniform `?` use.
    pub fn apply(self, amount: Amount) -> Result<Amount, LedgerError> {
        mul_div(amount, self.0, RATIO_SCALE)
    }
}

/// Applies a basis-point fee to `amount`, flooring.
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] if `bps` exceeds 100%.
pub fn bps_of(amount: Amount, bps: u32) -> Result<Amount, LedgerError> {
    let bps = u128::from(bps);
    if bps > BPS_SCALE {
        return Err(LedgerError::ArithmeticOverflow);
    }
    mul_div(amount, bps, BPS_SCALE)
}
