//! Timed provider: linear vesting over a lock.
//!
//! Layout: `[leftAmount, startTime, finishTime, startAmount]`.
//!
//! ```text
//! elapsed      = clamp(now - start, 0, finish - start)
//! vested       = floor(startAmount * elapsed / (finish - start))
//! withdrawable = vested - (startAmount - leftAmount)
//! ```
//!
//! The vested amount is always recomputed from `startAmount`, so repeated
//! partial withdrawals never accumulate rounding drift.

use super::deal::Withdrawn;
use super::lock::{LockParams, to_timestamp};
use crate::error::LedgerError;
use crate::math::{self, Amount, Timestamp};
use crate::providers::ProviderClass;

/// Stored params of a timed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedParams {
    /// Inner lock (left amount and start).
    pub lock: LockParams,
    /// End of the vesting window.
    pub finish: Timestamp,
    /// Principal the vesting curve is computed from.
    pub start_amount: Amount,
}

impl TimedParams {
    /// Stored params length.
    pub const LEN: usize = 4;

    /// Builds params from creation input `[amount, startTime, finishTime]`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidFinishTime`] unless `finish > start`,
    /// plus the lock validation errors.
    pub fn create(input: &[Amount], now: Timestamp) -> Result<Self, LedgerError> {
        let [amount, start, finish] = input else {
            return Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Timed,
                expected: 3,
                got: input.len(),
            });
        };
        let lock = LockParams::create(&[*amount, *start], now)?;
        let finish = to_timestamp(*finish)?;
        if finish <= lock.start {
            return Err(LedgerError::InvalidFinishTime {
                start: lock.start,
                finish,
            });
        }
        Ok(Self {
            lock,
            finish,
            start_amount: *amount,
        })
    }

    /// Decodes stored params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch and
    /// [`LedgerError::InvalidStartAmount`] when `leftAmount > startAmount`.
    pub fn decode(params: &[Amount]) -> Result<Self, LedgerError> {
        match params {
            [left, start, finish, start_amount] => {
                if start_amount < left {
                    return Err(LedgerError::InvalidStartAmount {
                        left: *left,
                        start_amount: *start_amount,
                    });
                }
                Ok(Self {
                    lock: LockParams::decode(&[*left, *start])?,
                    finish: to_timestamp(*finish)?,
                    start_amount: *start_amount,
                })
            }
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Timed,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        let mut params = self.lock.encode();
        params.push(Amount::from(self.finish));
        params.push(self.start_amount);
        params
    }

    /// Amount still committed.
    #[must_use]
    pub const fn left(&self) -> Amount {
        self.lock.deal.left
    }

    /// Linear unlock to date minus what was already released.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] only for corrupt params.
    pub fn withdrawable(&self, now: Timestamp) -> Result<Amount, LedgerError> {
        if now < self.lock.start {
            return Ok(0);
        }
        if now >= self.finish {
            return Ok(self.left());
        }
        let duration = self.finish - self.lock.start;
        let elapsed = now - self.lock.start;
        let vested = math::mul_div(
            self.start_amount,
            Amount::from(elapsed),
            Amount::from(duration),
        )?;
        let released = self.start_amount.saturating_sub(self.left());
        Ok(vested.saturating_sub(released).min(self.left()))
    }

    /// Releases up to `requested` of what has vested.
    ///
    /// # Errors
    ///
    /// Same as [`withdrawable`](Self::withdrawable).
    pub fn withdraw(&mut self, now: Timestamp, requested: Amount) -> Result<Withdrawn, LedgerError> {
        let allowed = requested.min(self.withdrawable(now)?);
        Ok(self.lock.deal.withdraw(allowed))
    }

    /// Moves `amount` of the remainder into a new pool with the same window.
    ///
    /// `startAmount` is scaled by `amount / left` for the new side and the
    /// rest stays with the old side, so `left <= startAmount` holds on both.
    ///
    /// # Errors
    ///
    /// Propagates the lock split errors.
    pub fn split(&mut self, amount: Amount) -> Result<Self, LedgerError> {
        let left_before = self.left();
        let lock = self.lock.split(amount)?;
        let new_start_amount = math::mul_div(self.start_amount, amount, left_before)?;
        self.start_amount = math::sub(self.start_amount, new_start_amount)?;
        Ok(Self {
            lock,
            finish: self.finish,
            start_amount: new_start_amount,
        })
    }

    /// Removes `fee` from both the principal and the remainder, keeping
    /// the vesting curve proportional.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidSplit`] if nothing would remain.
    pub fn skim(&mut self, fee: Amount) -> Result<(), LedgerError> {
        self.lock.deal.skim(fee)?;
        self.start_amount = math::sub(self.start_amount, fee)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const T: Timestamp = 1_700_000_000;
    const WEEK: Timestamp = 7 * 24 * 3600;

    fn weekly(amount: Amount) -> TimedParams {
        let Ok(timed) = TimedParams::create(
            &[amount, Amount::from(T), Amount::from(T + WEEK)],
            T,
        ) else {
            panic!("create failed");
        };
        timed
    }

    #[test]
    fn create_requires_finish_after_start() {
        let result = TimedParams::create(&[100, Amount::from(T), Amount::from(T)], T);
        assert_eq!(
            result,
            Err(LedgerError::InvalidFinishTime { start: T, finish: T })
        );
    }

    #[test]
    fn decode_rejects_left_above_start_amount() {
        let params = [1_000, Amount::from(T), Amount::from(T + WEEK), 10];
        assert_eq!(
            TimedParams::decode(&params),
            Err(LedgerError::InvalidStartAmount {
                left: 1_000,
                start_amount: 10
            })
        );
        let released = [10, Amount::from(T), Amount::from(T + WEEK), 1_000];
        assert!(TimedParams::decode(&released).is_ok());
    }

    #[test]
    fn half_way_unlocks_half() {
        let mut timed = weekly(100_000);
        assert_eq!(timed.withdrawable(T + WEEK / 2), Ok(50_000));
        let Ok(step) = timed.withdraw(T + WEEK / 2, Amount::MAX) else {
            panic!("withdraw failed");
        };
        assert_eq!(step.released, 50_000);
        assert_eq!(timed.left(), 50_000);
        assert_eq!(timed.withdrawable(T + WEEK / 2), Ok(0));
    }

    #[test]
    fn nothing_before_start_everything_after_finish() {
        let timed = weekly(100_000);
        assert_eq!(timed.withdrawable(T - 1), Ok(0));
        assert_eq!(timed.withdrawable(T + WEEK), Ok(100_000));
        assert_eq!(timed.withdrawable(T + 10 * WEEK), Ok(100_000));
    }

    #[test]
    fn withdrawable_is_monotonic() {
        let timed = weekly(1_000_003);
        let mut last = 0;
        for step in 0..=70 {
            let Ok(now) = timed.withdrawable(T + step * WEEK / 70) else {
                panic!("withdrawable failed");
            };
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 1_000_003);
    }

    #[test]
    fn repeated_withdrawals_do_not_drift() {
        let mut timed = weekly(1_000);
        let mut total = 0;
        for step in 1..=7 {
            let Ok(out) = timed.withdraw(T + step * WEEK / 7, Amount::MAX) else {
                panic!("withdraw failed");
            };
            total += out.released;
        }
        assert_eq!(total, 1_000);
        assert_eq!(timed.left(), 0);
    }

    #[test]
    fn split_after_half_release() {
        let mut timed = weekly(100_000);
        let _ = timed.withdraw(T + WEEK / 2, Amount::MAX);
        let Ok(new) = timed.split(25_000) else {
            panic!("split failed");
        };
        assert_eq!(timed.left(), 25_000);
        assert_eq!(new.left(), 25_000);
        assert_eq!(new.lock.start, T);
        assert_eq!(new.finish, T + WEEK);
        assert!(new.left() <= new.start_amount);
        assert!(timed.left() <= timed.start_amount);
        assert_eq!(timed.withdrawable(T + WEEK), Ok(25_000));
        assert_eq!(new.withdrawable(T + WEEK), Ok(25_000));
    }

    #[test]
    fn skim_scales_curve() {
        let mut timed = weekly(10_000);
        assert!(timed.skim(100).is_ok());
        assert_eq!(timed.left(), 9_900);
        assert_eq!(timed.start_amount, 9_900);
        assert_eq!(timed.withdrawable(T + WEEK / 2), Ok(4_950));
    }
}
