//! Fee decorator over a base-family schedule.
//!
//! Layout: the wrapped schedule's layout followed by a `collected` flag
//! (`0` or `1`). Until the flag is set the pool cannot be withdrawn; the
//! collector step skims `fee_bps` of the remaining principal and sets it.

use super::{FeeSchedule, ProviderClass, Schedule};
use crate::domain::PoolId;
use crate::error::LedgerError;
use crate::math::{self, Amount};

/// Stored params of a fee-decorated pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    /// Wrapped schedule.
    pub schedule: Schedule,
    /// Whether the fee has been skimmed.
    pub collected: bool,
}

impl FeeParams {
    /// Wraps a freshly created schedule, uncollected.
    #[must_use]
    pub const fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            collected: false,
        }
    }

    /// Decodes stored params whose schedule part has `inner` layout.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch.
    pub fn decode(inner: ProviderClass, params: &[Amount]) -> Result<Self, LedgerError> {
        let Some((flag, schedule)) = params.split_last() else {
            return Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Fee,
                expected: Schedule::len_of(inner).unwrap_or(0) + 1,
                got: 0,
            });
        };
        Ok(Self {
            schedule: Schedule::decode(inner, schedule)?,
            collected: *flag != 0,
        })
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        let mut params = self.schedule.encode();
        params.push(Amount::from(self.collected));
        params
    }

    /// Skims the fee from the principal and marks the pool collected.
    /// Returns the fee.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::FeeAlreadyCollected`] when called twice, or
    /// [`LedgerError::InvalidSplit`] if the fee would consume the pool.
    pub fn collect(&mut self, fee: &FeeSchedule, pool_id: PoolId) -> Result<Amount, LedgerError> {
        if self.collected {
            return Err(LedgerError::FeeAlreadyCollected(pool_id));
        }
        let amount = math::bps_of(self.schedule.left(), fee.fee_bps)?;
        if amount > 0 {
            self.schedule.skim(amount)?;
        }
        self.collected = true;
        Ok(amount)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::providers::FeeTiming;

    fn fee(bps: u32) -> FeeSchedule {
        FeeSchedule {
            fee_bps: bps,
            timing: FeeTiming::AtFirstSettlement,
            collector: Address::from_low_u64(0xfee),
        }
    }

    #[test]
    fn layout_appends_flag() {
        let Ok(schedule) = Schedule::create(ProviderClass::Lock, &[100, 50], 10) else {
            panic!("create failed");
        };
        let params = FeeParams::new(schedule);
        assert_eq!(params.encode(), vec![100, 50, 0]);
        assert_eq!(FeeParams::decode(ProviderClass::Lock, &[100, 50, 0]), Ok(params));
    }

    #[test]
    fn decode_rejects_wrong_inner_layout() {
        assert!(matches!(
            FeeParams::decode(ProviderClass::Timed, &[100, 50, 0]),
            Err(LedgerError::InvalidParamsLength { .. })
        ));
        assert!(FeeParams::decode(ProviderClass::Deal, &[]).is_err());
    }

    #[test]
    fn collect_skims_once() {
        let Ok(schedule) = Schedule::create(ProviderClass::Deal, &[10_000], 0) else {
            panic!("create failed");
        };
        let mut params = FeeParams::new(schedule);
        let pool = PoolId::new(1);
        assert_eq!(params.collect(&fee(100), pool), Ok(100));
        assert_eq!(params.schedule.left(), 9_900);
        assert!(params.collected);
        assert_eq!(
            params.collect(&fee(100), pool),
            Err(LedgerError::FeeAlreadyCollected(pool))
        );
    }

    #[test]
    fn zero_fee_only_sets_flag() {
        let Ok(schedule) = Schedule::create(ProviderClass::Deal, &[5], 0) else {
            panic!("create failed");
        };
        let mut params = FeeParams::new(schedule);
        assert_eq!(params.collect(&fee(100), PoolId::new(0)), Ok(0));
        assert_eq!(params.schedule.left(), 5);
        assert!(params.collected);
    }
}
