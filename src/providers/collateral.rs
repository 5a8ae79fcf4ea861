//! Collateral provider: main-coin escrow against a finish time.
//!
//! A collateral pool is owned by the project and controls three deal
//! sub-pools owned by the collateral provider itself:
//!
//! - the *token collector*, accumulating tokens handed back by refunds;
//! - the *main-coin collector*, accumulating main coin earned whenever a
//!   refundable holder withdraws tokens instead of refunding;
//! - the *holder*, the undisbursed main coin backing open refunds.
//!
//! `reserved` is the main coin owed to open refund pools. It never
//! exceeds the holder balance, so every refund is payable.

use super::lock::to_timestamp;
use super::{ProviderClass, pool_id_param};
use crate::domain::PoolId;
use crate::error::LedgerError;
use crate::math::{self, Amount, Ratio, Timestamp};

/// Stored params of a collateral pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralParams {
    /// End of the refund window.
    pub finish: Timestamp,
    /// Main coin per token, scaled by [`crate::math::RATE_SCALE`].
    pub rate: Amount,
    /// Token collector sub-pool.
    pub token_collector: PoolId,
    /// Main-coin collector sub-pool.
    pub main_coin_collector: PoolId,
    /// Holder sub-pool.
    pub holder: PoolId,
    /// Main coin reserved for open refunds.
    pub reserved: Amount,
}

/// Amounts moved to the new side of a collateral split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralShares {
    /// Share of the token collector.
    pub token: Amount,
    /// Share of the main-coin collector.
    pub main_coin: Amount,
    /// Share of the unreserved holder balance.
    pub holder: Amount,
}

impl CollateralParams {
    /// Stored params length.
    pub const LEN: usize = 6;

    /// Decodes stored params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch.
    pub fn decode(params: &[Amount]) -> Result<Self, LedgerError> {
        match params {
            [finish, rate, token_collector, main_coin_collector, holder, reserved] => Ok(Self {
                finish: to_timestamp(*finish)?,
                rate: *rate,
                token_collector: pool_id_param(*token_collector)?,
                main_coin_collector: pool_id_param(*main_coin_collector)?,
                holder: pool_id_param(*holder)?,
                reserved: *reserved,
            }),
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Collateral,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        vec![
            Amount::from(self.finish),
            self.rate,
            self.token_collector.into(),
            self.main_coin_collector.into(),
            self.holder.into(),
            self.reserved,
        ]
    }

    /// Whether refunds are still accepted at `now`.
    #[must_use]
    pub const fn is_open(&self, now: Timestamp) -> bool {
        now < self.finish
    }

    /// Reserves `due` main coin for a new refund pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientCollateral`] if the holder cannot
    /// back the reservation.
    pub fn reserve(&mut self, due: Amount, holder_left: Amount) -> Result<(), LedgerError> {
        let available = holder_left.saturating_sub(self.reserved);
        if due > available {
            return Err(LedgerError::InsufficientCollateral {
                required: due,
                available,
            });
        }
        self.reserved = math::add(self.reserved, due)?;
        Ok(())
    }

    /// Drops `amount` from the reservation once it has been paid or earned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if more is released than
    /// was reserved.
    pub fn unreserve(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.reserved = math::sub(self.reserved, amount)?;
        Ok(())
    }

    /// Holder balance not backing any refund.
    #[must_use]
    pub const fn surplus(&self, holder_left: Amount) -> Amount {
        holder_left.saturating_sub(self.reserved)
    }

    /// Applies `ratio` to every sub-pool. The holder share comes out of
    /// the unreserved surplus only.
    ///
    /// # Errors
    ///
    /// Propagates ratio arithmetic errors.
    pub fn shares(
        &self,
        ratio: Ratio,
        token_left: Amount,
        main_coin_left: Amount,
        holder_left: Amount,
    ) -> Result<CollateralShares, LedgerError> {
        Ok(CollateralShares {
            token: ratio.apply(token_left)?,
            main_coin: ratio.apply(main_coin_left)?,
            holder: ratio.apply(self.surplus(holder_left))?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn params() -> CollateralParams {
        CollateralParams {
            finish: 1_000,
            rate: 5,
            token_collector: PoolId::new(1),
            main_coin_collector: PoolId::new(2),
            holder: PoolId::new(3),
            reserved: 0,
        }
    }

    #[test]
    fn layout_round_trip() {
        let p = params();
        assert_eq!(p.encode(), vec![1_000, 5, 1, 2, 3, 0]);
        assert_eq!(CollateralParams::decode(&p.encode()), Ok(p));
    }

    #[test]
    fn window_closes_at_finish() {
        let p = params();
        assert!(p.is_open(999));
        assert!(!p.is_open(1_000));
    }

    #[test]
    fn reservation_is_bounded_by_holder() {
        let mut p = params();
        assert!(p.reserve(600, 1_000).is_ok());
        assert_eq!(
            p.reserve(401, 1_000),
            Err(LedgerError::InsufficientCollateral {
                required: 401,
                available: 400
            })
        );
        assert!(p.reserve(400, 1_000).is_ok());
        assert_eq!(p.surplus(1_000), 0);
        assert!(p.unreserve(1_000).is_ok());
        assert!(p.unreserve(1).is_err());
    }

    #[test]
    fn shares_leave_reservation_alone() {
        let mut p = params();
        assert!(p.reserve(600, 1_000).is_ok());
        let Ok(half) = Ratio::from_percent(50) else {
            panic!("valid ratio");
        };
        let Ok(shares) = p.shares(half, 10, 20, 1_000) else {
            panic!("shares failed");
        };
        assert_eq!(
            shares,
            CollateralShares {
                token: 5,
                main_coin: 10,
                holder: 200
            }
        );
    }
}
