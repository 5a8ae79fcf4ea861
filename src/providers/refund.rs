//! Refund provider: a schedule refundable against a collateral pool.
//!
//! The refund pool owns an inner schedule pool (held by the refund
//! provider's address) and records the collateral pool it draws on.
//! Resolved view: `[left, rate, collateralPoolId, ...inner params]`.

use super::{ProviderClass, pool_id_param};
use crate::domain::PoolId;
use crate::error::LedgerError;
use crate::math::{self, Amount, RATE_SCALE};

/// Stored params of a refund pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundParams {
    /// Main coin per token, scaled by [`RATE_SCALE`].
    pub rate: Amount,
    /// Collateral pool backing refunds.
    pub collateral: PoolId,
    /// Inner schedule pool holding the tokens.
    pub inner: PoolId,
}

impl RefundParams {
    /// Stored params length.
    pub const LEN: usize = 3;

    /// Decodes stored params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParamsLength`] on a layout mismatch.
    pub fn decode(params: &[Amount]) -> Result<Self, LedgerError> {
        match params {
            [rate, collateral, inner] => Ok(Self {
                rate: *rate,
                collateral: pool_id_param(*collateral)?,
                inner: pool_id_param(*inner)?,
            }),
            _ => Err(LedgerError::InvalidParamsLength {
                provider: ProviderClass::Refund,
                expected: Self::LEN,
                got: params.len(),
            }),
        }
    }

    /// Encodes to the stored layout.
    #[must_use]
    pub fn encode(&self) -> Vec<Amount> {
        vec![self.rate, self.collateral.into(), self.inner.into()]
    }

    /// Main coin owed for `tokens`, floored.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if the product does not fit.
    pub fn main_coin_due(&self, tokens: Amount) -> Result<Amount, LedgerError> {
        math::mul_div(tokens, self.rate, RATE_SCALE)
    }

    /// Main coin that stops being refundable when the remainder goes from
    /// `before` to `after`. Summed over a pool's life this telescopes to
    /// exactly the amount reserved for it.
    ///
    /// # Errors
    ///
    /// Same as [`main_coin_due`](Self::main_coin_due).
    pub fn earned(&self, before: Amount, after: Amount) -> Result<Amount, LedgerError> {
        let due_before = self.main_coin_due(before)?;
        let due_after = self.main_coin_due(after)?;
        Ok(due_before.saturating_sub(due_after))
    }

    /// Resolved view with the live remainder and the inner layout appended.
    #[must_use]
    pub fn resolve(&self, left: Amount, inner_params: &[Amount]) -> Vec<Amount> {
        let mut params = vec![left, self.rate, self.collateral.into()];
        params.extend_from_slice(inner_params);
        params
    }
}
