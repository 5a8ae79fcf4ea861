//! Withdrawal dispatch over the provider chain.
//!
//! Composite pools recurse into their sub-pools. Sub-pools reaching zero
//! are burned inside the recursion; the releases themselves are queued
//! and applied when the transaction settles.

use super::tx::Tx;
use crate::domain::{Address, LedgerEvent, PoolEntry, PoolId, WithdrawOutcome};
use crate::error::LedgerError;
use crate::math::{self, Amount};
use crate::providers::bundle::BundleParams;
use crate::providers::collateral::CollateralParams;
use crate::providers::deal::{DealParams, Withdrawn};
use crate::providers::refund::RefundParams;
use crate::providers::{ProviderKind, Schedule};

impl Tx<'_> {
    /// Withdraws a public pool for its owner. Approved contracts may
    /// trigger this on the owner's behalf; funds always go to the owner.
    pub(crate) fn withdraw(
        &mut self,
        caller: Address,
        pool_id: PoolId,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let entry = self.authorize_withdraw(pool_id, caller)?;
        self.ensure_approved(entry.provider)?;
        self.withdraw_and_record(pool_id, entry.owner)
    }

    /// Withdraws everything currently due from `pool_id` to `recipient`.
    pub(crate) fn withdraw_pool(
        &mut self,
        pool_id: PoolId,
        recipient: Address,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let entry = self.state.entry(pool_id)?.clone();
        let kind = self.state.kind_of(&entry)?.clone();
        match kind {
            ProviderKind::Deal | ProviderKind::Lock { .. } | ProviderKind::Timed { .. } => {
                let mut schedule = Schedule::decode(kind.class(), &entry.params)?;
                let step = schedule.withdraw(self.now, Amount::MAX)?;
                self.record_step(&entry, schedule.encode(), step, recipient)
            }
            ProviderKind::Fee { .. } => {
                let mut fee = self.state.fee_params(&entry)?;
                if !fee.collected {
                    return Err(LedgerError::FeeNotCollected(pool_id));
                }
                let step = fee.schedule.withdraw(self.now, Amount::MAX)?;
                self.record_step(&entry, fee.encode(), step, recipient)
            }
            ProviderKind::Refund { .. } => self.withdraw_refund(&entry, recipient),
            ProviderKind::Collateral { .. } => self.withdraw_collateral(&entry, recipient),
            ProviderKind::Bundle => self.withdraw_bundle(&entry, recipient),
            ProviderKind::DelayVault { .. } => Ok(WithdrawOutcome {
                released: 0,
                is_final: false,
            }),
        }
    }

    /// Withdraws and records a `PoolWithdrawn` event for the top-level pool.
    pub(crate) fn withdraw_and_record(
        &mut self,
        pool_id: PoolId,
        recipient: Address,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let outcome = self.withdraw_pool(pool_id, recipient)?;
        let timestamp = self.stamp();
        self.emit(LedgerEvent::PoolWithdrawn {
            pool_id,
            recipient,
            amount: outcome.released,
            is_final: outcome.is_final,
            timestamp,
        });
        Ok(outcome)
    }

    fn record_step(
        &mut self,
        entry: &PoolEntry,
        params: Vec<Amount>,
        step: Withdrawn,
        recipient: Address,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let account = entry.account()?;
        self.set_params(entry.pool_id, params)?;
        if step.is_final {
            self.burn(entry.pool_id)?;
        }
        self.pay(entry.provider, account, step.released, recipient);
        Ok(WithdrawOutcome {
            released: step.released,
            is_final: step.is_final,
        })
    }

    fn withdraw_refund(
        &mut self,
        entry: &PoolEntry,
        recipient: Address,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let refund = RefundParams::decode(&entry.params)?;
        let before = self.state.committed(refund.inner)?;
        let outcome = self.withdraw_pool(refund.inner, recipient)?;
        let after = math::sub(before, outcome.released)?;
        self.collateral_earned(refund.collateral, refund.earned(before, after)?)?;
        if outcome.is_final {
            self.burn(entry.pool_id)?;
        }
        Ok(outcome)
    }

    /// Moves main coin no longer refundable from the holder to the
    /// main-coin collector. No-op once the collateral is settled.
    fn collateral_earned(&mut self, collateral: PoolId, earned: Amount) -> Result<(), LedgerError> {
        if earned == 0 || !self.state.registry.contains(collateral) {
            return Ok(());
        }
        let mut params = CollateralParams::decode(&self.state.entry(collateral)?.params)?;
        let holder = math::sub(self.state.deal_left(params.holder)?, earned)?;
        let collector = math::add(self.state.deal_left(params.main_coin_collector)?, earned)?;
        params.unreserve(earned)?;
        self.set_params(params.holder, DealParams { left: holder }.encode())?;
        self.set_params(params.main_coin_collector, DealParams { left: collector }.encode())?;
        self.set_params(collateral, params.encode())?;
        tracing::debug!(%collateral, earned, "collateral main coin earned");
        Ok(())
    }

    fn withdraw_collateral(
        &mut self,
        entry: &PoolEntry,
        recipient: Address,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let params = CollateralParams::decode(&entry.params)?;
        self.drain_sub_pool(params.token_collector, recipient)?;
        let mut released = self.drain_sub_pool(params.main_coin_collector, recipient)?;
        let is_final = !params.is_open(self.now);
        if is_final {
            released = math::add(released, self.drain_sub_pool(params.holder, recipient)?)?;
            for sub_pool in [params.token_collector, params.main_coin_collector, params.holder] {
                self.burn(sub_pool)?;
            }
            self.burn(entry.pool_id)?;
        }
        Ok(WithdrawOutcome { released, is_final })
    }

    /// Pays out everything a deal sub-pool holds, leaving it at zero.
    fn drain_sub_pool(&mut self, pool_id: PoolId, recipient: Address) -> Result<Amount, LedgerError> {
        let entry = self.state.entry(pool_id)?.clone();
        let left = DealParams::decode(&entry.params)?.left;
        self.set_params(pool_id, DealParams { left: 0 }.encode())?;
        self.pay(entry.provider, entry.account()?, left, recipient);
        Ok(left)
    }

    fn withdraw_bundle(
        &mut self,
        entry: &PoolEntry,
        recipient: Address,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let params = BundleParams::decode(&entry.params)?;
        let mut released = 0;
        let mut is_final = true;
        for child in self.state.live_children(entry.pool_id, &params) {
            let step = self.withdraw_pool(child, recipient)?;
            released = math::add(released, step.released)?;
            is_final &= step.is_final;
        }
        if is_final {
            self.burn(entry.pool_id)?;
        }
        Ok(WithdrawOutcome { released, is_final })
    }
}
