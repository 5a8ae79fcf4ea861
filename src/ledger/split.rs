//! Split dispatch over the provider chain.
//!
//! Every split is all-or-nothing: composite pools fan the same ratio over
//! their sub-pools, and any failure rolls back the whole transaction.

use super::tx::Tx;
use crate::domain::{Address, LedgerEvent, PoolEntry, PoolId, SplitRequest, VaultAccountId};
use crate::error::LedgerError;
use crate::math::{self, Amount};
use crate::providers::bundle::BundleParams;
use crate::providers::collateral::CollateralParams;
use crate::providers::deal::DealParams;
use crate::providers::fee::FeeParams;
use crate::providers::refund::RefundParams;
use crate::providers::{ProviderClass, ProviderKind, Schedule};

/// A split's new pool and the amount moved into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SplitResult {
    pub(crate) new_pool_id: PoolId,
    pub(crate) moved: Amount,
}

impl Tx<'_> {
    /// Splits a public pool the caller owns or operates.
    pub(crate) fn split(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<PoolId, LedgerError> {
        let entry = self.authorize_owner(pool_id, caller)?;
        self.split_and_record(&entry, request, new_owner)
    }

    /// Splits and records a `PoolSplit` event for the top-level pool.
    pub(crate) fn split_and_record(
        &mut self,
        entry: &PoolEntry,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<PoolId, LedgerError> {
        self.ensure_approved(entry.provider)?;
        let split = self.split_pool(entry.pool_id, request, new_owner)?;
        let timestamp = self.stamp();
        self.emit(LedgerEvent::PoolSplit {
            pool_id: entry.pool_id,
            new_pool_id: split.new_pool_id,
            new_owner,
            amount: split.moved,
            timestamp,
        });
        Ok(split.new_pool_id)
    }

    pub(crate) fn split_pool(
        &mut self,
        pool_id: PoolId,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<SplitResult, LedgerError> {
        new_owner.non_zero()?;
        let entry = self.state.entry(pool_id)?.clone();
        let kind = self.state.kind_of(&entry)?.clone();
        match kind {
            ProviderKind::Deal | ProviderKind::Lock { .. } | ProviderKind::Timed { .. } => {
                let mut schedule = Schedule::decode(kind.class(), &entry.params)?;
                let moved = request.resolve(schedule.left())?;
                let new = schedule.split(moved)?;
                self.set_params(pool_id, schedule.encode())?;
                let new_pool_id = self.mint(
                    new_owner,
                    entry.asset,
                    entry.provider,
                    entry.vault_account,
                    new.encode(),
                )?;
                Ok(SplitResult { new_pool_id, moved })
            }
            ProviderKind::Fee { .. } => {
                let mut fee = self.state.fee_params(&entry)?;
                let moved = request.resolve(fee.schedule.left())?;
                let new = FeeParams {
                    schedule: fee.schedule.split(moved)?,
                    collected: fee.collected,
                };
                self.set_params(pool_id, fee.encode())?;
                let new_pool_id = self.mint(
                    new_owner,
                    entry.asset,
                    entry.provider,
                    entry.vault_account,
                    new.encode(),
                )?;
                Ok(SplitResult { new_pool_id, moved })
            }
            ProviderKind::Refund { .. } => self.split_refund(&entry, request, new_owner),
            ProviderKind::Collateral { .. } => self.split_collateral(&entry, request, new_owner),
            ProviderKind::Bundle => self.split_bundle(&entry, request, new_owner),
            ProviderKind::DelayVault { .. } => Err(LedgerError::UnsupportedOperation {
                provider: ProviderClass::DelayVault,
                operation: "split",
            }),
        }
    }

    fn split_refund(
        &mut self,
        entry: &PoolEntry,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<SplitResult, LedgerError> {
        let refund = RefundParams::decode(&entry.params)?;
        let inner = self.split_pool(refund.inner, request, entry.provider)?;
        let new = RefundParams {
            inner: inner.new_pool_id,
            ..refund
        };
        let new_pool_id = self.mint(new_owner, entry.asset, entry.provider, None, new.encode())?;
        Ok(SplitResult {
            new_pool_id,
            moved: inner.moved,
        })
    }

    /// Splits the collateral surplus. Reserved main coin stays with the
    /// original pool so its refunds remain payable.
    fn split_collateral(
        &mut self,
        entry: &PoolEntry,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<SplitResult, LedgerError> {
        let params = CollateralParams::decode(&entry.params)?;
        let token_left = self.state.deal_left(params.token_collector)?;
        let main_coin_left = self.state.deal_left(params.main_coin_collector)?;
        let holder_left = self.state.deal_left(params.holder)?;
        let ratio = request.as_ratio(params.surplus(holder_left))?;
        let shares = params.shares(ratio, token_left, main_coin_left, holder_left)?;

        let new_pool_id = self.mint(new_owner, entry.asset, entry.provider, None, Vec::new())?;

        let token = self.state.entry(params.token_collector)?.clone();
        let token_account = self.state.vault.open(entry.provider, token.asset)?;
        self.state
            .vault
            .move_custody(entry.provider, token.account()?, token_account, shares.token)?;
        let token_collector = self.carve_sub_pool(
            &token,
            token_left,
            shares.token,
            entry.provider,
            Some(token_account),
        )?;

        let collector = self.state.entry(params.main_coin_collector)?.clone();
        let main_coin_collector = self.carve_sub_pool(
            &collector,
            main_coin_left,
            shares.main_coin,
            entry.provider,
            collector.vault_account,
        )?;

        let holder_entry = self.state.entry(params.holder)?.clone();
        let holder = self.carve_sub_pool(
            &holder_entry,
            holder_left,
            shares.holder,
            entry.provider,
            holder_entry.vault_account,
        )?;

        let new = CollateralParams {
            token_collector,
            main_coin_collector,
            holder,
            reserved: 0,
            ..params
        };
        self.set_params(new_pool_id, new.encode())?;
        Ok(SplitResult {
            new_pool_id,
            moved: shares.holder,
        })
    }

    /// Moves `share` of a deal sub-pool into a new sub-pool. Zero shares
    /// are allowed so every split collateral keeps all three sub-pools.
    fn carve_sub_pool(
        &mut self,
        source: &PoolEntry,
        left: Amount,
        share: Amount,
        owner: Address,
        account: Option<VaultAccountId>,
    ) -> Result<PoolId, LedgerError> {
        let remaining = math::sub(left, share)?;
        self.set_params(source.pool_id, DealParams { left: remaining }.encode())?;
        self.mint(
            owner,
            source.asset,
            source.provider,
            account,
            DealParams { left: share }.encode(),
        )
    }

    fn split_bundle(
        &mut self,
        entry: &PoolEntry,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<SplitResult, LedgerError> {
        let params = BundleParams::decode(&entry.params)?;
        let total = self.state.committed(entry.pool_id)?;
        let ratio = request.as_ratio(total)?;
        let new_pool_id = self.mint(new_owner, entry.asset, entry.provider, None, Vec::new())?;
        let mut last_child = new_pool_id;
        let mut moved = 0;
        // Children whose share floors to zero stay whole under the old parent.
        for child in self.state.live_children(entry.pool_id, &params) {
            let share = ratio.apply(self.state.committed(child)?)?;
            if share == 0 {
                continue;
            }
            let split = self.split_pool(child, SplitRequest::Amount(share), entry.provider)?;
            last_child = split.new_pool_id;
            moved = math::add(moved, split.moved)?;
        }
        if moved == 0 {
            return Err(LedgerError::InvalidSplit {
                requested: 0,
                available: total,
            });
        }
        self.set_params(new_pool_id, BundleParams { last_child }.encode())?;
        Ok(SplitResult { new_pool_id, moved })
    }
}
