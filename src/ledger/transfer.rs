//! Ownership-token transfer hook.
//!
//! A transfer is either a plain owner change or, depending on its target
//! and payload, a trigger for another operation:
//!
//! | Target                          | Payload | Effect                            |
//! |---------------------------------|---------|-----------------------------------|
//! | registry                        | yes     | split to the payload's new owner  |
//! | registry                        | no      | withdraw to the owner             |
//! | the pool's refund provider      | no      | refund against the collateral     |
//! | the pool's fee provider         | no      | collect the fee, then withdraw    |
//! | the schedule under a fee        | no      | withdraw once the fee is collected|
//! | the pool's delay-vault provider | no      | settle into the tier schedule     |
//! | the pool's collateral provider  | no      | withdraw what the escrow holds    |
//! | any other address               | no      | plain owner change                |

use super::REGISTRY_ADDRESS;
use super::tx::Tx;
use crate::domain::{
    Address, LedgerEvent, PoolEntry, PoolId, SplitPayload, SplitRequest, TransferOutcome,
};
use crate::error::LedgerError;
use crate::math;
use crate::providers::collateral::CollateralParams;
use crate::providers::deal::DealParams;
use crate::providers::delay_vault::DelayParams;
use crate::providers::refund::RefundParams;
use crate::providers::{ProviderKind, Schedule};

impl Tx<'_> {
    pub(crate) fn transfer_pool(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        to: Address,
        payload: Option<SplitPayload>,
    ) -> Result<TransferOutcome, LedgerError> {
        let entry = self.authorize_owner(pool_id, caller)?;
        if let Some(payload) = payload {
            if to != REGISTRY_ADDRESS {
                return Err(LedgerError::InvalidTransferTarget { pool_id, to });
            }
            let new_pool_id =
                self.split_and_record(&entry, SplitRequest::Ratio(payload.ratio), payload.new_owner)?;
            return Ok(TransferOutcome::Split { new_pool_id });
        }
        to.non_zero()?;
        if to == REGISTRY_ADDRESS {
            self.ensure_approved(entry.provider)?;
            let outcome = self.withdraw_and_record(pool_id, entry.owner)?;
            return Ok(TransferOutcome::Withdrawn(outcome));
        }
        if self.state.providers.contains(to) {
            self.ensure_approved(entry.provider)?;
            return self.route_to_provider(&entry, to);
        }
        self.change_owner(&entry, to)?;
        Ok(TransferOutcome::Transferred)
    }

    fn route_to_provider(
        &mut self,
        entry: &PoolEntry,
        to: Address,
    ) -> Result<TransferOutcome, LedgerError> {
        let pool_id = entry.pool_id;
        match self.state.kind_of(entry)?.clone() {
            ProviderKind::Refund { .. } if to == entry.provider => {
                let main_coin_pool = self.refund(entry)?;
                Ok(TransferOutcome::Refunded { main_coin_pool })
            }
            ProviderKind::Fee { schedule, .. } if to == entry.provider => {
                let mut fee = self.state.fee_params(entry)?;
                let fee = self.collect_fee(pool_id, &mut fee, &schedule)?;
                let withdrawal = self.withdraw_and_record(pool_id, entry.owner)?;
                Ok(TransferOutcome::FeeCollected { fee, withdrawal })
            }
            ProviderKind::Fee { inner, .. } if to == inner => {
                let outcome = self.withdraw_and_record(pool_id, entry.owner)?;
                Ok(TransferOutcome::Withdrawn(outcome))
            }
            ProviderKind::DelayVault { .. } if to == entry.provider => {
                let new_pool_id = self.settle_delay(entry)?;
                Ok(TransferOutcome::Settled { new_pool_id })
            }
            ProviderKind::Collateral { .. } if to == entry.provider => {
                let outcome = self.withdraw_and_record(pool_id, entry.owner)?;
                Ok(TransferOutcome::Withdrawn(outcome))
            }
            _ => Err(LedgerError::InvalidTransferTarget { pool_id, to }),
        }
    }

    fn change_owner(&mut self, entry: &PoolEntry, to: Address) -> Result<(), LedgerError> {
        let pool_id = entry.pool_id;
        if let ProviderKind::DelayVault { .. } = self.state.kind_of(entry)? {
            let amount = DelayParams::decode(&entry.params)?.amount;
            let from_key = (entry.provider, entry.owner);
            let from_total = math::sub(self.state.delay_total(entry.provider, entry.owner), amount)?;
            let to_total = math::add(self.state.delay_total(entry.provider, to), amount)?;
            self.state.delay_totals.insert(from_key, from_total);
            self.state.delay_totals.insert((entry.provider, to), to_total);
        }
        let from = self.state.registry.set_owner(pool_id, to)?;
        let timestamp = self.stamp();
        self.emit(LedgerEvent::PoolTransferred {
            pool_id,
            from,
            to,
            timestamp,
        });
        Ok(())
    }

    /// Returns the unvested tokens to the project and pays the owner the
    /// main coin they are worth. Returns the main-coin pool, if any.
    fn refund(&mut self, entry: &PoolEntry) -> Result<Option<PoolId>, LedgerError> {
        let refund = RefundParams::decode(&entry.params)?;
        let collateral = self.state.entry(refund.collateral)?.clone();
        let mut terms = CollateralParams::decode(&collateral.params)?;
        if !terms.is_open(self.now) {
            return Err(LedgerError::RefundWindowClosed {
                finish: terms.finish,
            });
        }
        let tokens = self.state.committed(refund.inner)?;
        let due = refund.main_coin_due(tokens)?;

        let inner = self.state.entry(refund.inner)?.clone();
        let token_collector = self.state.entry(terms.token_collector)?.clone();
        self.state.vault.move_custody(
            collateral.provider,
            inner.account()?,
            token_collector.account()?,
            tokens,
        )?;
        let collected = math::add(self.state.deal_left(terms.token_collector)?, tokens)?;
        self.set_params(terms.token_collector, DealParams { left: collected }.encode())?;

        let holder = self.state.entry(terms.holder)?.clone();
        let holder_left = math::sub(self.state.deal_left(terms.holder)?, due)?;
        self.set_params(terms.holder, DealParams { left: holder_left }.encode())?;
        terms.unreserve(due)?;
        self.set_params(refund.collateral, terms.encode())?;

        self.burn(refund.inner)?;
        self.burn(entry.pool_id)?;
        let main_coin_pool = if due > 0 {
            Some(self.mint(
                entry.owner,
                holder.asset,
                holder.provider,
                holder.vault_account,
                DealParams { left: due }.encode(),
            )?)
        } else {
            None
        };
        tracing::debug!(pool_id = %entry.pool_id, tokens, due, "refund executed");
        let timestamp = self.stamp();
        self.emit(LedgerEvent::RefundExecuted {
            pool_id: entry.pool_id,
            collateral_pool_id: refund.collateral,
            token_amount: tokens,
            main_coin_amount: due,
            timestamp,
        });
        Ok(main_coin_pool)
    }

    /// Replaces a delay-vault pool with the schedule of its tier.
    fn settle_delay(&mut self, entry: &PoolEntry) -> Result<PoolId, LedgerError> {
        let params = DelayParams::decode(&entry.params)?;
        let tiers = self.state.delay_tiers(entry.provider)?;
        let count = tiers.len();
        let tier = *tiers.get(params.tier).ok_or(LedgerError::InvalidTier {
            requested: params.tier,
            current: params.tier,
            count,
        })?;
        let class = self.state.providers.class_of(tier.provider)?;
        let schedule = Schedule::delayed(
            class,
            params.amount,
            self.now,
            tier.start_delay,
            tier.finish_delay,
        )?;
        self.burn(entry.pool_id)?;
        let total = self
            .state
            .delay_total(entry.provider, entry.owner)
            .saturating_sub(params.amount);
        self.state
            .delay_totals
            .insert((entry.provider, entry.owner), total);
        self.mint(
            entry.owner,
            entry.asset,
            tier.provider,
            entry.vault_account,
            schedule.encode(),
        )
    }
}
