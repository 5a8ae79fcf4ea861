//! Ledger state and its read side.
//!
//! [`LedgerState`] is everything a transaction may touch. It is cloned as
//! a whole before each call and restored on failure, so reads here never
//! observe a half-applied mutation.

use std::collections::BTreeMap;

use crate::domain::{
    Address, LedgerEvent, PoolEntry, PoolId, PoolRegistry, PoolSnapshot, Vault, VaultAccountId,
};
use crate::error::LedgerError;
use crate::math::{self, Amount, Timestamp};
use crate::providers::bundle::BundleParams;
use crate::providers::collateral::CollateralParams;
use crate::providers::deal::DealParams;
use crate::providers::delay_vault::DelayParams;
use crate::providers::fee::FeeParams;
use crate::providers::refund::RefundParams;
use crate::providers::{DelayTier, ProviderClass, ProviderGraph, ProviderKind, Schedule};

/// Pool table, custody, provider graph, delay-vault totals and the
/// pending event outbox.
#[derive(Debug, Clone)]
pub(crate) struct LedgerState {
    pub(crate) registry: PoolRegistry,
    pub(crate) vault: Vault,
    pub(crate) providers: ProviderGraph,
    pub(crate) delay_totals: BTreeMap<(Address, Address), Amount>,
    pub(crate) events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub(crate) fn new(owner: Address) -> Self {
        Self {
            registry: PoolRegistry::new(owner),
            vault: Vault::new(),
            providers: ProviderGraph::new(),
            delay_totals: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn entry(&self, pool_id: PoolId) -> Result<&PoolEntry, LedgerError> {
        self.registry.get(pool_id)
    }

    pub(crate) fn kind_of(&self, entry: &PoolEntry) -> Result<&ProviderKind, LedgerError> {
        self.providers.get(entry.provider)
    }

    /// Decodes the fee params of a fee-decorated pool.
    pub(crate) fn fee_params(&self, entry: &PoolEntry) -> Result<FeeParams, LedgerError> {
        match self.kind_of(entry)? {
            ProviderKind::Fee { inner, .. } => {
                FeeParams::decode(self.providers.class_of(*inner)?, &entry.params)
            }
            other => Err(LedgerError::UnsupportedOperation {
                provider: other.class(),
                operation: "fee",
            }),
        }
    }

    /// Remaining amount of a deal sub-pool.
    pub(crate) fn deal_left(&self, pool_id: PoolId) -> Result<Amount, LedgerError> {
        Ok(DealParams::decode(&self.entry(pool_id)?.params)?.left)
    }

    pub(crate) fn delay_tiers(&self, provider: Address) -> Result<&[DelayTier], LedgerError> {
        match self.providers.get(provider)? {
            ProviderKind::DelayVault { tiers } => Ok(tiers),
            other => Err(LedgerError::UnsupportedOperation {
                provider: other.class(),
                operation: "delay_vault",
            }),
        }
    }

    pub(crate) fn delay_total(&self, provider: Address, user: Address) -> Amount {
        self.delay_totals
            .get(&(provider, user))
            .copied()
            .unwrap_or(0)
    }

    /// Live children of a bundle parent, in id order.
    pub(crate) fn live_children(&self, parent: PoolId, params: &BundleParams) -> Vec<PoolId> {
        params
            .children(parent)
            .filter(|child| self.registry.contains(*child))
            .collect()
    }

    /// Amount still committed by a pool (for collateral: main coin held).
    pub(crate) fn committed(&self, pool_id: PoolId) -> Result<Amount, LedgerError> {
        let entry = self.entry(pool_id)?;
        match self.kind_of(entry)? {
            ProviderKind::Deal | ProviderKind::Lock { .. } | ProviderKind::Timed { .. } => {
                let class = self.providers.class_of(entry.provider)?;
                Ok(Schedule::decode(class, &entry.params)?.left())
            }
            ProviderKind::Fee { .. } => Ok(self.fee_params(entry)?.schedule.left()),
            ProviderKind::Refund { .. } => {
                self.committed(RefundParams::decode(&entry.params)?.inner)
            }
            ProviderKind::Collateral { .. } => {
                let params = CollateralParams::decode(&entry.params)?;
                math::add(
                    self.deal_left(params.main_coin_collector)?,
                    self.deal_left(params.holder)?,
                )
            }
            ProviderKind::Bundle => {
                let params = BundleParams::decode(&entry.params)?;
                self.live_children(pool_id, &params)
                    .into_iter()
                    .try_fold(0, |sum, child| math::add(sum, self.committed(child)?))
            }
            ProviderKind::DelayVault { .. } => Ok(DelayParams::decode(&entry.params)?.amount),
        }
    }

    /// Amount a withdrawal would release at `now`.
    pub(crate) fn withdrawable(&self, pool_id: PoolId, now: Timestamp) -> Result<Amount, LedgerError> {
        let entry = self.entry(pool_id)?;
        match self.kind_of(entry)? {
            ProviderKind::Deal | ProviderKind::Lock { .. } | ProviderKind::Timed { .. } => {
                let class = self.providers.class_of(entry.provider)?;
                Schedule::decode(class, &entry.params)?.withdrawable(now)
            }
            ProviderKind::Fee { .. } => {
                let fee = self.fee_params(entry)?;
                if fee.collected {
                    fee.schedule.withdrawable(now)
                } else {
                    Ok(0)
                }
            }
            ProviderKind::Refund { .. } => {
                self.withdrawable(RefundParams::decode(&entry.params)?.inner, now)
            }
            ProviderKind::Collateral { .. } => {
                let params = CollateralParams::decode(&entry.params)?;
                let earned = self.deal_left(params.main_coin_collector)?;
                if params.is_open(now) {
                    Ok(earned)
                } else {
                    math::add(earned, self.deal_left(params.holder)?)
                }
            }
            ProviderKind::Bundle => {
                let params = BundleParams::decode(&entry.params)?;
                self.live_children(pool_id, &params)
                    .into_iter()
                    .try_fold(0, |sum, child| math::add(sum, self.withdrawable(child, now)?))
            }
            ProviderKind::DelayVault { .. } => Ok(0),
        }
    }

    /// Provider params with composite layouts expanded from sub-pools.
    pub(crate) fn resolved_params(&self, pool_id: PoolId) -> Result<Vec<Amount>, LedgerError> {
        let entry = self.entry(pool_id)?;
        match self.kind_of(entry)? {
            ProviderKind::Refund { .. } => {
                let params = RefundParams::decode(&entry.params)?;
                let inner = self.entry(params.inner)?;
                Ok(params.resolve(self.committed(params.inner)?, &inner.params))
            }
            ProviderKind::Collateral { .. } | ProviderKind::Bundle => {
                let mut params = vec![self.committed(pool_id)?];
                params.extend_from_slice(&entry.params);
                Ok(params)
            }
            _ => Ok(entry.params.clone()),
        }
    }

    pub(crate) fn snapshot(&self, pool_id: PoolId, now: Timestamp) -> Result<PoolSnapshot, LedgerError> {
        let entry = self.entry(pool_id)?;
        Ok(PoolSnapshot {
            pool_id,
            owner: entry.owner,
            asset: entry.asset,
            provider: entry.provider,
            provider_class: self.providers.class_of(entry.provider)?,
            vault_account: entry.vault_account,
            params: self.resolved_params(pool_id)?,
            withdrawable: self.withdrawable(pool_id, now)?,
        })
    }

    /// Fails unless `pool_id` is a bundle parent.
    pub(crate) fn bundle_params(&self, pool_id: PoolId) -> Result<BundleParams, LedgerError> {
        let entry = self
            .entry(pool_id)
            .map_err(|_| LedgerError::InvalidProviderPoolId(pool_id))?;
        match self.kind_of(entry)? {
            ProviderKind::Bundle => BundleParams::decode(&entry.params),
            _ => Err(LedgerError::InvalidProviderPoolId(pool_id)),
        }
    }

    /// Checks every custody account against the commitments of the live
    /// pools it backs.
    pub(crate) fn check_solvency(&self) -> Result<(), LedgerError> {
        let mut committed: BTreeMap<VaultAccountId, Amount> = BTreeMap::new();
        for entry in self.registry.iter() {
            let Some(account) = entry.vault_account else {
                continue;
            };
            let holds_funds = matches!(
                self.providers.class_of(entry.provider)?,
                ProviderClass::Deal
                    | ProviderClass::Lock
                    | ProviderClass::Timed
                    | ProviderClass::Fee
                    | ProviderClass::DelayVault
            );
            if !holds_funds {
                continue;
            }
            let amount = entry.params.first().copied().unwrap_or(0);
            let total = committed.entry(account).or_insert(0);
            *total = math::add(*total, amount)?;
        }
        for (account, committed) in committed {
            let custodied = self.vault.account(account)?.custodied;
            if committed > custodied {
                return Err(LedgerError::SolvencyViolation {
                    account,
                    committed,
                    custodied,
                });
            }
        }
        Ok(())
    }
}
