//! Deployment of the canonical provider graph.
//!
//! [`StandardProviders::deploy`] installs and approves, in one
//! transaction, one provider of every class: the three schedules, a fee
//! decorator over each schedule, collateral and refund, bundle, and a
//! delay vault whose tiers come from [`LedgerConfig::delay_tiers`].

use serde::Serialize;

use crate::config::{LedgerConfig, TierSpec};
use crate::domain::{Address, AssetBook};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::ledger::tx::Tx;
use crate::providers::{DelayTier, FeeSchedule, ProviderKind};

/// Addresses of the deployed provider graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StandardProviders {
    /// Instant release.
    pub deal: Address,
    /// Cliff release over `deal`.
    pub lock: Address,
    /// Linear vesting over `lock`.
    pub timed: Address,
    /// Fee decorator over `deal`.
    pub deal_fee: Address,
    /// Fee decorator over `lock`.
    pub lock_fee: Address,
    /// Fee decorator over `timed`.
    pub timed_fee: Address,
    /// Collateral escrow with `deal` sub-pools.
    pub collateral: Address,
    /// Refund bound to `collateral`.
    pub refund: Address,
    /// Bundle parent.
    pub bundle: Address,
    /// Delay vault over the configured tiers.
    pub delay_vault: Address,
}

impl StandardProviders {
    /// Installs and approves the full graph. Skimmed fees go to
    /// `fee_collector`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotRegistryOwner`] unless `caller` owns the
    /// registry, and [`LedgerError::InvalidTierTable`] for a malformed tier
    /// configuration.
    pub fn deploy<B: AssetBook>(
        ledger: &mut Ledger<B>,
        caller: Address,
        fee_collector: Address,
    ) -> Result<Self, LedgerError> {
        let config = ledger.config().clone();
        let providers = ledger.transact(|tx| {
            tx.state.registry.ensure_registry_owner(caller)?;
            Self::install_all(tx, &config, fee_collector)
        })?;
        tracing::info!(
            deal = %providers.deal,
            delay_vault = %providers.delay_vault,
            "standard providers deployed"
        );
        Ok(providers)
    }

    fn install_all(
        tx: &mut Tx<'_>,
        config: &LedgerConfig,
        fee_collector: Address,
    ) -> Result<Self, LedgerError> {
        let fee = FeeSchedule {
            fee_bps: config.fee_bps,
            timing: config.fee_timing,
            collector: fee_collector,
        };
        let deal = install(tx, ProviderKind::Deal)?;
        let lock = install(tx, ProviderKind::Lock { inner: deal })?;
        let timed = install(tx, ProviderKind::Timed { inner: lock })?;
        let deal_fee = install(tx, ProviderKind::Fee {
            inner: deal,
            schedule: fee,
        })?;
        let lock_fee = install(tx, ProviderKind::Fee {
            inner: lock,
            schedule: fee,
        })?;
        let timed_fee = install(tx, ProviderKind::Fee {
            inner: timed,
            schedule: fee,
        })?;
        let collateral = install(tx, ProviderKind::Collateral { inner: deal })?;
        let refund = install(tx, ProviderKind::Refund { collateral })?;
        let bundle = install(tx, ProviderKind::Bundle)?;
        let tiers = config
            .delay_tiers
            .iter()
            .map(|tier| bind_tier(tier, deal, lock, timed))
            .collect();
        let delay_vault = install(tx, ProviderKind::DelayVault { tiers })?;
        Ok(Self {
            deal,
            lock,
            timed,
            deal_fee,
            lock_fee,
            timed_fee,
            collateral,
            refund,
            bundle,
            delay_vault,
        })
    }
}

fn install(tx: &mut Tx<'_>, kind: ProviderKind) -> Result<Address, LedgerError> {
    let provider = tx.install_provider(kind)?;
    tx.approve_provider(provider, true)?;
    Ok(provider)
}

/// Instant tiers settle into deals, cliff-only tiers into locks, and
/// tiers with a finish delay into timed schedules.
fn bind_tier(tier: &TierSpec, deal: Address, lock: Address, timed: Address) -> DelayTier {
    let provider = match (tier.start_delay, tier.finish_delay) {
        (0, 0) => deal,
        (_, 0) => lock,
        _ => timed,
    };
    DelayTier {
        limit: tier.limit,
        provider,
        start_delay: tier.start_delay,
        finish_delay: tier.finish_delay,
    }
}
