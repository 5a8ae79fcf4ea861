//! Pool creation and re-registration.

use super::tx::Tx;
use crate::domain::{Address, AssetId, LedgerEvent, PoolId};
use crate::error::LedgerError;
use crate::math::{self, Amount, Timestamp};
use crate::providers::bundle::{self, BundleParams};
use crate::providers::collateral::CollateralParams;
use crate::providers::deal::DealParams;
use crate::providers::delay_vault::{self, DelayParams};
use crate::providers::fee::FeeParams;
use crate::providers::refund::RefundParams;
use crate::providers::{FeeSchedule, FeeTiming, ProviderClass, ProviderKind, Schedule};

/// A schedule pool to create: who owns it, what it holds, and the
/// creation input of its provider.
///
/// Creation input omits derived slots: Deal takes `[amount]`, Lock
/// `[amount, start]`, Timed `[amount, start, finish]`. Fee providers take
/// the input of the schedule they wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPool {
    /// Owner of the minted pool.
    pub owner: Address,
    /// Committed asset.
    pub asset: AssetId,
    /// Controlling provider.
    pub provider: Address,
    /// Provider creation input.
    pub params: Vec<Amount>,
}

/// A collateral escrow to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCollateral {
    /// Project owner receiving tokens and earned main coin.
    pub owner: Address,
    /// Collateral provider.
    pub provider: Address,
    /// Project token refunded into the token collector.
    pub token: AssetId,
    /// Asset escrowed to pay refunds.
    pub main_coin: AssetId,
    /// Main coin deposited into the holder.
    pub amount: Amount,
    /// Main coin paid per token, scaled by [`RATE_SCALE`](crate::math::RATE_SCALE).
    pub rate: Amount,
    /// End of the refund window.
    pub finish: Timestamp,
}

/// A refundable schedule bound to an open collateral pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefund {
    /// Refund provider.
    pub provider: Address,
    /// Collateral pool backing the refund.
    pub collateral: PoolId,
    /// The schedule wrapped by the refund pool.
    pub schedule: NewPool,
}

impl Tx<'_> {
    /// Creates a Deal, Lock, Timed or Fee pool funded by `depositor`.
    pub(crate) fn create_schedule_pool(
        &mut self,
        depositor: Address,
        request: &NewPool,
    ) -> Result<PoolId, LedgerError> {
        self.ensure_approved(request.provider)?;
        match self.state.providers.get(request.provider)?.clone() {
            ProviderKind::Deal | ProviderKind::Lock { .. } | ProviderKind::Timed { .. } => {
                let class = self.state.providers.class_of(request.provider)?;
                let schedule = Schedule::create(class, &request.params, self.now)?;
                let account =
                    self.deposit(request.provider, request.asset, schedule.left(), depositor)?;
                self.mint(
                    request.owner,
                    request.asset,
                    request.provider,
                    Some(account),
                    schedule.encode(),
                )
            }
            ProviderKind::Fee { inner, schedule } => {
                let class = self.state.providers.class_of(inner)?;
                let mut fee = FeeParams::new(Schedule::create(class, &request.params, self.now)?);
                let account =
                    self.deposit(request.provider, request.asset, fee.schedule.left(), depositor)?;
                let pool_id = self.mint(
                    request.owner,
                    request.asset,
                    request.provider,
                    Some(account),
                    fee.encode(),
                )?;
                if schedule.timing == FeeTiming::AtCreation {
                    self.collect_fee(pool_id, &mut fee, &schedule)?;
                }
                Ok(pool_id)
            }
            other => Err(LedgerError::UnsupportedOperation {
                provider: other.class(),
                operation: "create_pool",
            }),
        }
    }

    /// Skims the fee of a fee-decorated pool and pays the collector.
    pub(crate) fn collect_fee(
        &mut self,
        pool_id: PoolId,
        fee: &mut FeeParams,
        schedule: &FeeSchedule,
    ) -> Result<Amount, LedgerError> {
        let entry = self.state.entry(pool_id)?.clone();
        let amount = fee.collect(schedule, pool_id)?;
        self.set_params(pool_id, fee.encode())?;
        self.pay(entry.provider, entry.account()?, amount, schedule.collector);
        let timestamp = self.stamp();
        self.emit(LedgerEvent::FeeCollected {
            pool_id,
            collector: schedule.collector,
            fee: amount,
            timestamp,
        });
        Ok(amount)
    }

    /// Mints a bundle parent followed by its children, ids contiguous.
    pub(crate) fn create_bundle(
        &mut self,
        depositor: Address,
        owner: Address,
        asset: AssetId,
        provider: Address,
        providers: &[Address],
        params: &[Vec<Amount>],
    ) -> Result<PoolId, LedgerError> {
        self.ensure_approved(provider)?;
        let class = self.state.providers.class_of(provider)?;
        if class != ProviderClass::Bundle {
            return Err(LedgerError::UnsupportedOperation {
                provider: class,
                operation: "create_bundle",
            });
        }
        bundle::validate_entries(providers.len(), params.len())?;
        for child in providers {
            self.state.providers.ensure_allowed(ProviderClass::Bundle, *child)?;
        }
        let parent = self.mint(owner, asset, provider, None, Vec::new())?;
        let mut last_child = parent;
        for (child, input) in providers.iter().zip(params) {
            last_child = self.create_schedule_pool(
                depositor,
                &NewPool {
                    owner: provider,
                    asset,
                    provider: *child,
                    params: input.clone(),
                },
            )?;
        }
        self.set_params(parent, BundleParams { last_child }.encode())?;
        Ok(parent)
    }

    /// Opens a collateral pool and its three deal sub-pools.
    pub(crate) fn create_collateral(
        &mut self,
        depositor: Address,
        request: &NewCollateral,
    ) -> Result<PoolId, LedgerError> {
        self.ensure_approved(request.provider)?;
        let inner = match self.state.providers.get(request.provider)? {
            ProviderKind::Collateral { inner } => *inner,
            other => {
                return Err(LedgerError::UnsupportedOperation {
                    provider: other.class(),
                    operation: "create_collateral",
                });
            }
        };
        if request.amount == 0 || request.rate == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if request.finish <= self.now {
            return Err(LedgerError::InvalidFinishTime {
                start: self.now,
                finish: request.finish,
            });
        }
        let pool_id = self.mint(
            request.owner,
            request.token,
            request.provider,
            None,
            Vec::new(),
        )?;

        let token_account = self.state.vault.open(request.provider, request.token)?;
        let token_collector = self.mint(
            request.provider,
            request.token,
            inner,
            Some(token_account),
            DealParams { left: 0 }.encode(),
        )?;

        let main_account =
            self.deposit(request.provider, request.main_coin, request.amount, depositor)?;
        let main_coin_collector = self.mint(
            request.provider,
            request.main_coin,
            inner,
            Some(main_account),
            DealParams { left: 0 }.encode(),
        )?;
        let holder = self.mint(
            request.provider,
            request.main_coin,
            inner,
            Some(main_account),
            DealParams {
                left: request.amount,
            }
            .encode(),
        )?;

        let params = CollateralParams {
            finish: request.finish,
            rate: request.rate,
            token_collector,
            main_coin_collector,
            holder,
            reserved: 0,
        };
        self.set_params(pool_id, params.encode())?;
        Ok(pool_id)
    }

    /// Mints a refund pool over a new schedule and reserves the main coin
    /// its refund would cost.
    pub(crate) fn create_refund(
        &mut self,
        depositor: Address,
        request: &NewRefund,
    ) -> Result<PoolId, LedgerError> {
        self.ensure_approved(request.provider)?;
        let collateral_provider = match self.state.providers.get(request.provider)? {
            ProviderKind::Refund { collateral } => *collateral,
            other => {
                return Err(LedgerError::UnsupportedOperation {
                    provider: other.class(),
                    operation: "create_refund",
                });
            }
        };
        self.state
            .providers
            .ensure_allowed(ProviderClass::Refund, request.schedule.provider)?;

        let collateral = self
            .state
            .entry(request.collateral)
            .map_err(|_| LedgerError::InvalidProviderPoolId(request.collateral))?
            .clone();
        if collateral.provider != collateral_provider || collateral.asset != request.schedule.asset
        {
            return Err(LedgerError::InvalidProviderPoolId(request.collateral));
        }
        let mut terms = CollateralParams::decode(&collateral.params)?;
        if !terms.is_open(self.now) {
            return Err(LedgerError::RefundWindowClosed {
                finish: terms.finish,
            });
        }

        let pool_id = self.mint(
            request.schedule.owner,
            request.schedule.asset,
            request.provider,
            None,
            Vec::new(),
        )?;
        let inner = self.create_schedule_pool(
            depositor,
            &NewPool {
                owner: request.provider,
                ..request.schedule.clone()
            },
        )?;
        let params = RefundParams {
            rate: terms.rate,
            collateral: request.collateral,
            inner,
        };
        let due = params.main_coin_due(self.state.committed(inner)?)?;
        terms.reserve(due, self.state.deal_left(terms.holder)?)?;
        self.set_params(request.collateral, terms.encode())?;
        self.set_params(pool_id, params.encode())?;
        Ok(pool_id)
    }

    /// Deposits into a delay vault at the tier of the owner's new
    /// cumulative total.
    pub(crate) fn delay_deposit(
        &mut self,
        owner: Address,
        provider: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<PoolId, LedgerError> {
        self.ensure_approved(provider)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let total = math::add(self.state.delay_total(provider, owner), amount)?;
        let tier = delay_vault::the_type_of(self.state.delay_tiers(provider)?, total);
        let account = self.deposit(provider, asset, amount, owner)?;
        let pool_id = self.mint(
            owner,
            asset,
            provider,
            Some(account),
            DelayParams { amount, tier }.encode(),
        )?;
        self.state.delay_totals.insert((provider, owner), total);
        Ok(pool_id)
    }

    /// Moves a delay-vault pool to a higher tier.
    pub(crate) fn upgrade_type(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        new_tier: usize,
    ) -> Result<(), LedgerError> {
        let entry = self.authorize_owner(pool_id, caller)?;
        let count = self.state.delay_tiers(entry.provider)?.len();
        let mut params = DelayParams::decode(&entry.params)?;
        let from_tier = params.tier;
        params.upgrade(new_tier, count)?;
        self.set_params(pool_id, params.encode())?;
        let timestamp = self.stamp();
        self.emit(LedgerEvent::TierUpgraded {
            pool_id,
            from_tier,
            to_tier: new_tier,
            timestamp,
        });
        Ok(())
    }

    /// Replaces the stored params of a schedule or fee pool, keeping its
    /// committed amount.
    pub(crate) fn register_pool(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        params: Vec<Amount>,
    ) -> Result<(), LedgerError> {
        if !self.state.registry.is_approved_contract(caller) {
            return Err(LedgerError::ContractNotApproved(caller));
        }
        let entry = self.state.entry(pool_id)?.clone();
        self.ensure_approved(entry.provider)?;
        let expected = self.state.committed(pool_id)?;
        let (schedule, encoded) = match self.state.kind_of(&entry)?.clone() {
            ProviderKind::Deal | ProviderKind::Lock { .. } | ProviderKind::Timed { .. } => {
                let class = self.state.providers.class_of(entry.provider)?;
                let schedule = Schedule::decode(class, &params)?;
                (schedule, schedule.encode())
            }
            ProviderKind::Fee { inner, .. } => {
                let class = self.state.providers.class_of(inner)?;
                let collected = self.state.fee_params(&entry)?.collected;
                let mut fee = FeeParams::decode(class, &params)?;
                fee.collected = collected;
                (fee.schedule, fee.encode())
            }
            other => {
                return Err(LedgerError::UnsupportedOperation {
                    provider: other.class(),
                    operation: "register_pool",
                });
            }
        };
        if schedule.left() != expected {
            return Err(LedgerError::CommittedAmountChanged {
                expected,
                got: schedule.left(),
            });
        }
        if let Schedule::Timed(timed) = schedule {
            if timed.finish <= timed.lock.start {
                return Err(LedgerError::InvalidFinishTime {
                    start: timed.lock.start,
                    finish: timed.finish,
                });
            }
        }
        self.set_params(pool_id, encoded.clone())?;
        let timestamp = self.stamp();
        self.emit(LedgerEvent::PoolRegistered {
            pool_id,
            params: encoded,
            timestamp,
        });
        Ok(())
    }
}
