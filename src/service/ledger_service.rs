//! Ledger service: serialized async front over the ledger.

use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::batch::{MultiWithdrawReport, Recipient};
use crate::deploy::StandardProviders;
use crate::domain::{
    Address, AssetBook, AssetId, Balances, EventBus, PoolId, PoolSnapshot, SplitPayload,
    SplitRequest, TransferOutcome, WithdrawOutcome,
};
use crate::error::LedgerError;
use crate::ledger::{Ledger, NewCollateral, NewPool, NewRefund};
use crate::math::Amount;
use crate::providers::ProviderKind;

/// Result of a committed call, tagged with its transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt<T> {
    /// Identifier shared by the log lines of the call.
    pub tx_id: Uuid,
    /// Value returned by the operation.
    pub value: T,
}

/// Orchestration layer for all ledger operations.
///
/// Owns the [`Ledger`] behind a [`tokio::sync::Mutex`], so calls are
/// strictly serialized: one writer, each call running to completion.
/// Every mutation follows the pattern: acquire lock → run the transaction
/// → drain its committed events → publish them → return a [`Receipt`].
#[derive(Debug)]
pub struct LedgerService<B: AssetBook = Balances> {
    ledger: Arc<Mutex<Ledger<B>>>,
    event_bus: EventBus,
}

impl<B: AssetBook> Clone for LedgerService<B> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            event_bus: self.event_bus.clone(),
        }
    }
}

impl<B: AssetBook> LedgerService<B> {
    /// Wraps `ledger`, sizing the event bus from its configuration.
    #[must_use]
    pub fn new(ledger: Ledger<B>) -> Self {
        let event_bus = EventBus::new(ledger.config().event_bus_capacity);
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the shared ledger handle.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Mutex<Ledger<B>>> {
        &self.ledger
    }

    async fn execute<T: Debug>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut Ledger<B>) -> Result<T, LedgerError>,
    ) -> Result<Receipt<T>, LedgerError> {
        let tx_id = Uuid::new_v4();
        let mut ledger = self.ledger.lock().await;
        match op(&mut ledger) {
            Ok(value) => {
                let events = ledger.take_events();
                drop(ledger);
                let count = events.len();
                self.event_bus.publish_all(events);
                tracing::info!(%tx_id, operation, events = count, ?value, "transaction committed");
                Ok(Receipt { tx_id, value })
            }
            Err(err) => {
                drop(ledger);
                tracing::warn!(
                    %tx_id,
                    operation,
                    error = %err,
                    code = err.error_code(),
                    "transaction rejected"
                );
                Err(err)
            }
        }
    }

    /// Deploys the standard provider graph.
    ///
    /// # Errors
    ///
    /// See [`StandardProviders::deploy`].
    pub async fn deploy_standard(
        &self,
        caller: Address,
        fee_collector: Address,
    ) -> Result<Receipt<StandardProviders>, LedgerError> {
        self.execute("deploy_standard", |ledger| {
            StandardProviders::deploy(ledger, caller, fee_collector)
        })
        .await
    }

    /// Installs a provider.
    ///
    /// # Errors
    ///
    /// See [`Ledger::install_provider`].
    pub async fn install_provider(
        &self,
        caller: Address,
        kind: ProviderKind,
    ) -> Result<Receipt<Address>, LedgerError> {
        self.execute("install_provider", |ledger| ledger.install_provider(caller, kind))
            .await
    }

    /// Changes the approval of a provider.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_approved_provider`].
    pub async fn set_approved_provider(
        &self,
        caller: Address,
        provider: Address,
        approved: bool,
    ) -> Result<Receipt<()>, LedgerError> {
        self.execute("set_approved_provider", |ledger| {
            ledger.set_approved_provider(caller, provider, approved)
        })
        .await
    }

    /// Changes the approval of a contract.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_approved_contract`].
    pub async fn set_approved_contract(
        &self,
        caller: Address,
        contract: Address,
        approved: bool,
    ) -> Result<Receipt<()>, LedgerError> {
        self.execute("set_approved_contract", |ledger| {
            ledger.set_approved_contract(caller, contract, approved)
        })
        .await
    }

    /// Delegates or revokes an operator.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_operator`].
    pub async fn set_operator(
        &self,
        owner: Address,
        operator: Address,
        approved: bool,
    ) -> Result<Receipt<()>, LedgerError> {
        self.execute("set_operator", |ledger| {
            ledger.set_operator(owner, operator, approved)
        })
        .await
    }

    /// Creates a schedule pool.
    ///
    /// # Errors
    ///
    /// See [`Ledger::create_pool`].
    pub async fn create_pool(
        &self,
        depositor: Address,
        request: NewPool,
    ) -> Result<Receipt<PoolId>, LedgerError> {
        self.execute("create_pool", |ledger| ledger.create_pool(depositor, request))
            .await
    }

    /// Creates a bundle.
    ///
    /// # Errors
    ///
    /// See [`Ledger::create_bundle`].
    pub async fn create_bundle(
        &self,
        depositor: Address,
        owner: Address,
        asset: AssetId,
        provider: Address,
        providers: Vec<Address>,
        params: Vec<Vec<Amount>>,
    ) -> Result<Receipt<PoolId>, LedgerError> {
        self.execute("create_bundle", |ledger| {
            ledger.create_bundle(depositor, owner, asset, provider, &providers, &params)
        })
        .await
    }

    /// Opens a collateral escrow.
    ///
    /// # Errors
    ///
    /// See [`Ledger::create_collateral`].
    pub async fn create_collateral(
        &self,
        depositor: Address,
        request: NewCollateral,
    ) -> Result<Receipt<PoolId>, LedgerError> {
        self.execute("create_collateral", |ledger| {
            ledger.create_collateral(depositor, request)
        })
        .await
    }

    /// Creates a refundable schedule.
    ///
    /// # Errors
    ///
    /// See [`Ledger::create_refund`].
    pub async fn create_refund(
        &self,
        depositor: Address,
        request: NewRefund,
    ) -> Result<Receipt<PoolId>, LedgerError> {
        self.execute("create_refund", |ledger| ledger.create_refund(depositor, request))
            .await
    }

    /// Deposits into a delay vault.
    ///
    /// # Errors
    ///
    /// See [`Ledger::delay_deposit`].
    pub async fn delay_deposit(
        &self,
        depositor: Address,
        provider: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<Receipt<PoolId>, LedgerError> {
        self.execute("delay_deposit", |ledger| {
            ledger.delay_deposit(depositor, provider, asset, amount)
        })
        .await
    }

    /// Upgrades the tier of a delay-vault pool.
    ///
    /// # Errors
    ///
    /// See [`Ledger::upgrade_type`].
    pub async fn upgrade_type(
        &self,
        caller: Address,
        pool_id: PoolId,
        new_tier: usize,
    ) -> Result<Receipt<()>, LedgerError> {
        self.execute("upgrade_type", |ledger| {
            ledger.upgrade_type(caller, pool_id, new_tier)
        })
        .await
    }

    /// Re-registers a pool's params.
    ///
    /// # Errors
    ///
    /// See [`Ledger::register_pool`].
    pub async fn register_pool(
        &self,
        caller: Address,
        pool_id: PoolId,
        params: Vec<Amount>,
    ) -> Result<Receipt<()>, LedgerError> {
        self.execute("register_pool", |ledger| {
            ledger.register_pool(caller, pool_id, params)
        })
        .await
    }

    /// Withdraws a pool.
    ///
    /// # Errors
    ///
    /// See [`Ledger::withdraw`].
    pub async fn withdraw(
        &self,
        caller: Address,
        pool_id: PoolId,
    ) -> Result<Receipt<WithdrawOutcome>, LedgerError> {
        self.execute("withdraw", |ledger| ledger.withdraw(caller, pool_id))
            .await
    }

    /// Splits a pool.
    ///
    /// # Errors
    ///
    /// See [`Ledger::split`].
    pub async fn split(
        &self,
        caller: Address,
        pool_id: PoolId,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<Receipt<PoolId>, LedgerError> {
        self.execute("split", |ledger| {
            ledger.split(caller, pool_id, request, new_owner)
        })
        .await
    }

    /// Transfers a pool's ownership token.
    ///
    /// # Errors
    ///
    /// See [`Ledger::transfer`].
    pub async fn transfer(
        &self,
        caller: Address,
        pool_id: PoolId,
        to: Address,
        payload: Option<SplitPayload>,
    ) -> Result<Receipt<TransferOutcome>, LedgerError> {
        self.execute("transfer", |ledger| {
            ledger.transfer(caller, pool_id, to, payload)
        })
        .await
    }

    /// Withdraws every pool of `caller`.
    ///
    /// # Errors
    ///
    /// See [`Ledger::multi_withdraw`].
    pub async fn multi_withdraw(
        &self,
        caller: Address,
    ) -> Result<Receipt<MultiWithdrawReport>, LedgerError> {
        self.execute("multi_withdraw", |ledger| ledger.multi_withdraw(caller))
            .await
    }

    /// Creates one pool per recipient.
    ///
    /// # Errors
    ///
    /// See [`Ledger::mass_create`].
    pub async fn mass_create(
        &self,
        depositor: Address,
        provider: Address,
        asset: AssetId,
        schedule: Vec<Amount>,
        recipients: Vec<Recipient>,
    ) -> Result<Receipt<Vec<PoolId>>, LedgerError> {
        self.execute("mass_create", |ledger| {
            ledger.mass_create(depositor, provider, asset, &schedule, &recipients)
        })
        .await
    }

    /// Snapshot of a live pool.
    ///
    /// # Errors
    ///
    /// See [`Ledger::get_data`].
    pub async fn get_data(&self, pool_id: PoolId) -> Result<PoolSnapshot, LedgerError> {
        self.ledger.lock().await.get_data(pool_id)
    }

    /// Live pools owned by `owner`.
    pub async fn pools_of(&self, owner: Address) -> Vec<PoolId> {
        self.ledger.lock().await.pools_of(owner)
    }

    /// Audits custody against commitments.
    ///
    /// # Errors
    ///
    /// See [`Ledger::check_solvency`].
    pub async fn check_solvency(&self) -> Result<(), LedgerError> {
        self.ledger.lock().await.check_solvency()
    }
}
