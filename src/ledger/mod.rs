//! The ownership registry: single entry point for every pool mutation.
//!
//! [`Ledger`] owns the pool table, the custody vault, the provider graph
//! and the external asset book. Every mutating call runs as one
//! transaction: state and book are snapshotted, the operation runs on a
//! [`Tx`](tx::Tx) with a single clock reading, custody releases are applied
//! after all ledger-side changes, queued asset transfers are handed to the
//! book, and solvency is optionally audited. Any error restores the
//! snapshot, so a failed call leaves no trace.

mod create;
mod split;
pub(crate) mod state;
mod transfer;
pub(crate) mod tx;
mod withdraw;

use std::sync::Arc;

pub use create::{NewCollateral, NewPool, NewRefund};

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::domain::{
    Address, AssetBook, AssetId, Balances, LedgerEvent, PoolId, PoolSnapshot, SplitPayload,
    SplitRequest, TransferOutcome, Vault, WithdrawOutcome,
};
use crate::error::LedgerError;
use crate::math::{Amount, Timestamp};
use crate::providers::{ProviderGraph, ProviderKind, delay_vault};
use state::LedgerState;
use tx::Tx;

/// Address of the registry itself. Transfers to it trigger withdrawals
/// or, with a payload, splits.
pub const REGISTRY_ADDRESS: Address = Address::system(0, 0);

/// Ownership registry, custody vault and provider graph.
#[derive(Debug)]
pub struct Ledger<B: AssetBook = Balances> {
    state: LedgerState,
    book: B,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    committed: Vec<LedgerEvent>,
}

impl<B: AssetBook> Ledger<B> {
    /// Creates an empty ledger administered by `owner`.
    #[must_use]
    pub fn new(owner: Address, book: B, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            state: LedgerState::new(owner),
            book,
            clock,
            config,
            committed: Vec::new(),
        }
    }

    /// Runs `op` as one all-or-nothing transaction.
    ///
    /// The rollback snapshot is a full clone of the ledger state (pool
    /// table, vault, provider graph, delay totals) and of the asset book,
    /// so every call costs O(live pools + accounts + balances) in time and
    /// memory regardless of how few pools it touches.
    pub(crate) fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Tx<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let state = self.state.clone();
        let book = self.book.clone();
        let now = self.clock.now();
        match self.run(now, op) {
            Ok(value) => {
                self.committed.append(&mut self.state.events);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "transaction rolled back");
                self.state = state;
                self.book = book;
                Err(err)
            }
        }
    }

    fn run<T>(
        &mut self,
        now: Timestamp,
        op: impl FnOnce(&mut Tx<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut tx = Tx::new(&mut self.state, now);
        let value = op(&mut tx)?;
        tx.settle()?;
        for transfer in self.state.vault.take_outbox() {
            self.book.apply(transfer)?;
        }
        if self.config.audit_solvency {
            self.state.check_solvency()?;
        }
        Ok(value)
    }

    // -- administration --------------------------------------------------

    /// Installs a provider and makes it a vault trustee. The provider
    /// still has to be approved before pools may name it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotRegistryOwner`] for other callers and the
    /// composition errors of [`ProviderGraph::install`].
    pub fn install_provider(
        &mut self,
        caller: Address,
        kind: ProviderKind,
    ) -> Result<Address, LedgerError> {
        let provider = self.transact(|tx| {
            tx.state.registry.ensure_registry_owner(caller)?;
            tx.install_provider(kind)
        })?;
        tracing::info!(%provider, "provider installed");
        Ok(provider)
    }

    /// Adds or removes an installed provider from the approval set.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotRegistryOwner`] or
    /// [`LedgerError::UnknownProvider`].
    pub fn set_approved_provider(
        &mut self,
        caller: Address,
        provider: Address,
        approved: bool,
    ) -> Result<(), LedgerError> {
        self.transact(|tx| {
            tx.state.registry.ensure_registry_owner(caller)?;
            tx.approve_provider(provider, approved)
        })?;
        tracing::info!(%provider, approved, "provider approval changed");
        Ok(())
    }

    /// Adds or removes a contract from the approval set.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotRegistryOwner`] or
    /// [`LedgerError::ZeroAddress`].
    pub fn set_approved_contract(
        &mut self,
        caller: Address,
        contract: Address,
        approved: bool,
    ) -> Result<(), LedgerError> {
        self.transact(|tx| {
            tx.state.registry.ensure_registry_owner(caller)?;
            contract.non_zero()?;
            tx.state.registry.set_approved_contract(contract, approved);
            let timestamp = tx.stamp();
            tx.emit(LedgerEvent::ContractApprovalChanged {
                contract,
                approved,
                timestamp,
            });
            Ok(())
        })?;
        tracing::info!(%contract, approved, "contract approval changed");
        Ok(())
    }

    /// Lets `operator` act on every public pool of `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAddress`] for a zero operator.
    pub fn set_operator(
        &mut self,
        owner: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), LedgerError> {
        self.transact(|tx| {
            owner.non_zero()?;
            operator.non_zero()?;
            tx.state.registry.set_operator(owner, operator, approved);
            let timestamp = tx.stamp();
            tx.emit(LedgerEvent::OperatorChanged {
                owner,
                operator,
                approved,
                timestamp,
            });
            Ok(())
        })
    }

    // -- creation --------------------------------------------------------

    /// Creates a Deal, Lock, Timed or Fee pool funded by `depositor`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ProviderNotApproved`] for unapproved
    /// providers, the provider's validation errors, and
    /// [`LedgerError::InsufficientBalance`] if the depositor cannot pay.
    pub fn create_pool(&mut self, depositor: Address, request: NewPool) -> Result<PoolId, LedgerError> {
        let pool_id = self.transact(|tx| tx.create_schedule_pool(depositor, &request))?;
        tracing::info!(%pool_id, owner = %request.owner, provider = %request.provider, "pool created");
        Ok(pool_id)
    }

    /// Creates a bundle parent over one child pool per provider, owned by
    /// `owner` and funded by `depositor`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ProvidersParamsLengthMismatch`],
    /// [`LedgerError::InvalidAddressesLength`] for fewer than two
    /// children, [`LedgerError::InvalidProviderType`] for a disallowed
    /// child provider, and the child creation errors.
    pub fn create_bundle(
        &mut self,
        depositor: Address,
        owner: Address,
        asset: AssetId,
        provider: Address,
        providers: &[Address],
        params: &[Vec<Amount>],
    ) -> Result<PoolId, LedgerError> {
        let pool_id = self.transact(|tx| {
            tx.create_bundle(depositor, owner, asset, provider, providers, params)
        })?;
        tracing::info!(%pool_id, %owner, children = providers.len(), "bundle created");
        Ok(pool_id)
    }

    /// Opens a collateral escrow funded in main coin by `depositor`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] for a zero amount or rate,
    /// [`LedgerError::InvalidFinishTime`] for a finish not in the future,
    /// and the custody errors of the deposit.
    pub fn create_collateral(
        &mut self,
        depositor: Address,
        request: NewCollateral,
    ) -> Result<PoolId, LedgerError> {
        let pool_id = self.transact(|tx| tx.create_collateral(depositor, &request))?;
        tracing::info!(%pool_id, owner = %request.owner, amount = request.amount, "collateral created");
        Ok(pool_id)
    }

    /// Creates a refundable schedule backed by an open collateral pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidProviderType`] for a non-schedule
    /// inner provider, [`LedgerError::InvalidProviderPoolId`] when the
    /// collateral pool does not belong to the refund's collateral provider
    /// or escrows another token, [`LedgerError::RefundWindowClosed`] and
    /// [`LedgerError::InsufficientCollateral`].
    pub fn create_refund(
        &mut self,
        depositor: Address,
        request: NewRefund,
    ) -> Result<PoolId, LedgerError> {
        let pool_id = self.transact(|tx| tx.create_refund(depositor, &request))?;
        tracing::info!(%pool_id, collateral = %request.collateral, "refund pool created");
        Ok(pool_id)
    }

    /// Deposits `amount` of `asset` into a delay vault for `depositor`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] and the custody errors.
    pub fn delay_deposit(
        &mut self,
        depositor: Address,
        provider: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<PoolId, LedgerError> {
        let pool_id = self.transact(|tx| tx.delay_deposit(depositor, provider, asset, amount))?;
        tracing::info!(%pool_id, %depositor, amount, "delay deposit");
        Ok(pool_id)
    }

    /// Moves a delay-vault pool to a higher tier.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTier`] unless the move is forward and
    /// inside the table.
    pub fn upgrade_type(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        new_tier: usize,
    ) -> Result<(), LedgerError> {
        self.transact(|tx| tx.upgrade_type(caller, pool_id, new_tier))
    }

    /// Replaces the params of a schedule pool. Approved contracts only.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ContractNotApproved`],
    /// [`LedgerError::CommittedAmountChanged`] and, for timed schedules,
    /// [`LedgerError::InvalidStartAmount`] when the principal is below the
    /// left amount.
    pub fn register_pool(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        params: Vec<Amount>,
    ) -> Result<(), LedgerError> {
        self.transact(|tx| tx.register_pool(caller, pool_id, params))?;
        tracing::info!(%pool_id, %caller, "pool registered");
        Ok(())
    }

    // -- settlement ------------------------------------------------------

    /// Withdraws everything due from a pool to its owner.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PoolTerminal`] once the pool was burned,
    /// [`LedgerError::NotPoolOwner`], [`LedgerError::ProviderOwnedPool`]
    /// and [`LedgerError::FeeNotCollected`].
    pub fn withdraw(&mut self, caller: Address, pool_id: PoolId) -> Result<WithdrawOutcome, LedgerError> {
        let outcome = self.transact(|tx| tx.withdraw(caller, pool_id))?;
        tracing::info!(%pool_id, released = outcome.released, is_final = outcome.is_final, "pool withdrawn");
        Ok(outcome)
    }

    /// Splits part of a pool into a new pool owned by `new_owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SplitExceeded`] when the request exceeds the
    /// live amount and [`LedgerError::InvalidSplit`] when it would leave a
    /// zero-value side.
    pub fn split(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        request: SplitRequest,
        new_owner: Address,
    ) -> Result<PoolId, LedgerError> {
        let new_pool_id = self.transact(|tx| tx.split(caller, pool_id, request, new_owner))?;
        tracing::info!(%pool_id, %new_pool_id, %new_owner, "pool split");
        Ok(new_pool_id)
    }

    /// Transfers the ownership token of a pool, running the hook.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransferTarget`] for a target with no
    /// meaning for this pool and the errors of the triggered operation.
    pub fn transfer(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        to: Address,
        payload: Option<SplitPayload>,
    ) -> Result<TransferOutcome, LedgerError> {
        let outcome = self.transact(|tx| tx.transfer_pool(caller, pool_id, to, payload))?;
        tracing::info!(%pool_id, %to, ?outcome, "pool transferred");
        Ok(outcome)
    }

    // -- queries ---------------------------------------------------------

    /// Snapshot of a live pool with resolved params.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownPool`] or [`LedgerError::PoolTerminal`].
    pub fn get_data(&self, pool_id: PoolId) -> Result<PoolSnapshot, LedgerError> {
        self.state.snapshot(pool_id, self.clock.now())
    }

    /// Amount a withdrawal would release now.
    ///
    /// # Errors
    ///
    /// Same as [`get_data`](Self::get_data).
    pub fn withdrawable(&self, pool_id: PoolId) -> Result<Amount, LedgerError> {
        self.state.withdrawable(pool_id, self.clock.now())
    }

    /// Amount still committed by a pool.
    ///
    /// # Errors
    ///
    /// Same as [`get_data`](Self::get_data).
    pub fn committed(&self, pool_id: PoolId) -> Result<Amount, LedgerError> {
        self.state.committed(pool_id)
    }

    /// Sum of the live children of a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidProviderPoolId`] unless `pool_id` is
    /// a live bundle parent.
    pub fn total_remaining(&self, pool_id: PoolId) -> Result<Amount, LedgerError> {
        self.state.bundle_params(pool_id)?;
        self.state.committed(pool_id)
    }

    /// Live pools owned by `owner`, in id order.
    #[must_use]
    pub fn pools_of(&self, owner: Address) -> Vec<PoolId> {
        self.state.registry.pools_of(owner)
    }

    /// Tier a cumulative deposit of `amount` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnsupportedOperation`] unless `provider` is
    /// a delay vault.
    pub fn the_type_of(&self, provider: Address, amount: Amount) -> Result<usize, LedgerError> {
        Ok(delay_vault::the_type_of(self.state.delay_tiers(provider)?, amount))
    }

    /// Cumulative unsettled delay-vault deposits of `user`.
    #[must_use]
    pub fn user_total(&self, provider: Address, user: Address) -> Amount {
        self.state.delay_total(provider, user)
    }

    /// Audits custody against the commitments of every live pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SolvencyViolation`] for the first account
    /// found short.
    pub fn check_solvency(&self) -> Result<(), LedgerError> {
        self.state.check_solvency()
    }

    /// Address administering approvals.
    #[must_use]
    pub const fn registry_owner(&self) -> Address {
        self.state.registry.owner()
    }

    /// Whether `provider` is approved.
    #[must_use]
    pub fn is_approved_provider(&self, provider: Address) -> bool {
        self.state.registry.is_approved_provider(provider)
    }

    /// The installed provider graph.
    #[must_use]
    pub const fn providers(&self) -> &ProviderGraph {
        &self.state.providers
    }

    /// The custody vault.
    #[must_use]
    pub const fn vault(&self) -> &Vault {
        &self.state.vault
    }

    /// The external asset book.
    #[must_use]
    pub const fn book(&self) -> &B {
        &self.book
    }

    /// Mutable access to the asset book, for funding accounts.
    pub const fn book_mut(&mut self) -> &mut B {
        &mut self.book
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current ledger time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Drains the events of committed transactions.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.committed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::providers::ProviderClass;

    const ADMIN: Address = Address::from_low_u64(1);
    const ALICE: Address = Address::from_low_u64(2);
    const BOB: Address = Address::from_low_u64(3);
    const TOKEN: AssetId = AssetId::new(Address::from_low_u64(100));

    fn ledger() -> (Ledger, Address) {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut ledger = Ledger::new(ADMIN, Balances::new(), clock, LedgerConfig::default());
        let Ok(deal) = ledger.install_provider(ADMIN, ProviderKind::Deal) else {
            panic!("install deal");
        };
        let Ok(()) = ledger.set_approved_provider(ADMIN, deal, true) else {
            panic!("approve deal");
        };
        let Ok(()) = ledger.book_mut().mint(TOKEN, ALICE, 1_000_000) else {
            panic!("fund alice");
        };
        (ledger, deal)
    }

    fn deal_pool(ledger: &mut Ledger, deal: Address, amount: Amount) -> PoolId {
        let request = NewPool {
            owner: ALICE,
            asset: TOKEN,
            provider: deal,
            params: vec![amount],
        };
        let Ok(pool_id) = ledger.create_pool(ALICE, request) else {
            panic!("create deal pool");
        };
        pool_id
    }

    #[test]
    fn only_owner_installs_providers() {
        let (mut ledger, _) = ledger();
        assert_eq!(
            ledger.install_provider(ALICE, ProviderKind::Deal),
            Err(LedgerError::NotRegistryOwner(ALICE))
        );
    }

    #[test]
    fn unapproved_provider_cannot_mint() {
        let (mut ledger, _) = ledger();
        let Ok(deal) = ledger.install_provider(ADMIN, ProviderKind::Deal) else {
            panic!("install");
        };
        let request = NewPool {
            owner: ALICE,
            asset: TOKEN,
            provider: deal,
            params: vec![10],
        };
        assert_eq!(
            ledger.create_pool(ALICE, request),
            Err(LedgerError::ProviderNotApproved(deal))
        );
    }

    #[test]
    fn create_pulls_funds_into_custody() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        assert_eq!(ledger.book().balance_of(TOKEN, ALICE), 999_600);
        assert_eq!(ledger.vault().total_custodied(TOKEN), 400);
        let Ok(snapshot) = ledger.get_data(pool_id) else {
            panic!("snapshot");
        };
        assert_eq!(snapshot.provider_class, ProviderClass::Deal);
        assert_eq!(snapshot.params, vec![400]);
        assert_eq!(snapshot.withdrawable, 400);
    }

    #[test]
    fn withdraw_burns_then_rejects_repeats() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        let Ok(outcome) = ledger.withdraw(ALICE, pool_id) else {
            panic!("withdraw");
        };
        assert_eq!(outcome.released, 400);
        assert!(outcome.is_final);
        assert_eq!(ledger.book().balance_of(TOKEN, ALICE), 1_000_000);
        assert_eq!(
            ledger.withdraw(ALICE, pool_id),
            Err(LedgerError::PoolTerminal(pool_id))
        );
    }

    #[test]
    fn stranger_cannot_withdraw() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        assert_eq!(
            ledger.withdraw(BOB, pool_id),
            Err(LedgerError::NotPoolOwner {
                pool_id,
                caller: BOB
            })
        );
    }

    #[test]
    fn operator_withdraws_to_owner() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        let Ok(()) = ledger.set_operator(ALICE, BOB, true) else {
            panic!("set operator");
        };
        let Ok(_) = ledger.withdraw(BOB, pool_id) else {
            panic!("operator withdraw");
        };
        assert_eq!(ledger.book().balance_of(TOKEN, BOB), 0);
        assert_eq!(ledger.book().balance_of(TOKEN, ALICE), 1_000_000);
    }

    #[test]
    fn failed_call_leaves_state_untouched() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        let _ = ledger.take_events();
        let before = ledger.book().clone();
        let result = ledger.split(ALICE, pool_id, SplitRequest::Amount(401), BOB);
        assert_eq!(
            result,
            Err(LedgerError::SplitExceeded {
                requested: 401,
                available: 400
            })
        );
        assert_eq!(ledger.book(), &before);
        assert_eq!(ledger.committed(pool_id), Ok(400));
        assert!(ledger.pools_of(BOB).is_empty());
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn plain_transfer_changes_owner() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        let Ok(outcome) = ledger.transfer(ALICE, pool_id, BOB, None) else {
            panic!("transfer");
        };
        assert_eq!(outcome, TransferOutcome::Transferred);
        assert_eq!(ledger.pools_of(BOB), vec![pool_id]);
    }

    #[test]
    fn transfer_to_registry_withdraws() {
        let (mut ledger, deal) = ledger();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        let Ok(TransferOutcome::Withdrawn(outcome)) =
            ledger.transfer(ALICE, pool_id, REGISTRY_ADDRESS, None)
        else {
            panic!("withdraw by transfer");
        };
        assert_eq!(outcome.released, 400);
    }

    #[test]
    fn committed_events_are_recorded_in_order() {
        let (mut ledger, deal) = ledger();
        let _ = ledger.take_events();
        let pool_id = deal_pool(&mut ledger, deal, 400);
        let events = ledger.take_events();
        let kinds: Vec<&str> = events.iter().map(LedgerEvent::event_type_str).collect();
        assert_eq!(kinds, vec!["vault_deposited", "pool_created"]);
        assert_eq!(events.last().and_then(LedgerEvent::pool_id), Some(pool_id));
    }
}
