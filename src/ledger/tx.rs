//! One in-flight ledger transaction.
//!
//! A [`Tx`] borrows the ledger state mutably for the length of one call
//! and carries the single clock reading every provider in the call sees.
//! Vault releases are queued as payouts and only applied in
//! [`Tx::settle`], after every pool update and burn of the call.

use chrono::{DateTime, Utc};

use super::REGISTRY_ADDRESS;
use super::state::LedgerState;
use crate::domain::{Address, AssetId, LedgerEvent, PoolEntry, PoolId, VaultAccountId};
use crate::error::LedgerError;
use crate::math::{Amount, Timestamp};
use crate::providers::ProviderKind;

/// A release owed to `recipient`, applied at settlement.
#[derive(Debug, Clone, Copy)]
struct Payout {
    trustee: Address,
    account: VaultAccountId,
    amount: Amount,
    recipient: Address,
}

/// Mutable view of the ledger for one call.
#[derive(Debug)]
pub(crate) struct Tx<'a> {
    pub(crate) state: &'a mut LedgerState,
    pub(crate) now: Timestamp,
    payouts: Vec<Payout>,
}

impl<'a> Tx<'a> {
    pub(crate) fn new(state: &'a mut LedgerState, now: Timestamp) -> Self {
        Self {
            state,
            now,
            payouts: Vec::new(),
        }
    }

    /// Event timestamp derived from the transaction clock.
    pub(crate) fn stamp(&self) -> DateTime<Utc> {
        i64::try_from(self.now)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_default()
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.state.events.push(event);
    }

    /// Fails unless `provider` is installed and approved.
    pub(crate) fn ensure_approved(&self, provider: Address) -> Result<(), LedgerError> {
        self.state.providers.get(provider)?;
        if self.state.registry.is_approved_provider(provider) {
            Ok(())
        } else {
            Err(LedgerError::ProviderNotApproved(provider))
        }
    }

    /// Rejects pools held by a provider on behalf of a composite pool.
    pub(crate) fn ensure_public(&self, entry: &PoolEntry) -> Result<(), LedgerError> {
        if entry.owner == REGISTRY_ADDRESS || self.state.providers.contains(entry.owner) {
            Err(LedgerError::ProviderOwnedPool(entry.pool_id))
        } else {
            Ok(())
        }
    }

    /// Owner or delegated operator of a public pool.
    pub(crate) fn authorize_owner(
        &self,
        pool_id: PoolId,
        caller: Address,
    ) -> Result<PoolEntry, LedgerError> {
        let entry = self.state.registry.get(pool_id)?;
        self.ensure_public(entry)?;
        let entry = self.state.registry.ensure_owner_or_operator(pool_id, caller)?;
        Ok(entry.clone())
    }

    /// Owner, operator, or approved contract acting for the owner.
    pub(crate) fn authorize_withdraw(
        &self,
        pool_id: PoolId,
        caller: Address,
    ) -> Result<PoolEntry, LedgerError> {
        let entry = self.state.registry.get(pool_id)?;
        if self.state.registry.is_approved_contract(caller) {
            self.ensure_public(entry)?;
            return Ok(entry.clone());
        }
        self.authorize_owner(pool_id, caller)
    }

    /// Installs a provider, registers it as vault trustee and records it.
    pub(crate) fn install_provider(&mut self, kind: ProviderKind) -> Result<Address, LedgerError> {
        let class = kind.class();
        let provider = self.state.providers.install(kind)?;
        self.state.vault.add_trustee(provider);
        let timestamp = self.stamp();
        self.emit(LedgerEvent::ProviderInstalled {
            provider,
            class,
            timestamp,
        });
        Ok(provider)
    }

    pub(crate) fn approve_provider(&mut self, provider: Address, approved: bool) -> Result<(), LedgerError> {
        self.state.providers.get(provider)?;
        self.state.registry.set_approved_provider(provider, approved);
        let timestamp = self.stamp();
        self.emit(LedgerEvent::ProviderApprovalChanged {
            provider,
            approved,
            timestamp,
        });
        Ok(())
    }

    pub(crate) fn mint(
        &mut self,
        owner: Address,
        asset: AssetId,
        provider: Address,
        vault_account: Option<VaultAccountId>,
        params: Vec<Amount>,
    ) -> Result<PoolId, LedgerError> {
        let pool_id =
            self.state
                .registry
                .mint(owner, asset, provider, vault_account, params.clone())?;
        tracing::debug!(%pool_id, %owner, %provider, "pool minted");
        let timestamp = self.stamp();
        self.emit(LedgerEvent::PoolCreated {
            pool_id,
            owner,
            asset,
            provider,
            params,
            timestamp,
        });
        Ok(pool_id)
    }

    pub(crate) fn set_params(&mut self, pool_id: PoolId, params: Vec<Amount>) -> Result<(), LedgerError> {
        self.state.registry.set_params(pool_id, params)
    }

    pub(crate) fn burn(&mut self, pool_id: PoolId) -> Result<(), LedgerError> {
        self.state.registry.burn(pool_id)?;
        tracing::debug!(%pool_id, "pool burned");
        let timestamp = self.stamp();
        self.emit(LedgerEvent::PoolBurned { pool_id, timestamp });
        Ok(())
    }

    pub(crate) fn deposit(
        &mut self,
        trustee: Address,
        asset: AssetId,
        amount: Amount,
        depositor: Address,
    ) -> Result<VaultAccountId, LedgerError> {
        let account = self.state.vault.deposit(trustee, asset, amount, depositor)?;
        let timestamp = self.stamp();
        self.emit(LedgerEvent::VaultDeposited {
            account,
            asset,
            depositor,
            amount,
            timestamp,
        });
        Ok(account)
    }

    /// Queues a release; zero amounts are dropped.
    pub(crate) fn pay(
        &mut self,
        trustee: Address,
        account: VaultAccountId,
        amount: Amount,
        recipient: Address,
    ) {
        if amount > 0 {
            self.payouts.push(Payout {
                trustee,
                account,
                amount,
                recipient,
            });
        }
    }

    /// Applies queued payouts to the vault. Runs after every ledger-side
    /// change of the call.
    pub(crate) fn settle(&mut self) -> Result<(), LedgerError> {
        for payout in std::mem::take(&mut self.payouts) {
            self.state.vault.release(
                payout.trustee,
                payout.account,
                payout.amount,
                payout.recipient,
            )?;
            let timestamp = self.stamp();
            self.emit(LedgerEvent::VaultReleased {
                account: payout.account,
                recipient: payout.recipient,
                amount: payout.amount,
                timestamp,
            });
        }
        Ok(())
    }
}
