//! Custody of aggregate per-asset balances.
//!
//! The [`Vault`] is pure bookkeeping: it tracks how much of each asset is
//! custodied per account and queues the matching [`Transfer`]s. Only
//! trustees (providers installed in the ledger) may call its primitives.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::asset_book::Transfer;
use super::{Address, AssetId, VaultAccountId};
use crate::error::LedgerError;
use crate::math::{self, Amount};

/// One custody account, created per deposit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VaultAccount {
    /// Asset held.
    pub asset: AssetId,
    /// Balance currently in custody.
    pub custodied: Amount,
}

/// Custody ledger with a trustee set and an outbox of pending transfers.
#[derive(Debug, Clone, Default)]
pub struct Vault {
    accounts: BTreeMap<VaultAccountId, VaultAccount>,
    totals: BTreeMap<AssetId, Amount>,
    trustees: BTreeSet<Address>,
    next_id: u64,
    outbox: Vec<Transfer>,
}

impl Vault {
    /// Creates an empty vault with no trustees.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `trustee` to the set allowed to deposit and release.
    pub fn add_trustee(&mut self, trustee: Address) {
        self.trustees.insert(trustee);
    }

    /// Returns `true` if `addr` is a trustee.
    #[must_use]
    pub fn is_trustee(&self, addr: Address) -> bool {
        self.trustees.contains(&addr)
    }

    fn ensure_trustee(&self, caller: Address) -> Result<(), LedgerError> {
        if self.is_trustee(caller) {
            Ok(())
        } else {
            Err(LedgerError::NotVaultTrustee(caller))
        }
    }

    /// Pulls `amount` of `asset` from `depositor` into a new account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotVaultTrustee`] for non-trustees and
    /// [`LedgerError::ZeroAmount`] for empty deposits.
    pub fn deposit(
        &mut self,
        trustee: Address,
        asset: AssetId,
        amount: Amount,
        depositor: Address,
    ) -> Result<VaultAccountId, LedgerError> {
        self.ensure_trustee(trustee)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let id = self.open(trustee, asset)?;
        self.credit(id, amount)?;
        self.outbox.push(Transfer::In {
            asset,
            from: depositor,
            amount,
        });
        Ok(id)
    }

    /// Opens an empty account for `asset`, later funded by
    /// [`move_custody`](Self::move_custody).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotVaultTrustee`] for non-trustees.
    pub fn open(&mut self, trustee: Address, asset: AssetId) -> Result<VaultAccountId, LedgerError> {
        self.ensure_trustee(trustee)?;
        let id = VaultAccountId::new(self.next_id);
        self.next_id += 1;
        self.accounts.insert(
            id,
            VaultAccount {
                asset,
                custodied: 0,
            },
        );
        Ok(id)
    }

    /// Pays `amount` out of `account` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientCustody`] if `amount` exceeds the
    /// custodied balance.
    pub fn release(
        &mut self,
        trustee: Address,
        account: VaultAccountId,
        amount: Amount,
        recipient: Address,
    ) -> Result<(), LedgerError> {
        self.ensure_trustee(trustee)?;
        if amount == 0 {
            return Ok(());
        }
        let asset = self.debit(account, amount)?;
        self.outbox.push(Transfer::Out {
            asset,
            to: recipient,
            amount,
        });
        Ok(())
    }

    /// Moves custody between two accounts of the same asset without any
    /// external transfer.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientCustody`] if `from` lacks the
    /// balance, or [`LedgerError::UnknownVaultAccount`] on an asset mismatch.
    pub fn move_custody(
        &mut self,
        trustee: Address,
        from: VaultAccountId,
        to: VaultAccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.ensure_trustee(trustee)?;
        if from == to || amount == 0 {
            return Ok(());
        }
        let from_asset = self.account(from)?.asset;
        if self.account(to)?.asset != from_asset {
            return Err(LedgerError::UnknownVaultAccount(to));
        }
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    /// Returns the account record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownVaultAccount`] if absent.
    pub fn account(&self, id: VaultAccountId) -> Result<&VaultAccount, LedgerError> {
        self.accounts
            .get(&id)
            .ok_or(LedgerError::UnknownVaultAccount(id))
    }

    /// Iterates over every account.
    pub fn accounts(&self) -> impl Iterator<Item = (VaultAccountId, &VaultAccount)> {
        self.accounts.iter().map(|(id, acc)| (*id, acc))
    }

    /// Total custodied for `asset` across all accounts.
    #[must_use]
    pub fn total_custodied(&self, asset: AssetId) -> Amount {
        self.totals.get(&asset).copied().unwrap_or(0)
    }

    /// Drains the transfers queued since the last call.
    pub fn take_outbox(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.outbox)
    }

    fn credit(&mut self, id: VaultAccountId, amount: Amount) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::UnknownVaultAccount(id))?;
        account.custodied = math::add(account.custodied, amount)?;
        let total = self.totals.entry(account.asset).or_insert(0);
        *total = math::add(*total, amount)?;
        Ok(())
    }

    fn debit(&mut self, id: VaultAccountId, amount: Amount) -> Result<AssetId, LedgerError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::UnknownVaultAccount(id))?;
        account.custodied =
            account
                .custodied
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientCustody {
                    account: id,
                    requested: amount,
                    custodied: account.custodied,
                })?;
        let asset = account.asset;
        let total = self.totals.entry(asset).or_insert(0);
        *total = total.saturating_sub(amount);
        Ok(asset)
    }
}
