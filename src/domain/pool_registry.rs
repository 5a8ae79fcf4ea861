//! Canonical pool table with ownership and approval checks.
//!
//! [`PoolRegistry`] is the single owned store of pool records, keyed by
//! [`PoolId`]. It mints ids from a monotonic counter, burns terminal
//! pools, and answers every authorization question the ledger asks:
//! registry ownership, provider approval, contract approval, and
//! per-owner operator delegation.

use std::collections::{BTreeMap, BTreeSet};

use super::{Address, AssetId, PoolEntry, PoolId, VaultAccountId};
use crate::error::LedgerError;
use crate::math::Amount;

/// Pool table plus the approval registry.
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    owner: Address,
    pools: BTreeMap<PoolId, PoolEntry>,
    next_id: u64,
    approved_providers: BTreeSet<Address>,
    approved_contracts: BTreeSet<Address>,
    operators: BTreeSet<(Address, Address)>,
}

impl PoolRegistry {
    /// Creates an empty registry administered by `owner`.
    #[must_use]
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            pools: BTreeMap::new(),
            next_id: 0,
            approved_providers: BTreeSet::new(),
            approved_contracts: BTreeSet::new(),
            operators: BTreeSet::new(),
        }
    }

    /// Returns the registry owner.
    #[must_use]
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Fails unless `caller` is the registry owner.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotRegistryOwner`] otherwise.
    pub fn ensure_registry_owner(&self, caller: Address) -> Result<(), LedgerError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(LedgerError::NotRegistryOwner(caller))
        }
    }

    /// Adds or removes `provider` from the approval set.
    pub fn set_approved_provider(&mut self, provider: Address, approved: bool) {
        if approved {
            self.approved_providers.insert(provider);
        } else {
            self.approved_providers.remove(&provider);
        }
    }

    /// Returns `true` if `provider` may control pools.
    #[must_use]
    pub fn is_approved_provider(&self, provider: Address) -> bool {
        self.approved_providers.contains(&provider)
    }

    /// Adds or removes `contract` from the approved-contract set.
    pub fn set_approved_contract(&mut self, contract: Address, approved: bool) {
        if approved {
            self.approved_contracts.insert(contract);
        } else {
            self.approved_contracts.remove(&contract);
        }
    }

    /// Returns `true` if `contract` is approved.
    #[must_use]
    pub fn is_approved_contract(&self, contract: Address) -> bool {
        self.approved_contracts.contains(&contract)
    }

    /// Delegates or revokes `operator` for every pool of `owner`.
    pub fn set_operator(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
    }

    /// Returns `true` if `operator` acts for `owner`.
    #[must_use]
    pub fn is_operator(&self, owner: Address, operator: Address) -> bool {
        self.operators.contains(&(owner, operator))
    }

    /// Mints a pool record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAddress`] for a zero owner or asset and
    /// [`LedgerError::ProviderNotApproved`] if `provider` is not approved.
    pub fn mint(
        &mut self,
        owner: Address,
        asset: AssetId,
        provider: Address,
        vault_account: Option<VaultAccountId>,
        params: Vec<Amount>,
    ) -> Result<PoolId, LedgerError> {
        owner.non_zero()?;
        asset.non_zero()?;
        if !self.is_approved_provider(provider) {
            return Err(LedgerError::ProviderNotApproved(provider));
        }
        let pool_id = PoolId::new(self.next_id);
        self.next_id += 1;
        self.pools.insert(
            pool_id,
            PoolEntry {
                pool_id,
                owner,
                asset,
                provider,
                vault_account,
                params,
            },
        );
        Ok(pool_id)
    }

    /// Returns the id the next mint will receive.
    #[must_use]
    pub const fn next_pool_id(&self) -> PoolId {
        PoolId::new(self.next_id)
    }

    fn missing(&self, pool_id: PoolId) -> LedgerError {
        if pool_id.get() < self.next_id {
            LedgerError::PoolTerminal(pool_id)
        } else {
            LedgerError::UnknownPool(pool_id)
        }
    }

    /// Returns the live pool record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PoolTerminal`] for burned pools and
    /// [`LedgerError::UnknownPool`] for ids never minted.
    pub fn get(&self, pool_id: PoolId) -> Result<&PoolEntry, LedgerError> {
        self.pools.get(&pool_id).ok_or_else(|| self.missing(pool_id))
    }

    /// Returns `true` if the pool is live.
    #[must_use]
    pub fn contains(&self, pool_id: PoolId) -> bool {
        self.pools.contains_key(&pool_id)
    }

    /// Replaces the stored params of a live pool.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn set_params(&mut self, pool_id: PoolId, params: Vec<Amount>) -> Result<(), LedgerError> {
        let err = self.missing(pool_id);
        let entry = self.pools.get_mut(&pool_id).ok_or(err)?;
        entry.params = params;
        Ok(())
    }

    /// Changes the owner of a live pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAddress`] for a zero owner, or the
    /// lookup errors of [`get`](Self::get).
    pub fn set_owner(&mut self, pool_id: PoolId, owner: Address) -> Result<Address, LedgerError> {
        owner.non_zero()?;
        let err = self.missing(pool_id);
        let entry = self.pools.get_mut(&pool_id).ok_or(err)?;
        Ok(std::mem::replace(&mut entry.owner, owner))
    }

    /// Removes a terminal pool from the table.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn burn(&mut self, pool_id: PoolId) -> Result<PoolEntry, LedgerError> {
        let err = self.missing(pool_id);
        self.pools.remove(&pool_id).ok_or(err)
    }

    /// Fails unless `caller` owns the pool or operates for its owner.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotPoolOwner`] otherwise.
    pub fn ensure_owner_or_operator(
        &self,
        pool_id: PoolId,
        caller: Address,
    ) -> Result<&PoolEntry, LedgerError> {
        let entry = self.get(pool_id)?;
        if entry.owner == caller || self.is_operator(entry.owner, caller) {
            Ok(entry)
        } else {
            Err(LedgerError::NotPoolOwner { pool_id, caller })
        }
    }

    /// Iterates over live pools in id order.
    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry> {
        self.pools.values()
    }

    /// Returns the ids of live pools owned by `owner`, in id order.
    #[must_use]
    pub fn pools_of(&self, owner: Address) -> Vec<PoolId> {
        self.pools
            .values()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.pool_id)
            .collect()
    }

    /// Returns the number of live pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns `true` if the registry holds no live pools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
