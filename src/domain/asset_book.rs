//! Underlying fungible-asset interface and its in-memory implementation.
//!
//! The ledger never moves tokens itself. The vault queues [`Transfer`]s
//! and the ledger hands them to an [`AssetBook`] at commit, after every
//! ledger-side state change of the call is in place.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;

use super::{Address, AssetId};
use crate::error::LedgerError;
use crate::math::{self, Amount};

/// A queued movement of the underlying asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum Transfer {
    /// Pull from a depositor into custody.
    In {
        /// Asset moved.
        asset: AssetId,
        /// Depositor debited.
        from: Address,
        /// Amount moved.
        amount: Amount,
    },
    /// Pay out of custody to a recipient.
    Out {
        /// Asset moved.
        asset: AssetId,
        /// Recipient credited.
        to: Address,
        /// Amount moved.
        amount: Amount,
    },
}

/// Standard fungible-asset semantics consumed by the vault.
///
/// Implementations must be cheap to clone: the ledger snapshots the book
/// together with its own state so a failed call can be rolled back.
pub trait AssetBook: Debug + Clone + Send {
    /// Moves `amount` of `asset` from `from` into custody.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if `from` cannot pay.
    fn transfer_in(&mut self, asset: AssetId, from: Address, amount: Amount)
    -> Result<(), LedgerError>;

    /// Pays `amount` of `asset` out of custody to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if the credit overflows.
    fn transfer_out(&mut self, asset: AssetId, to: Address, amount: Amount)
    -> Result<(), LedgerError>;

    /// Applies one queued transfer.
    ///
    /// # Errors
    ///
    /// Propagates the underlying transfer error.
    fn apply(&mut self, transfer: Transfer) -> Result<(), LedgerError> {
        match transfer {
            Transfer::In {
                asset,
                from,
                amount,
            } => self.transfer_in(asset, from, amount),
            Transfer::Out { asset, to, amount } => self.transfer_out(asset, to, amount),
        }
    }
}

/// In-memory balance sheet: `(asset, holder) -> balance`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    balances: BTreeMap<(AssetId, Address), Amount>,
}

impl Balances {
    /// Creates an empty balance sheet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `holder` out of thin air (faucet for tests and genesis).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if the balance overflows.
    pub fn mint(
        &mut self,
        asset: AssetId,
        holder: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let balance = self.balances.entry((asset, holder)).or_insert(0);
        *balance = math::add(*balance, amount)?;
        Ok(())
    }

    /// Returns the balance of `holder` in `asset`.
    #[must_use]
    pub fn balance_of(&self, asset: AssetId, holder: Address) -> Amount {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }
}

impl AssetBook for Balances {
    fn transfer_in(
        &mut self,
        asset: AssetId,
        from: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let balance = self.balance_of(asset, from);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                holder: from,
                balance,
                required: amount,
            })?;
        self.balances.insert((asset, from), remaining);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        asset: AssetId,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.mint(asset, to, amount)
    }
}
