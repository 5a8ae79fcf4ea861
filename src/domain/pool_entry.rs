//! Pool records as stored by the registry, plus the read-side snapshot.

use serde::Serialize;

use super::{Address, AssetId, PoolId, VaultAccountId};
use crate::error::LedgerError;
use crate::math::{Amount, Ratio};
use crate::providers::ProviderClass;

/// One row of the registry's pool table.
///
/// `params` is opaque to the registry: its layout belongs to the
/// provider named in `provider`, and only that provider (or one in its
/// delegation chain) rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    /// Unique pool identifier (immutable after mint).
    pub pool_id: PoolId,

    /// Current owner of the ownership token.
    pub owner: Address,

    /// Asset the pool commits.
    pub asset: AssetId,

    /// Address of the controlling provider.
    pub provider: Address,

    /// Custody account backing the pool, if it holds funds directly.
    pub vault_account: Option<VaultAccountId>,

    /// Provider-defined parameters.
    pub params: Vec<Amount>,
}

impl PoolEntry {
    /// Returns the backing custody account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidProviderPoolId`] for
    /// pools that hold no funds directly.
    pub fn account(&self) -> Result<VaultAccountId, LedgerError> {
        self.vault_account
            .ok_or(LedgerError::InvalidProviderPoolId(self.pool_id))
    }
}

/// Read-only view returned by `Ledger::get_data`.
///
/// `params` is the provider's resolved view: composite providers expand
/// their stored layout with values read from sub-pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    /// Pool identifier.
    pub pool_id: PoolId,
    /// Current owner.
    pub owner: Address,
    /// Asset committed.
    pub asset: AssetId,
    /// Controlling provider address.
    pub provider: Address,
    /// Class of the controlling provider.
    pub provider_class: ProviderClass,
    /// Backing custody account.
    pub vault_account: Option<VaultAccountId>,
    /// Resolved provider params.
    pub params: Vec<Amount>,
    /// Amount releasable right now.
    pub withdrawable: Amount,
}

/// Portion requested by a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRequest {
    /// Absolute amount moved to the new pool.
    Amount(Amount),
    /// Fraction of the live amount moved to the new pool.
    Ratio(Ratio),
}

impl SplitRequest {
    /// Resolves the request against the live amount `left`.
    ///
    /// # Errors
    ///
    /// Propagates ratio arithmetic errors.
    pub fn resolve(self, left: Amount) -> Result<Amount, LedgerError> {
        match self {
            Self::Amount(amount) => Ok(amount),
            Self::Ratio(ratio) => ratio.apply(left),
        }
    }

    /// Converts the request to a ratio of `left`, used to fan a split
    /// over constituent sub-pools.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SplitExceeded`] when an absolute
    /// amount is larger than `left`, or an invalid ratio error otherwise.
    pub fn as_ratio(self, left: Amount) -> Result<Ratio, LedgerError> {
        match self {
            Self::Ratio(ratio) => Ok(ratio),
            Self::Amount(amount) if amount > left => {
                Err(LedgerError::SplitExceeded {
                    requested: amount,
                    available: left,
                })
            }
            Self::Amount(amount) => Ratio::of(amount, left),
        }
    }
}

/// Result of a registry withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawOutcome {
    /// Amount of the pool's asset released to the owner.
    pub released: Amount,
    /// Whether the pool reached its terminal state and was burned.
    pub is_final: bool,
}

/// Result of an ownership-token transfer through the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Plain ownership change.
    Transferred,
    /// Transfer to the registry triggered a withdrawal.
    Withdrawn(WithdrawOutcome),
    /// Transfer carried a split payload.
    Split {
        /// Newly minted pool.
        new_pool_id: PoolId,
    },
    /// Transfer to the refund provider refunded the pool.
    Refunded {
        /// Main-coin pool minted for the former owner.
        main_coin_pool: Option<PoolId>,
    },
    /// Transfer to the fee collector skimmed the fee and withdrew.
    FeeCollected {
        /// Fee skimmed.
        fee: Amount,
        /// Withdrawal that followed.
        withdrawal: WithdrawOutcome,
    },
    /// Transfer to the delay vault instantiated the tier schedule.
    Settled {
        /// Schedule pool minted for the owner.
        new_pool_id: PoolId,
    },
}

/// Split payload carried by an ownership-token transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitPayload {
    /// Fraction moved to the new pool.
    pub ratio: Ratio,
    /// Owner of the new pool.
    pub new_owner: Address,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn amount_request_resolves_to_itself() {
        assert_eq!(SplitRequest::Amount(40).resolve(100), Ok(40));
    }

    #[test]
    fn ratio_request_resolves_against_left() {
        let Ok(ratio) = Ratio::from_percent(25) else {
            panic!("valid ratio");
        };
        assert_eq!(SplitRequest::Ratio(ratio).resolve(1_000), Ok(250));
    }

    #[test]
    fn amount_request_above_left_is_exceeded() {
        let result = SplitRequest::Amount(101).as_ratio(100);
        assert_eq!(
            result,
            Err(LedgerError::SplitExceeded {
                requested: 101,
                available: 100
            })
        );
    }

    #[test]
    fn transfer_outcome_serializes_tagged() {
        let json = serde_json::to_string(&TransferOutcome::Transferred).unwrap_or_default();
        assert!(json.contains("transferred"));
    }
}
