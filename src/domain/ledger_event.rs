//! Domain events reflecting committed ledger mutations.
//!
//! Every state change queues a [`LedgerEvent`] inside its transaction.
//! Events of a failed call are discarded with the rest of its state, so
//! subscribers only ever observe committed history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Address, AssetId, PoolId, VaultAccountId};
use crate::math::Amount;
use crate::providers::ProviderClass;

/// Domain event emitted for every committed mutation.
///
/// Amounts are serialized as strings to preserve u128 precision in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A provider was installed in the provider graph.
    ProviderInstalled {
        /// Provider address.
        provider: Address,
        /// Provider class.
        class: ProviderClass,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// The provider approval set changed.
    ProviderApprovalChanged {
        /// Provider address.
        provider: Address,
        /// New status.
        approved: bool,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// The contract approval set changed.
    ContractApprovalChanged {
        /// Contract address.
        contract: Address,
        /// New status.
        approved: bool,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// An owner delegated or revoked an operator.
    OperatorChanged {
        /// Delegating owner.
        owner: Address,
        /// Operator.
        operator: Address,
        /// New status.
        approved: bool,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A pool was minted.
    PoolCreated {
        /// Pool identifier.
        pool_id: PoolId,
        /// Initial owner.
        owner: Address,
        /// Committed asset.
        asset: AssetId,
        /// Controlling provider.
        provider: Address,
        /// Stored params at creation.
        #[serde(serialize_with = "amounts_as_strings")]
        params: Vec<Amount>,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A pool's params were re-registered.
    PoolRegistered {
        /// Pool identifier.
        pool_id: PoolId,
        /// New stored params.
        #[serde(serialize_with = "amounts_as_strings")]
        params: Vec<Amount>,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A withdrawal released funds from a pool.
    PoolWithdrawn {
        /// Pool identifier.
        pool_id: PoolId,
        /// Recipient of the release.
        recipient: Address,
        /// Released amount.
        #[serde(serialize_with = "amount_as_string")]
        amount: Amount,
        /// Whether the pool became terminal.
        is_final: bool,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A pool was split in two.
    PoolSplit {
        /// Source pool.
        pool_id: PoolId,
        /// Newly minted pool.
        new_pool_id: PoolId,
        /// Owner of the new pool.
        new_owner: Address,
        /// Amount moved to the new pool.
        #[serde(serialize_with = "amount_as_string")]
        amount: Amount,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// Ownership of a pool changed.
    PoolTransferred {
        /// Pool identifier.
        pool_id: PoolId,
        /// Previous owner.
        from: Address,
        /// New owner.
        to: Address,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A terminal pool was burned and removed from the registry.
    PoolBurned {
        /// Pool identifier.
        pool_id: PoolId,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// Custody received a deposit.
    VaultDeposited {
        /// Custody account.
        account: VaultAccountId,
        /// Asset deposited.
        asset: AssetId,
        /// Depositor.
        depositor: Address,
        /// Deposited amount.
        #[serde(serialize_with = "amount_as_string")]
        amount: Amount,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// Custody paid out.
    VaultReleased {
        /// Custody account.
        account: VaultAccountId,
        /// Recipient.
        recipient: Address,
        /// Released amount.
        #[serde(serialize_with = "amount_as_string")]
        amount: Amount,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A fee decorator skimmed its fee.
    FeeCollected {
        /// Pool identifier.
        pool_id: PoolId,
        /// Fee collector.
        collector: Address,
        /// Fee amount.
        #[serde(serialize_with = "amount_as_string")]
        fee: Amount,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A refund pool was refunded against its collateral.
    RefundExecuted {
        /// Refund pool.
        pool_id: PoolId,
        /// Collateral pool.
        collateral_pool_id: PoolId,
        /// Tokens returned to the project.
        #[serde(serialize_with = "amount_as_string")]
        token_amount: Amount,
        /// Main coin paid to the user.
        #[serde(serialize_with = "amount_as_string")]
        main_coin_amount: Amount,
        /// Event time.
        timestamp: DateTime<Utc>,
    },

    /// A delay-vault pool moved to a higher tier.
    TierUpgraded {
        /// Pool identifier.
        pool_id: PoolId,
        /// Previous tier.
        from_tier: usize,
        /// New tier.
        to_tier: usize,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Returns the pool this event concerns, if any.
    #[must_use]
    pub fn pool_id(&self) -> Option<PoolId> {
        match self {
            Self::PoolCreated { pool_id, .. }
            | Self::PoolRegistered { pool_id, .. }
            | Self::PoolWithdrawn { pool_id, .. }
            | Self::PoolSplit { pool_id, .. }
            | Self::PoolTransferred { pool_id, .. }
            | Self::PoolBurned { pool_id, .. }
            | Self::FeeCollected { pool_id, .. }
            | Self::RefundExecuted { pool_id, .. }
            | Self::TierUpgraded { pool_id, .. } => Some(*pool_id),
            Self::ProviderInstalled { .. }
            | Self::ProviderApprovalChanged { .. }
            | Self::ContractApprovalChanged { .. }
            | Self::OperatorChanged { .. }
            | Self::VaultDeposited { .. }
            | Self::VaultReleased { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ProviderInstalled { .. } => "provider_installed",
            Self::ProviderApprovalChanged { .. } => "provider_approval_changed",
            Self::ContractApprovalChanged { .. } => "contract_approval_changed",
            Self::OperatorChanged { .. } => "operator_changed",
            Self::PoolCreated { .. } => "pool_created",
            Self::PoolRegistered { .. } => "pool_registered",
            Self::PoolWithdrawn { .. } => "pool_withdrawn",
            Self::PoolSplit { .. } => "pool_split",
            Self::PoolTransferred { .. } => "pool_transferred",
            Self::PoolBurned { .. } => "pool_burned",
            Self::VaultDeposited { .. } => "vault_deposited",
            Self::VaultReleased { .. } => "vault_released",
            Self::FeeCollected { .. } => "fee_collected",
            Self::RefundExecuted { .. } => "refund_executed",
            Self::TierUpgraded { .. } => "tier_upgraded",
        }
    }
}

fn amount_as_string<S: serde::Serializer>(amount: &Amount, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(amount)
}

fn amounts_as_strings<S: serde::Serializer>(
    amounts: &[Amount],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(amounts.iter().map(ToString::to_string))
}
