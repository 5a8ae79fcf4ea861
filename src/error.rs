//! Ledger error types with kind and numeric code mapping.
//!
//! [`LedgerError`] is the central error type of the crate. Every variant
//! maps to one [`ErrorKind`] and to a stable numeric code. A failed call
//! never leaves partial state behind: the ledger restores its snapshot
//! before the error is returned.

use serde::Serialize;

use crate::domain::{Address, PoolId, VaultAccountId};
use crate::math::Amount;
use crate::providers::ProviderClass;

/// Coarse error taxonomy shared by every failure.
///
/// # Error Code Ranges
///
/// | Range     | Kind               |
/// |-----------|--------------------|
/// | 1000–1999 | InvalidInput       |
/// | 2000–2999 | Unauthorized       |
/// | 3000–3999 | InvalidState       |
/// | 4000–4999 | InvalidComposition |
/// | 5000–5999 | ResourceExceeded   |
/// | 6000–6999 | SolvencyViolation  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Zero address or amount, malformed params.
    InvalidInput,
    /// Caller is not the owner, not approved, or not the registry owner.
    Unauthorized,
    /// Time constraints, bad split ratio, terminal pool.
    InvalidState,
    /// Disallowed provider nesting or mismatched provider/params counts.
    InvalidComposition,
    /// Split exceeding the remaining amount, oversized batch.
    ResourceExceeded,
    /// Custody would fall below commitments.
    SolvencyViolation,
}

/// Error enum for every ledger, provider and vault operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// An address argument was the zero address.
    #[error("zero address")]
    ZeroAddress,

    /// An amount argument was zero where a positive value is required.
    #[error("zero amount")]
    ZeroAmount,

    /// Params sequence does not match the provider layout.
    #[error("invalid params length for {provider}: expected {expected}, got {got}")]
    InvalidParamsLength {
        /// Provider whose layout was violated.
        provider: ProviderClass,
        /// Expected number of params.
        expected: usize,
        /// Number of params supplied.
        got: usize,
    },

    /// A product or sum does not fit in the amount type.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// No pool with this id was ever minted.
    #[error("unknown pool: {0}")]
    UnknownPool(PoolId),

    /// The pool existed but has reached its terminal state and was burned.
    #[error("pool {0} is terminal")]
    PoolTerminal(PoolId),

    /// No provider is installed at this address.
    #[error("unknown provider: {0}")]
    UnknownProvider(Address),

    /// The provider is installed but not in the approval set.
    #[error("provider not approved: {0}")]
    ProviderNotApproved(Address),

    /// Caller is neither the pool owner nor a delegated operator.
    #[error("caller {caller} may not act on pool {pool_id}")]
    NotPoolOwner {
        /// Pool the call targeted.
        pool_id: PoolId,
        /// Rejected caller.
        caller: Address,
    },

    /// Pool is owned by a provider and can only be mutated by its chain.
    #[error("pool {0} is owned by a provider")]
    ProviderOwnedPool(PoolId),

    /// Caller is not the registry owner.
    #[error("caller {0} is not the registry owner")]
    NotRegistryOwner(Address),

    /// Caller is not an approved contract.
    #[error("caller {0} is not an approved contract")]
    ContractNotApproved(Address),

    /// A vault primitive was invoked by an address outside the trustee set.
    #[error("vault access denied for {0}")]
    NotVaultTrustee(Address),

    /// The vault account does not exist.
    #[error("unknown vault account: {0}")]
    UnknownVaultAccount(VaultAccountId),

    /// Lock start lies in the past.
    #[error("invalid start time {start}: now is {now}")]
    InvalidStartTime {
        /// Requested start.
        start: u64,
        /// Current ledger time.
        now: u64,
    },

    /// Finish is not strictly after start (or after now for collateral).
    #[error("invalid finish time {finish}: must be after {start}")]
    InvalidFinishTime {
        /// Reference start.
        start: u64,
        /// Requested finish.
        finish: u64,
    },

    /// Split portion is zero or would leave a zero-value survivor.
    #[error("invalid split of {requested} from {available}")]
    InvalidSplit {
        /// Requested portion.
        requested: Amount,
        /// Live committed amount.
        available: Amount,
    },

    /// Split portion exceeds the live committed amount.
    #[error("split exceeded: requested {requested}, available {available}")]
    SplitExceeded {
        /// Requested portion.
        requested: Amount,
        /// Live committed amount.
        available: Amount,
    },

    /// Split ratio outside `(0, 1)`.
    #[error("invalid split ratio: {0}")]
    InvalidRatio(u128),

    /// The operation is not defined for this provider.
    #[error("{provider} does not support {operation}")]
    UnsupportedOperation {
        /// Provider class.
        provider: ProviderClass,
        /// Operation name.
        operation: &'static str,
    },

    /// Fee-decorated pool must go through the fee collector first.
    #[error("fee not collected for pool {0}")]
    FeeNotCollected(PoolId),

    /// Fee was already skimmed from this pool.
    #[error("fee already collected for pool {0}")]
    FeeAlreadyCollected(PoolId),

    /// The refund window closed at the collateral finish time.
    #[error("refund window closed at {finish}")]
    RefundWindowClosed {
        /// Collateral finish time.
        finish: u64,
    },

    /// The ownership transfer target has no defined meaning for this pool.
    #[error("invalid transfer target {to} for pool {pool_id}")]
    InvalidTransferTarget {
        /// Pool being transferred.
        pool_id: PoolId,
        /// Rejected target.
        to: Address,
    },

    /// Delay-vault tier change is not a forward move inside the table.
    #[error("invalid tier {requested}: current {current}, tier count {count}")]
    InvalidTier {
        /// Requested tier.
        requested: usize,
        /// Current tier.
        current: usize,
        /// Number of configured tiers.
        count: usize,
    },

    /// Delay-vault tier table is empty or not strictly ascending.
    #[error("invalid tier table")]
    InvalidTierTable,

    /// The inner provider class is not allowed under the outer one.
    #[error("invalid provider type: {outer} cannot wrap {inner}")]
    InvalidProviderType {
        /// Composing provider.
        outer: ProviderClass,
        /// Rejected inner provider.
        inner: ProviderClass,
    },

    /// The queried id is not a pool of the expected provider.
    #[error("invalid provider pool id: {0}")]
    InvalidProviderPoolId(PoolId),

    /// Bundle needs at least two child pools.
    #[error("invalid addresses length: {0}")]
    InvalidAddressesLength(usize),

    /// Bundle providers and params slices differ in length.
    #[error("providers/params length mismatch: {providers} providers, {params} params")]
    ProvidersParamsLengthMismatch {
        /// Number of providers.
        providers: usize,
        /// Number of params vectors.
        params: usize,
    },

    /// A batch was requested with no entries.
    #[error("empty batch")]
    EmptyBatch,

    /// A batch exceeds the configured cap.
    #[error("too many pools: {count} exceeds {max}")]
    TooManyPools {
        /// Requested count.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Collateral holder cannot back the requested refund obligation.
    #[error("insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Main coin required.
        required: Amount,
        /// Main coin unreserved in the holder.
        available: Amount,
    },

    /// Re-registration would change the committed amount of a pool.
    #[error("committed amount changed: expected {expected}, got {got}")]
    CommittedAmountChanged {
        /// Stored committed amount.
        expected: Amount,
        /// Amount in the new params.
        got: Amount,
    },

    /// Timed params commit more than the principal the curve vests from.
    #[error("invalid start amount {start_amount}: below left amount {left}")]
    InvalidStartAmount {
        /// Committed left amount.
        left: Amount,
        /// Principal of the vesting curve.
        start_amount: Amount,
    },

    /// The external asset book refused a transfer in.
    #[error("insufficient balance: {holder} has {balance}, needs {required}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Its balance.
        balance: Amount,
        /// Amount required.
        required: Amount,
    },

    /// Vault release would exceed custody.
    #[error("insufficient custody in {account}: requested {requested}, custodied {custodied}")]
    InsufficientCustody {
        /// Vault account.
        account: VaultAccountId,
        /// Requested release.
        requested: Amount,
        /// Custodied balance.
        custodied: Amount,
    },

    /// Custody of an account is below the commitments of its live pools.
    #[error("solvency violation in {account}: committed {committed}, custodied {custodied}")]
    SolvencyViolation {
        /// Vault account.
        account: VaultAccountId,
        /// Sum of live commitments.
        committed: Amount,
        /// Custodied balance.
        custodied: Amount,
    },
}

impl LedgerError {
    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAddress
            | Self::ZeroAmount
            | Self::InvalidParamsLength { .. }
            | Self::ArithmeticOverflow
            | Self::UnknownPool(_)
            | Self::UnknownProvider(_)
            | Self::UnknownVaultAccount(_)
            | Self::InvalidTransferTarget { .. }
            | Self::InvalidTierTable
            | Self::EmptyBatch
            | Self::InsufficientBalance { .. }
            | Self::CommittedAmountChanged { .. }
            | Self::InvalidStartAmount { .. } => ErrorKind::InvalidInput,
            Self::ProviderNotApproved(_)
            | Self::NotPoolOwner { .. }
            | Self::ProviderOwnedPool(_)
            | Self::NotRegistryOwner(_)
            | Self::ContractNotApproved(_)
            | Self::NotVaultTrustee(_) => ErrorKind::Unauthorized,
            Self::PoolTerminal(_)
            | Self::InvalidStartTime { .. }
            | Self::InvalidFinishTime { .. }
            | Self::InvalidSplit { .. }
            | Self::InvalidRatio(_)
            | Self::UnsupportedOperation { .. }
            | Self::FeeNotCollected(_)
            | Self::FeeAlreadyCollected(_)
            | Self::RefundWindowClosed { .. }
            | Self::InvalidTier { .. } => ErrorKind::InvalidState,
            Self::InvalidProviderType { .. }
            | Self::InvalidProviderPoolId(_)
            | Self::InvalidAddressesLength(_)
            | Self::ProvidersParamsLengthMismatch { .. } => ErrorKind::InvalidComposition,
            Self::SplitExceeded { .. }
            | Self::TooManyPools { .. }
            | Self::InsufficientCollateral { .. } => ErrorKind::ResourceExceeded,
            Self::InsufficientCustody { .. } | Self::SolvencyViolation { .. } => {
                ErrorKind::SolvencyViolation
            }
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::ZeroAddress => 1001,
            Self::ZeroAmount => 1002,
            Self::InvalidParamsLength { .. } => 1003,
            Self::ArithmeticOverflow => 1004,
            Self::UnknownPool(_) => 1005,
            Self::UnknownProvider(_) => 1006,
            Self::UnknownVaultAccount(_) => 1007,
            Self::InvalidTransferTarget { .. } => 1008,
            Self::InvalidTierTable => 1009,
            Self::EmptyBatch => 1010,
            Self::InsufficientBalance { .. } => 1011,
            Self::CommittedAmountChanged { .. } => 1012,
            Self::InvalidStartAmount { .. } => 1013,
            Self::ProviderNotApproved(_) => 2001,
            Self::NotPoolOwner { .. } => 2002,
            Self::ProviderOwnedPool(_) => 2003,
            Self::NotRegistryOwner(_) => 2004,
            Self::ContractNotApproved(_) => 2005,
            Self::NotVaultTrustee(_) => 2006,
            Self::PoolTerminal(_) => 3001,
            Self::InvalidStartTime { .. } => 3002,
            Self::InvalidFinishTime { .. } => 3003,
            Self::InvalidSplit { .. } => 3004,
            Self::InvalidRatio(_) => 3005,
            Self::UnsupportedOperation { .. } => 3006,
            Self::FeeNotCollected(_) => 3007,
            Self::FeeAlreadyCollected(_) => 3008,
            Self::RefundWindowClosed { .. } => 3009,
            Self::InvalidTier { .. } => 3010,
            Self::InvalidProviderType { .. } => 4001,
            Self::InvalidProviderPoolId(_) => 4002,
            Self::InvalidAddressesLength(_) => 4003,
            Self::ProvidersParamsLengthMismatch { .. } => 4004,
            Self::SplitExceeded { .. } => 5001,
            Self::TooManyPools { .. } => 5002,
            Self::InsufficientCollateral { .. } => 5003,
            Self::InsufficientCustody { .. } => 6001,
            Self::SolvencyViolation { .. } => 6002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_code_ranges() {
        let samples = [
            LedgerError::ZeroAmount,
            LedgerError::InvalidStartAmount {
                left: 2,
                start_amount: 1,
            },
            LedgerError::ProviderNotApproved(Address::from_low_u64(9)),
            LedgerError::PoolTerminal(PoolId::new(3)),
            LedgerError::InvalidAddressesLength(1),
            LedgerError::TooManyPools { count: 9, max: 8 },
            LedgerError::InsufficientCustody {
                account: VaultAccountId::new(0),
                requested: 2,
                custodied: 1,
            },
        ];
        for err in samples {
            let expected = match err.error_code() / 1000 {
                1 => ErrorKind::InvalidInput,
                2 => ErrorKind::Unauthorized,
                3 => ErrorKind::InvalidState,
                4 => ErrorKind::InvalidComposition,
                5 => ErrorKind::ResourceExceeded,
                _ => ErrorKind::SolvencyViolation,
            };
            assert_eq!(err.kind(), expected, "{err}");
        }
    }

    #[test]
    fn display_includes_fields() {
        let err = LedgerError::SplitExceeded {
            requested: 10,
            available: 5,
        };
        assert_eq!(err.to_string(), "split exceeded: requested 10, available 5");
    }

    #[test]
    fn composition_errors_are_composition_kind() {
        let err = LedgerError::InvalidProviderType {
            outer: ProviderClass::Bundle,
            inner: ProviderClass::Refund,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidComposition);
    }
}
