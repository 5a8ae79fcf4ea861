//! Batch utilities layered on the ledger.
//!
//! Each batch runs as one transaction: either every pool in it is
//! processed or none is. Batches are capped at
//! [`LedgerConfig::max_pools_per_tx`](crate::config::LedgerConfig::max_pools_per_tx)
//! and fail with [`LedgerError::TooManyPools`](crate::error::LedgerError::TooManyPools)
//! instead of truncating.

pub mod mass_builder;
pub mod multi_withdraw;

pub use mass_builder::Recipient;
pub use multi_withdraw::MultiWithdrawReport;

use crate::error::LedgerError;

/// Fails if a batch of `count` exceeds `max`.
pub(crate) fn ensure_within_cap(count: usize, max: usize) -> Result<(), LedgerError> {
    if count > max {
        return Err(LedgerError::TooManyPools { count, max });
    }
    Ok(())
}
