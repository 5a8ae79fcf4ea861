//! Create one pool per recipient with a shared schedule.

use serde::{Deserialize, Serialize};

use super::ensure_within_cap;
use crate::domain::{Address, AssetBook, AssetId, PoolId};
use crate::error::LedgerError;
use crate::ledger::{Ledger, NewPool};
use crate::math::Amount;

/// One `(user, amount)` pair of a mass creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Owner of the created pool.
    pub owner: Address,
    /// Amount committed to the pool.
    pub amount: Amount,
}

impl<B: AssetBook> Ledger<B> {
    /// Creates one pool of `provider` per recipient, funded by
    /// `depositor`. `schedule` holds the creation input after the amount
    /// (empty for Deal, `[start]` for Lock, `[start, finish]` for Timed)
    /// and is shared by every pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EmptyBatch`], [`LedgerError::TooManyPools`]
    /// and the creation errors of the first pool that fails.
    pub fn mass_create(
        &mut self,
        depositor: Address,
        provider: Address,
        asset: AssetId,
        schedule: &[Amount],
        recipients: &[Recipient],
    ) -> Result<Vec<PoolId>, LedgerError> {
        if recipients.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        ensure_within_cap(recipients.len(), self.config().max_pools_per_tx)?;
        let pool_ids = self.transact(|tx| {
            recipients
                .iter()
                .map(|recipient| {
                    let mut params = Vec::with_capacity(schedule.len() + 1);
                    params.push(recipient.amount);
                    params.extend_from_slice(schedule);
                    tx.create_schedule_pool(
                        depositor,
                        &NewPool {
                            owner: recipient.owner,
                            asset,
                            provider,
                            params,
                        },
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        tracing::info!(%provider, count = pool_ids.len(), "mass create");
        Ok(pool_ids)
    }
}
