//! Per-subscriber event filtering.
//!
//! Tracks which pool ids a subscriber follows and decides which
//! [`LedgerEvent`]s it should see.

use std::collections::HashSet;

use super::{LedgerEvent, PoolId};

/// Pool-id filter for a single event subscriber.
#[derive(Debug, Default)]
pub struct EventFilter {
    /// Followed pool ids. Ignored when `follow_all` is set.
    pool_ids: HashSet<PoolId>,
    /// Wildcard: every event passes.
    follow_all: bool,
}

impl EventFilter {
    /// Creates an empty filter that lets nothing through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a wildcard filter.
    #[must_use]
    pub fn all() -> Self {
        Self {
            pool_ids: HashSet::new(),
            follow_all: true,
        }
    }

    /// Adds pool ids to the followed set.
    pub fn follow(&mut self, ids: &[PoolId]) {
        self.pool_ids.extend(ids.iter().copied());
    }

    /// Removes pool ids from the followed set.
    pub fn unfollow(&mut self, ids: &[PoolId]) {
        for id in ids {
            self.pool_ids.remove(id);
        }
    }

    /// Returns `true` if the event passes the filter.
    ///
    /// Events without a pool (approvals, vault movements) only pass the
    /// wildcard. A split also passes when the new pool is followed, and
    /// the new pool is followed from then on.
    pub fn admit(&mut self, event: &LedgerEvent) -> bool {
        if self.follow_all {
            return true;
        }
        if let LedgerEvent::PoolSplit {
            pool_id,
            new_pool_id,
            ..
        } = event
            && self.pool_ids.contains(pool_id)
        {
            self.pool_ids.insert(*new_pool_id);
            return true;
        }
        event
            .pool_id()
            .is_some_and(|id| self.pool_ids.contains(&id))
    }

    /// Returns the number of explicitly followed pool ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pool_ids.len()
    }

    /// Returns `true` if the wildcard is active.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.follow_all
    }
}
