//! Domain layer: identifiers, pool records, custody, registry and events.
//!
//! This module contains the ledger's data model: addresses and ids, the
//! pool table with its approval registry, the custody vault and the
//! external asset interface, plus the event types and broadcast bus.

pub mod address;
pub mod asset_book;
pub mod event_bus;
pub mod event_filter;
pub mod ledger_event;
pub mod pool_entry;
pub mod pool_id;
pub mod pool_registry;
pub mod vault;

pub use address::{Address, AssetId};
pub use asset_book::{AssetBook, Balances, Transfer};
pub use event_bus::EventBus;
pub use event_filter::EventFilter;
pub use ledger_event::LedgerEvent;
pub use pool_entry::{
    PoolEntry, PoolSnapshot, SplitPayload, SplitRequest, TransferOutcome, WithdrawOutcome,
};
pub use pool_id::{PoolId, VaultAccountId};
pub use pool_registry::PoolRegistry;
pub use vault::{Vault, VaultAccount};
