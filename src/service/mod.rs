//! Service layer: serialized async access to the ledger.
//!
//! [`LedgerService`] funnels every call through one lock, tags it with a
//! transaction id, and publishes the events of committed calls through
//! the [`super::domain::EventBus`].

pub mod ledger_service;

pub use ledger_service::{LedgerService, Receipt};
