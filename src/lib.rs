//! # vesting-ledger
//!
//! Token vesting ledger: pools of committed assets released over time by
//! composable schedule providers, owned through a registry and backed by
//! a custody vault.
//!
//! A pool is an ownable position. Its release schedule comes from the
//! provider controlling it: instant deals, cliff locks, linear timed
//! vesting, and the decorators and composites built over them (fees,
//! bundles, collateral escrows with refunds, tiered delay vaults).
//!
//! ## Architecture
//!
//! ```text
//! Callers
//!     │
//!     ├── LedgerService (service/)   serialized async front, receipts
//!     ├── EventBus (domain/)         committed events
//!     │
//!     ├── Ledger (ledger/)           registry entry point, transactions
//!     ├── Batch utilities (batch/)   multi-withdraw, mass builders
//!     │
//!     ├── Providers (providers/)     schedules, decorators, composites
//!     ├── PoolRegistry + Vault       pool table and custody (domain/)
//!     │
//!     └── AssetBook                  underlying fungible assets
//! ```
//!
//! Every mutating call is atomic: the ledger updates its own state
//! first, releases custody last, and rolls everything back on error.

pub mod batch;
pub mod clock;
pub mod config;
pub mod deploy;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod math;
pub mod providers;
pub mod service;
pub mod telemetry;

pub use error::LedgerError;
pub use ledger::{Ledger, REGISTRY_ADDRESS};
