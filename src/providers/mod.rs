//! Provider graph: release-schedule strategies and their composition.
//!
//! Every pool is controlled by one installed provider. Providers form a
//! directed acyclic graph: decorators hold the address of the provider
//! they wrap, and every edge is checked against a static capability
//! matrix ([`allows`]) when the provider is installed. Pools naming a
//! composite provider are further checked against the same matrix when
//! they are created.
//!
//! # Parameter layouts
//!
//! | Class        | Stored params                                                   |
//! |--------------|-----------------------------------------------------------------|
//! | `Deal`       | `[left]`                                                        |
//! | `Lock`       | `[left, start]`                                                 |
//! | `Timed`      | `[left, start, finish, startAmount]`                            |
//! | `Fee`        | inner schedule layout `++ [collected]`                          |
//! | `Collateral` | `[finish, rate, tokenCollector, mainCoinCollector, holder, reserved]` |
//! | `Refund`     | `[rate, collateralPoolId, innerPoolId]`                         |
//! | `Bundle`     | `[lastChildPoolId]`                                             |
//! | `DelayVault` | `[amount, tier]`                                                |

pub mod bundle;
pub mod collateral;
pub mod deal;
pub mod delay_vault;
pub mod fee;
pub mod lock;
pub mod refund;
pub mod schedule;
pub mod timed;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Address, PoolId};
use crate::error::LedgerError;
use crate::math::{Amount, BPS_SCALE};

pub use schedule::Schedule;

/// Address namespace of installed providers.
const PROVIDER_NAMESPACE: u8 = 1;

/// Reads a pool id stored in a params slot.
pub(crate) fn pool_id_param(value: Amount) -> Result<PoolId, LedgerError> {
    u64::try_from(value)
        .map(PoolId::new)
        .map_err(|_| LedgerError::ArithmeticOverflow)
}

/// Tag of a provider variant, used in errors, events and the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderClass {
    /// Instant release.
    Deal,
    /// Cliff release.
    Lock,
    /// Linear vesting.
    Timed,
    /// Fee skim over a schedule.
    Fee,
    /// Main-coin escrow.
    Collateral,
    /// Schedule refundable against a collateral.
    Refund,
    /// Aggregation of sibling schedules.
    Bundle,
    /// Tiered deposit settled into a schedule.
    DelayVault,
}

impl ProviderClass {
    /// Returns `true` for Deal, Lock and Timed.
    #[must_use]
    pub const fn is_schedule(self) -> bool {
        matches!(self, Self::Deal | Self::Lock | Self::Timed)
    }
}

impl fmt::Display for ProviderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deal => "deal",
            Self::Lock => "lock",
            Self::Timed => "timed",
            Self::Fee => "fee",
            Self::Collateral => "collateral",
            Self::Refund => "refund",
            Self::Bundle => "bundle",
            Self::DelayVault => "delay_vault",
        };
        f.write_str(name)
    }
}

/// Static capability matrix: may `outer` wrap or contain `inner`?
///
/// Composite providers (Bundle, Refund, Collateral, DelayVault, Fee)
/// only ever accept base-family schedules, so no composite can reach
/// itself through the graph.
#[must_use]
pub const fn allows(outer: ProviderClass, inner: ProviderClass) -> bool {
    use ProviderClass::{Bundle, Collateral, Deal, DelayVault, Fee, Lock, Refund, Timed};
    matches!(
        (outer, inner),
        (Lock, Deal)
            | (Timed, Lock)
            | (Collateral, Deal)
            | (Fee | Bundle | Refund | DelayVault, Deal | Lock | Timed)
    )
}

/// When a fee decorator skims its fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTiming {
    /// Skimmed as the pool is created.
    AtCreation,
    /// Skimmed by the collector step before the first withdrawal.
    #[default]
    AtFirstSettlement,
}

/// Fee configuration of a fee decorator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee in basis points of the principal.
    pub fee_bps: u32,
    /// When the fee is skimmed.
    pub timing: FeeTiming,
    /// Recipient of skimmed fees.
    pub collector: Address,
}

/// One row of a delay-vault tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayTier {
    /// Highest cumulative deposit mapped to this tier.
    pub limit: Amount,
    /// Schedule provider instantiated on settlement.
    pub provider: Address,
    /// Seconds from settlement to the schedule start.
    pub start_delay: u64,
    /// Seconds from settlement to the schedule finish.
    pub finish_delay: u64,
}

/// An installed provider and its links into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ProviderKind {
    /// Instant release.
    Deal,
    /// Cliff release over a deal provider.
    Lock {
        /// Wrapped deal provider.
        inner: Address,
    },
    /// Linear vesting over a lock provider.
    Timed {
        /// Wrapped lock provider.
        inner: Address,
    },
    /// Fee skim over a schedule provider.
    Fee {
        /// Wrapped schedule provider.
        inner: Address,
        /// Fee configuration.
        schedule: FeeSchedule,
    },
    /// Main-coin escrow whose sub-pools are deals.
    Collateral {
        /// Deal provider backing the sub-pools.
        inner: Address,
    },
    /// Schedule refundable against pools of one collateral provider.
    Refund {
        /// Collateral provider.
        collateral: Address,
    },
    /// Aggregation of sibling schedules.
    Bundle,
    /// Tiered deposit settled into a schedule.
    DelayVault {
        /// Tier table, strictly ascending by limit.
        tiers: Vec<DelayTier>,
    },
}

impl ProviderKind {
    /// Returns the class tag.
    #[must_use]
    pub const fn class(&self) -> ProviderClass {
        match self {
            Self::Deal => ProviderClass::Deal,
            Self::Lock { .. } => ProviderClass::Lock,
            Self::Timed { .. } => ProviderClass::Timed,
            Self::Fee { .. } => ProviderClass::Fee,
            Self::Collateral { .. } => ProviderClass::Collateral,
            Self::Refund { .. } => ProviderClass::Refund,
            Self::Bundle => ProviderClass::Bundle,
            Self::DelayVault { .. } => ProviderClass::DelayVault,
        }
    }
}

/// The installed providers, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct ProviderGraph {
    providers: BTreeMap<Address, ProviderKind>,
    next_index: u64,
}

impl ProviderGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `kind` against the installed graph and installs it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownProvider`] for a dangling link,
    /// [`LedgerError::InvalidProviderType`] when the matrix rejects a link,
    /// [`LedgerError::InvalidTierTable`] for a malformed tier table and
    /// [`LedgerError::InvalidRatio`] for a fee above 100%.
    pub fn install(&mut self, kind: ProviderKind) -> Result<Address, LedgerError> {
        self.validate(&kind)?;
        let address = Address::system(PROVIDER_NAMESPACE, self.next_index);
        self.next_index += 1;
        tracing::debug!(%address, class = %kind.class(), "provider installed");
        self.providers.insert(address, kind);
        Ok(address)
    }

    fn validate(&self, kind: &ProviderKind) -> Result<(), LedgerError> {
        let outer = kind.class();
        match kind {
            ProviderKind::Deal | ProviderKind::Bundle => Ok(()),
            ProviderKind::Lock { inner }
            | ProviderKind::Timed { inner }
            | ProviderKind::Collateral { inner } => self.ensure_allowed(outer, *inner),
            ProviderKind::Fee { inner, schedule } => {
                self.ensure_allowed(outer, *inner)?;
                schedule.collector.non_zero()?;
                if u128::from(schedule.fee_bps) > BPS_SCALE {
                    return Err(LedgerError::InvalidRatio(u128::from(schedule.fee_bps)));
                }
                Ok(())
            }
            ProviderKind::Refund { collateral } => {
                let inner = self.class_of(*collateral)?;
                if inner == ProviderClass::Collateral {
                    Ok(())
                } else {
                    Err(LedgerError::InvalidProviderType { outer, inner })
                }
            }
            ProviderKind::DelayVault { tiers } => {
                for tier in tiers {
                    self.ensure_allowed(outer, tier.provider)?;
                }
                let classes = tiers
                    .iter()
                    .map(|tier| self.class_of(tier.provider))
                    .collect::<Result<Vec<_>, _>>()?;
                delay_vault::validate_tiers(tiers, &classes)
            }
        }
    }

    /// Fails unless `outer` may wrap the provider installed at `inner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownProvider`] or
    /// [`LedgerError::InvalidProviderType`].
    pub fn ensure_allowed(&self, outer: ProviderClass, inner: Address) -> Result<(), LedgerError> {
        let inner = self.class_of(inner)?;
        if allows(outer, inner) {
            Ok(())
        } else {
            Err(LedgerError::InvalidProviderType { outer, inner })
        }
    }

    /// Returns the provider installed at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownProvider`] if nothing is installed there.
    pub fn get(&self, address: Address) -> Result<&ProviderKind, LedgerError> {
        self.providers
            .get(&address)
            .ok_or(LedgerError::UnknownProvider(address))
    }

    /// Returns the class of the provider installed at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownProvider`] if nothing is installed there.
    pub fn class_of(&self, address: Address) -> Result<ProviderClass, LedgerError> {
        self.get(address).map(ProviderKind::class)
    }

    /// Returns `true` if a provider is installed at `address`.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.providers.contains_key(&address)
    }

    /// Iterates over installed providers in installation order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, &ProviderKind)> {
        self.providers.iter().map(|(addr, kind)| (*addr, kind))
    }

    /// Number of installed providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const ALL: [ProviderClass; 8] = [
        ProviderClass::Deal,
        ProviderClass::Lock,
        ProviderClass::Timed,
        ProviderClass::Fee,
        ProviderClass::Collateral,
        ProviderClass::Refund,
        ProviderClass::Bundle,
        ProviderClass::DelayVault,
    ];

    fn base_graph() -> (ProviderGraph, Address, Address, Address) {
        let mut graph = ProviderGraph::new();
        let Ok(deal) = graph.install(ProviderKind::Deal) else {
            panic!("deal install failed");
        };
        let Ok(lock) = graph.install(ProviderKind::Lock { inner: deal }) else {
            panic!("lock install failed");
        };
        let Ok(timed) = graph.install(ProviderKind::Timed { inner: lock }) else {
            panic!("timed install failed");
        };
        (graph, deal, lock, timed)
    }

    #[test]
    fn composites_never_contain_composites() {
        let composites = [
            ProviderClass::Fee,
            ProviderClass::Collateral,
            ProviderClass::Refund,
            ProviderClass::Bundle,
            ProviderClass::DelayVault,
        ];
        for outer in ALL {
            for inner in composites {
                assert!(!allows(outer, inner), "{outer} over {inner}");
            }
        }
    }

    #[test]
    fn schedule_chain_is_allowed() {
        assert!(allows(ProviderClass::Lock, ProviderClass::Deal));
        assert!(allows(ProviderClass::Timed, ProviderClass::Lock));
        assert!(!allows(ProviderClass::Timed, ProviderClass::Deal));
        assert!(allows(ProviderClass::Bundle, ProviderClass::Timed));
        assert!(!allows(ProviderClass::Collateral, ProviderClass::Timed));
    }

    #[test]
    fn install_assigns_distinct_addresses() {
        let (graph, deal, lock, timed) = base_graph();
        assert_eq!(graph.len(), 3);
        assert!(deal != lock && lock != timed);
        assert_eq!(graph.class_of(timed), Ok(ProviderClass::Timed));
    }

    #[test]
    fn install_rejects_disallowed_link() {
        let (mut graph, deal, _, _) = base_graph();
        let result = graph.install(ProviderKind::Timed { inner: deal });
        assert_eq!(
            result,
            Err(LedgerError::InvalidProviderType {
                outer: ProviderClass::Timed,
                inner: ProviderClass::Deal
            })
        );
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn refund_must_link_to_collateral() {
        let (mut graph, deal, _, _) = base_graph();
        let result = graph.install(ProviderKind::Refund { collateral: deal });
        assert!(matches!(
            result,
            Err(LedgerError::InvalidProviderType {
                outer: ProviderClass::Refund,
                ..
            })
        ));
        let Ok(collateral) = graph.install(ProviderKind::Collateral { inner: deal }) else {
            panic!("collateral install failed");
        };
        assert!(graph.install(ProviderKind::Refund { collateral }).is_ok());
    }

    #[test]
    fn dangling_link_is_unknown_provider() {
        let mut graph = ProviderGraph::new();
        let ghost = Address::system(PROVIDER_NAMESPACE, 42);
        assert_eq!(
            graph.install(ProviderKind::Lock { inner: ghost }),
            Err(LedgerError::UnknownProvider(ghost))
        );
    }

    #[test]
    fn fee_above_whole_is_rejected() {
        let (mut graph, deal, _, _) = base_graph();
        let schedule = FeeSchedule {
            fee_bps: 10_001,
            timing: FeeTiming::AtCreation,
            collector: Address::from_low_u64(7),
        };
        assert!(graph
            .install(ProviderKind::Fee {
                inner: deal,
                schedule
            })
            .is_err());
    }

    #[test]
    fn class_display_is_snake_case() {
        assert_eq!(ProviderClass::DelayVault.to_string(), "delay_vault");
        assert_eq!(ProviderClass::Deal.to_string(), "deal");
    }
}
