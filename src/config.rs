//! Ledger configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparsable values fall back
//! to the defaults of [`LedgerConfig::default`].
//!
//! | Key                          | Default                                        |
//! |------------------------------|------------------------------------------------|
//! | `LEDGER_MAX_POOLS_PER_TX`    | `50`                                           |
//! | `LEDGER_EVENT_BUS_CAPACITY`  | `10000`                                        |
//! | `LEDGER_AUDIT_SOLVENCY`      | `true`                                         |
//! | `LEDGER_FEE_BPS`             | `100`                                          |
//! | `LEDGER_FEE_TIMING`          | `settlement` (or `creation`)                   |
//! | `LEDGER_DELAY_TIERS`         | `1000:0:0,10000:604800:0,100000:604800:2592000` |
//! | `LEDGER_LOG_JSON`            | `false`                                        |

use crate::error::LedgerError;
use crate::math::Amount;
use crate::providers::FeeTiming;

const DEFAULT_DELAY_TIERS: &str = "1000:0:0,10000:604800:0,100000:604800:2592000";

/// One configured delay-vault tier, before providers are bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSpec {
    /// Highest cumulative deposit mapped to the tier.
    pub limit: Amount,
    /// Seconds from settlement to the schedule start.
    pub start_delay: u64,
    /// Seconds from settlement to the schedule finish (`0` for no vesting).
    pub finish_delay: u64,
}

/// Top-level ledger configuration.
///
/// Loaded once at startup via [`LedgerConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Cap on pools touched by one batch call.
    pub max_pools_per_tx: usize,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Audit custody against commitments on every commit.
    pub audit_solvency: bool,

    /// Fee of the standard fee decorators, in basis points.
    pub fee_bps: u32,

    /// When the standard fee decorators skim.
    pub fee_timing: FeeTiming,

    /// Delay-vault tier table.
    pub delay_tiers: Vec<TierSpec>,

    /// Emit JSON log lines instead of the compact format.
    pub log_json: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_pools_per_tx: 50,
            event_bus_capacity: 10_000,
            audit_solvency: true,
            fee_bps: 100,
            fee_timing: FeeTiming::AtFirstSettlement,
            delay_tiers: parse_tiers(DEFAULT_DELAY_TIERS).unwrap_or_default(),
            log_json: false,
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTierTable`] if `LEDGER_DELAY_TIERS` is
    /// set but malformed.
    pub fn from_env() -> Result<Self, LedgerError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LedgerError> {
        let defaults = Self::default();

        let delay_tiers = match lookup("LEDGER_DELAY_TIERS") {
            Some(raw) => parse_tiers(&raw)?,
            None => defaults.delay_tiers,
        };

        let fee_timing = match lookup("LEDGER_FEE_TIMING").as_deref() {
            Some("creation") => FeeTiming::AtCreation,
            Some("settlement") => FeeTiming::AtFirstSettlement,
            _ => defaults.fee_timing,
        };

        Ok(Self {
            max_pools_per_tx: parse_value(&lookup, "LEDGER_MAX_POOLS_PER_TX", defaults.max_pools_per_tx),
            event_bus_capacity: parse_value(
                &lookup,
                "LEDGER_EVENT_BUS_CAPACITY",
                defaults.event_bus_capacity,
            ),
            audit_solvency: parse_bool(&lookup, "LEDGER_AUDIT_SOLVENCY", defaults.audit_solvency),
            fee_bps: parse_value(&lookup, "LEDGER_FEE_BPS", defaults.fee_bps),
            fee_timing,
            delay_tiers,
            log_json: parse_bool(&lookup, "LEDGER_LOG_JSON", defaults.log_json),
        })
    }
}

/// Parses `limit:startDelay:finishDelay` entries separated by commas.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidTierTable`] for a malformed entry, an
/// empty table, or limits that are not strictly ascending.
pub fn parse_tiers(raw: &str) -> Result<Vec<TierSpec>, LedgerError> {
    let tiers = raw
        .split(',')
        .map(|entry| {
            let fields: Vec<&str> = entry.trim().split(':').collect();
            let [limit, start, finish] = fields.as_slice() else {
                return Err(LedgerError::InvalidTierTable);
            };
            Ok(TierSpec {
                limit: limit.parse().map_err(|_| LedgerError::InvalidTierTable)?,
                start_delay: start.parse().map_err(|_| LedgerError::InvalidTierTable)?,
                finish_delay: finish.parse().map_err(|_| LedgerError::InvalidTierTable)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let ascending = tiers.windows(2).all(|pair| match pair {
        [lower, upper] => lower.limit < upper.limit,
        _ => true,
    });
    if tiers.is_empty() || !ascending {
        return Err(LedgerError::InvalidTierTable);
    }
    Ok(tiers)
}

/// Parses a value as `T`, returning `default` on missing or invalid values.
fn parse_value<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parses a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
