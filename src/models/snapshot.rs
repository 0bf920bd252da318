use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ChainKey;

/// Decimal-adjusted reserve pair for one liquidity pool.
///
/// Both sides have already been scaled by their own declared decimal count.
/// The tracked token and the reference asset use different counts; mixing
/// them corrupts the price by orders of magnitude. All pricing arithmetic
/// operates on this shape regardless of which chain family produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolReserves {
    /// Tracked token side of the pool, in whole-token units.
    pub token_reserve: f64,
    /// Reference asset side of the pool (ETH/OSMO), in whole-token units.
    pub reference_reserve: f64,
}

/// Per-chain derived result for one refresh cycle.
///
/// Recomputed fresh every cycle; never persisted. A chain whose pipeline
/// failed carries its error string with null price/TVL. A missing value is
/// never reported as a zero, because a zero-price chain would poison the
/// TVL-weighted average while a missing one simply carries no weight.
#[derive(Debug, Clone, Serialize)]
pub struct ChainTokenSnapshot {
    pub chain: ChainKey,
    pub name: String,

    /// USD price of the tracked token on this chain, if derivable.
    pub price_usd: Option<f64>,
    /// USD value of both sides of the pool, if derivable.
    pub tvl_usd: Option<f64>,
    /// Holder balance in whole-token units; 0 when no address configured.
    pub balance: f64,

    pub updated_at: DateTime<Utc>,

    /// Set when any step of this chain's pipeline failed.
    pub error: Option<String>,
}

impl ChainTokenSnapshot {
    pub fn new(
        chain: ChainKey,
        name: String,
        price_usd: Option<f64>,
        tvl_usd: Option<f64>,
        balance: f64,
    ) -> Self {
        Self {
            chain,
            name,
            price_usd,
            tvl_usd,
            balance,
            updated_at: Utc::now(),
            error: None,
        }
    }

    /// Snapshot for a chain whose read pipeline failed.
    ///
    /// One chain's failure never blocks or nulls out other chains; it is
    /// contained here and surfaced through the per-chain map.
    pub fn failed(chain: ChainKey, name: String, error: String) -> Self {
        Self {
            chain,
            name,
            price_usd: None,
            tvl_usd: None,
            balance: 0.0,
            updated_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
