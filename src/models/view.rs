use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::{ChainKey, ChainTokenSnapshot};

/// Combined cross-chain view of the tracked token.
///
/// Produced by the aggregator from all chain snapshots of one refresh
/// cycle. Weighted price and total TVL are absent (not zero) when no chain
/// produced usable data; balances always sum because they default to 0.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateTokenView {
    /// TVL-weighted average USD price across chains with usable data.
    pub weighted_price_usd: Option<f64>,
    /// Sum of all chains' pool TVLs; None when every chain's TVL is missing.
    pub total_tvl_usd: Option<f64>,
    /// Sum of holder balances across all chains, in whole-token units.
    pub total_balance: f64,
    /// weighted_price_usd x fixed total supply. Illustrative, not authoritative.
    pub market_cap_usd: Option<f64>,

    /// Per-chain snapshots for drill-down.
    pub chains: FxHashMap<ChainKey, ChainTokenSnapshot>,

    pub updated_at: DateTime<Utc>,
}

impl AggregateTokenView {
    /// Number of chains that produced a usable snapshot this cycle.
    pub fn healthy_chains(&self) -> usize {
        self.chains.values().filter(|s| !s.is_failed()).count()
    }

    /// Number of chains whose pipeline failed this cycle.
    pub fn failed_chains(&self) -> usize {
        self.chains.values().filter(|s| s.is_failed()).count()
    }
}
