//! Cross-chain aggregation.
//!
//! Fans a refresh out to every configured chain reader concurrently, waits
//! for all of them to settle (success or contained per-chain error), and
//! combines the snapshots into one [`AggregateTokenView`]. The only
//! top-level failures are an empty chain table and a cycle in which every
//! chain errored; anything short of that yields a view with the failures
//! visible per chain.

use anyhow::{bail, Result};
use chrono::Utc;
use log::info;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::{Settings, SupplySettings, WalletSettings};
use crate::models::{AggregateTokenView, ChainTokenSnapshot};
use crate::oracle::PriceOracle;
use crate::pricing;
use crate::reader::{ChainReader, EvmChainReader, OsmosisChainReader};

pub struct TokenAggregator {
    readers: Vec<ChainReader>,
    wallet: WalletSettings,
    total_supply: f64,
    /// Last successfully combined view.
    current: RwLock<Option<AggregateTokenView>>,
    /// Held for the duration of a refresh cycle; used to suppress
    /// overlapping refreshes.
    refresh_lock: Mutex<()>,
}

impl TokenAggregator {
    pub fn new(readers: Vec<ChainReader>, wallet: WalletSettings, supply: &SupplySettings) -> Self {
        Self {
            readers,
            wallet,
            total_supply: supply.total_supply,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Build the aggregator and all chain readers from configuration.
    pub fn from_settings(settings: &Settings, oracle: Arc<PriceOracle>) -> Result<Self> {
        let mut readers = Vec::new();

        for chain in &settings.evm_chains {
            readers.push(ChainReader::Evm(EvmChainReader::new(chain, oracle.clone())?));
        }

        if let Some(osmosis) = &settings.osmosis {
            readers.push(ChainReader::Osmosis(OsmosisChainReader::new(osmosis, oracle.clone())?));
        }

        Ok(Self::new(readers, settings.wallet.clone(), &settings.supply))
    }

    pub fn chain_count(&self) -> usize {
        self.readers.len()
    }

    /// Latest stored view, without any network activity.
    pub async fn current_view(&self) -> Option<AggregateTokenView> {
        self.current.read().await.clone()
    }

    /// Run one full read-and-aggregate cycle and return the new view.
    ///
    /// All chain reads are dispatched concurrently and the cycle waits for
    /// every branch to settle; a single chain's failure never aborts the
    /// others. If a refresh is already in flight, this call does not launch
    /// a duplicate fan-out: it waits for the running cycle and returns that
    /// cycle's view.
    pub async fn refresh(&self) -> Result<AggregateTokenView> {
        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let _running = self.refresh_lock.lock().await;
                if let Some(view) = self.current_view().await {
                    return Ok(view);
                }
                bail!("In-flight refresh produced no usable view");
            },
        };

        let reads = self.readers.iter().map(|reader| reader.snapshot(&self.wallet));
        let snapshots = futures::future::join_all(reads).await;

        let view = combine(snapshots, self.total_supply)?;

        info!(
            "Refresh complete: price {}, TVL {}, {}/{} chains healthy",
            view.weighted_price_usd
                .map_or_else(|| "n/a".to_string(), |p| format!("${p:.4}")),
            view.total_tvl_usd
                .map_or_else(|| "n/a".to_string(), |t| format!("${t:.0}")),
            view.healthy_chains(),
            view.chains.len(),
        );

        *self.current.write().await = Some(view.clone());
        Ok(view)
    }
}

/// Combine settled chain snapshots into one aggregate view.
///
/// Errors only when aggregation itself is impossible: no chains, or every
/// chain failed. Everything else degrades per chain.
pub fn combine(
    snapshots: Vec<ChainTokenSnapshot>,
    total_supply: f64,
) -> Result<AggregateTokenView> {
    if snapshots.is_empty() {
        bail!("No chains configured");
    }

    if snapshots.iter().all(|s| s.is_failed()) {
        let failures = snapshots
            .iter()
            .map(|s| format!("{}: {}", s.name, s.error.as_deref().unwrap_or("unknown error")))
            .collect::<Vec<_>>()
            .join("; ");
        bail!("All {} chains failed: {}", snapshots.len(), failures);
    }

    let weighted_price_usd = pricing::weighted_average_price(snapshots.iter());
    let total_tvl_usd = pricing::total_tvl_usd(snapshots.iter());
    let total_balance = snapshots.iter().map(|s| s.balance).sum();
    let market_cap_usd = pricing::market_cap_usd(weighted_price_usd, total_supply);

    let chains: FxHashMap<_, _> =
        snapshots.into_iter().map(|s| (s.chain.clone(), s)).collect();

    Ok(AggregateTokenView {
        weighted_price_usd,
        total_tvl_usd,
        total_balance,
        market_cap_usd,
        chains,
        updated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChainKey;

    fn snapshot(
        chain_id: u64,
        price: Option<f64>,
        tvl: Option<f64>,
        balance: f64,
    ) -> ChainTokenSnapshot {
        ChainTokenSnapshot::new(
            ChainKey::Evm(chain_id),
            format!("chain-{chain_id}"),
            price,
            tvl,
            balance,
        )
    }

    fn failed(chain_id: u64) -> ChainTokenSnapshot {
        ChainTokenSnapshot::failed(
            ChainKey::Evm(chain_id),
            format!("chain-{chain_id}"),
            "getReserves timed out".to_string(),
        )
    }

    #[test]
    fn test_combine_rejects_empty_chain_set() {
        assert!(combine(Vec::new(), 100_000_000.0).is_err());
    }

    #[test]
    fn test_combine_rejects_all_failed() {
        let err = combine(vec![failed(1), failed(10)], 100_000_000.0).unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("All 2 chains failed"));
        assert!(message.contains("chain-1"));
    }

    #[test]
    fn test_one_failed_chain_leaves_others_intact() {
        let view = combine(
            vec![snapshot(1, Some(100.0), Some(200_000.0), 10.0), failed(10)],
            100_000_000.0,
        )
        .unwrap();

        assert_eq!(view.weighted_price_usd, Some(100.0));
        assert_eq!(view.total_tvl_usd, Some(200_000.0));
        assert_eq!(view.healthy_chains(), 1);
        assert_eq!(view.failed_chains(), 1);

        let failed_snapshot = &view.chains[&ChainKey::Evm(10)];
        assert!(failed_snapshot.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(failed_snapshot.price_usd, None);
    }

    #[test]
    fn test_combine_aggregates_across_chains() {
        let view = combine(
            vec![
                snapshot(1, Some(100.0), Some(200_000.0), 12.5),
                snapshot(8453, Some(0.25), Some(4.0), 7.5),
            ],
            100_000_000.0,
        )
        .unwrap();

        let expected_price = (100.0 * 200_000.0 + 0.25 * 4.0) / (200_000.0 + 4.0);
        let weighted = view.weighted_price_usd.unwrap();
        assert!((weighted - expected_price).abs() < 1e-9);
        assert_eq!(view.total_tvl_usd, Some(200_004.0));
        assert_eq!(view.total_balance, 20.0);
        assert_eq!(view.market_cap_usd, Some(weighted * 100_000_000.0));
    }

    #[test]
    fn test_combine_with_no_usable_tvl_has_no_price_or_cap() {
        // Chains responded but produced no pool data; this is not the same
        // as a zero price, and market cap must follow the price to None.
        let view = combine(
            vec![snapshot(1, None, None, 3.0), snapshot(10, None, None, 0.0)],
            100_000_000.0,
        )
        .unwrap();

        assert_eq!(view.weighted_price_usd, None);
        assert_eq!(view.total_tvl_usd, None);
        assert_eq!(view.market_cap_usd, None);
        assert_eq!(view.total_balance, 3.0);
    }

    #[tokio::test]
    async fn test_refresh_with_no_readers_is_a_top_level_error() {
        let aggregator = TokenAggregator::new(
            Vec::new(),
            WalletSettings::default(),
            &SupplySettings::default(),
        );

        assert!(aggregator.refresh().await.is_err());
        assert!(aggregator.current_view().await.is_none());
    }
}
