//! Reference-asset USD price oracle.
//!
//! Supplies the USD price of the reference asset each pool is quoted
//! against: ETH for the EVM chains, and OSMO as a fallback path for
//! Osmosis (the canonical OSMO price comes from the on-chain OSMO/USDC
//! pool in the Osmosis reader).
//!
//! Callers never receive an error from this adapter. The resolution order
//! for a quote is: fresh cache entry (age < TTL), network fetch, stale
//! cache entry, configured fallback constant. Concurrent requests for the
//! same asset coalesce onto one underlying fetch.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::OracleSettings;

/// A reference asset whose USD price anchors pool pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceAsset {
    Eth,
    Osmo,
}

impl ReferenceAsset {
    /// Identifier used by the quote API.
    pub fn quote_id(&self) -> &'static str {
        match self {
            ReferenceAsset::Eth => "ethereum",
            ReferenceAsset::Osmo => "osmosis",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ReferenceAsset::Eth => "ETH",
            ReferenceAsset::Osmo => "OSMO",
        }
    }
}

/// Source of raw USD quotes, injectable so tests run without a network.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_usd(&self, asset: ReferenceAsset) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

/// Production quote source hitting a CoinGecko-shaped simple-price endpoint.
///
/// Response shape: `{ "<id>": { "usd": <number> } }`. Network errors,
/// non-2xx statuses, and missing/unparseable fields are all reported the
/// same way; the oracle's fallback policy treats them identically.
pub struct HttpQuoteSource {
    http: reqwest::Client,
    quote_url: String,
}

impl HttpQuoteSource {
    pub fn new(settings: &OracleSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build quote API HTTP client")?;

        Ok(Self { http, quote_url: settings.quote_url.clone() })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_usd(&self, asset: ReferenceAsset) -> Result<f64> {
        let url =
            format!("{}?ids={}&vs_currencies=usd", self.quote_url, asset.quote_id());

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Quote request for {} failed", asset.symbol()))?;

        if !response.status().is_success() {
            bail!("Quote API returned {} for {}", response.status(), asset.symbol());
        }

        let body: HashMap<String, UsdQuote> = response
            .json()
            .await
            .with_context(|| format!("Malformed quote response for {}", asset.symbol()))?;

        let quote = body
            .get(asset.quote_id())
            .with_context(|| format!("{} missing from quote response", asset.quote_id()))?;

        if !quote.usd.is_finite() || quote.usd <= 0.0 {
            bail!("Quote API returned invalid price {} for {}", quote.usd, asset.symbol());
        }

        Ok(quote.usd)
    }
}

struct CachedQuote {
    price: f64,
    fetched_at: Instant,
}

/// Per-asset cache slot.
///
/// The cached value is kept past its TTL on purpose: an expired entry is
/// still the stale-fallback value when a refetch fails.
struct AssetSlot {
    cached: RwLock<Option<CachedQuote>>,
    fetch_lock: Mutex<()>,
    fallback_price: f64,
}

impl AssetSlot {
    fn new(fallback_price: f64) -> Self {
        Self { cached: RwLock::new(None), fetch_lock: Mutex::new(()), fallback_price }
    }

    fn fresh_price(&self, ttl: Duration) -> Option<f64> {
        let guard = self.cached.read().ok()?;
        let entry = guard.as_ref()?;
        (entry.fetched_at.elapsed() < ttl).then_some(entry.price)
    }

    fn any_price(&self) -> Option<f64> {
        let guard = self.cached.read().ok()?;
        guard.as_ref().map(|entry| entry.price)
    }

    fn store(&self, price: f64) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(CachedQuote { price, fetched_at: Instant::now() });
        }
    }
}

/// Cached, fallback-guarded price oracle for the reference assets.
///
/// The cache is owned by the instance (injected per construction), so tests
/// build isolated oracles with deterministic sources instead of sharing
/// process-wide state.
pub struct PriceOracle {
    source: Arc<dyn QuoteSource>,
    ttl: Duration,
    eth: AssetSlot,
    osmo: AssetSlot,
}

impl PriceOracle {
    pub fn new(source: Arc<dyn QuoteSource>, settings: &OracleSettings) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(settings.cache_ttl_secs),
            eth: AssetSlot::new(settings.eth_fallback_price),
            osmo: AssetSlot::new(settings.osmo_fallback_price),
        }
    }

    /// Oracle backed by the production HTTP quote source.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self> {
        let source = Arc::new(HttpQuoteSource::new(settings)?);
        Ok(Self::new(source, settings))
    }

    fn slot(&self, asset: ReferenceAsset) -> &AssetSlot {
        match asset {
            ReferenceAsset::Eth => &self.eth,
            ReferenceAsset::Osmo => &self.osmo,
        }
    }

    /// Current best-effort USD price for the asset. Infallible by design.
    pub async fn usd_price(&self, asset: ReferenceAsset) -> f64 {
        let slot = self.slot(asset);

        if let Some(price) = slot.fresh_price(self.ttl) {
            return price;
        }

        // Single-flight: the first caller fetches while concurrent callers
        // queue on the lock and find a fresh cache entry once it releases.
        let _guard = slot.fetch_lock.lock().await;
        if let Some(price) = slot.fresh_price(self.ttl) {
            return price;
        }

        match self.source.fetch_usd(asset).await {
            Ok(price) => {
                slot.store(price);
                price
            },
            Err(e) => {
                if let Some(stale) = slot.any_price() {
                    warn!(
                        "{} quote fetch failed, serving stale cached price ${:.4}: {:#}",
                        asset.symbol(),
                        stale,
                        e
                    );
                    stale
                } else {
                    warn!(
                        "{} quote fetch failed with no cached value, using fallback ${:.4}: {:#}",
                        asset.symbol(),
                        slot.fallback_price,
                        e
                    );
                    slot.fallback_price
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_settings(ttl_secs: u64) -> OracleSettings {
        OracleSettings {
            cache_ttl_secs: ttl_secs,
            eth_fallback_price: 1800.0,
            osmo_fallback_price: 0.38,
            ..OracleSettings::default()
        }
    }

    /// Returns a fixed price and counts how many fetches actually happen.
    struct CountingSource {
        price: f64,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(price: f64) -> Self {
            Self { price, fetches: AtomicUsize::new(0), delay: Duration::ZERO }
        }

        fn with_delay(price: f64, delay: Duration) -> Self {
            Self { price, fetches: AtomicUsize::new(0), delay }
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for CountingSource {
        async fn fetch_usd(&self, _asset: ReferenceAsset) -> Result<f64> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.price)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl QuoteSource for FailingSource {
        async fn fetch_usd(&self, asset: ReferenceAsset) -> Result<f64> {
            bail!("Quote API returned 500 Internal Server Error for {}", asset.symbol())
        }
    }

    /// Succeeds on the first call, fails on every later one.
    struct FlakySource {
        price: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteSource for FlakySource {
        async fn fetch_usd(&self, _asset: ReferenceAsset) -> Result<f64> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(self.price)
            } else {
                bail!("connection reset")
            }
        }
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_hits_cache() {
        let source = Arc::new(CountingSource::new(2000.0));
        let oracle = PriceOracle::new(source.clone(), &test_settings(60));

        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 2000.0);
        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 2000.0);
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn test_expired_ttl_triggers_refetch() {
        let source = Arc::new(CountingSource::new(2000.0));
        // Zero TTL: every entry is immediately expired.
        let oracle = PriceOracle::new(source.clone(), &test_settings(0));

        oracle.usd_price(ReferenceAsset::Eth).await;
        oracle.usd_price(ReferenceAsset::Eth).await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_assets_are_cached_independently() {
        let source = Arc::new(CountingSource::new(1.0));
        let oracle = PriceOracle::new(source.clone(), &test_settings(60));

        oracle.usd_price(ReferenceAsset::Eth).await;
        oracle.usd_price(ReferenceAsset::Osmo).await;
        oracle.usd_price(ReferenceAsset::Eth).await;
        oracle.usd_price(ReferenceAsset::Osmo).await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce_into_one_fetch() {
        let source = Arc::new(CountingSource::with_delay(2000.0, Duration::from_millis(50)));
        let oracle = Arc::new(PriceOracle::new(source.clone(), &test_settings(60)));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let oracle = oracle.clone();
                tokio::spawn(async move { oracle.usd_price(ReferenceAsset::Eth).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 2000.0);
        }
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn test_failure_without_cache_returns_fallback() {
        let oracle = PriceOracle::new(Arc::new(FailingSource), &test_settings(60));

        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 1800.0);
        assert_eq!(oracle.usd_price(ReferenceAsset::Osmo).await, 0.38);
    }

    #[tokio::test]
    async fn test_failure_with_stale_cache_returns_stale_value() {
        let source = Arc::new(FlakySource { price: 2345.0, calls: AtomicUsize::new(0) });
        // Zero TTL so the cached value is expired by the second call.
        let oracle = PriceOracle::new(source, &test_settings(0));

        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 2345.0);
        // Refetch fails; the stale value wins over the fallback constant.
        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 2345.0);
    }

    #[tokio::test]
    async fn test_success_after_fallback_overwrites_cache() {
        struct RecoveringSource {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl QuoteSource for RecoveringSource {
            async fn fetch_usd(&self, _asset: ReferenceAsset) -> Result<f64> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    bail!("Quote API returned 500 Internal Server Error")
                }
                Ok(1999.0)
            }
        }

        let oracle = PriceOracle::new(
            Arc::new(RecoveringSource { calls: AtomicUsize::new(0) }),
            &test_settings(0),
        );

        // First call fails with nothing cached: fallback constant.
        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 1800.0);
        // Recovery replaces it, and the fresh value is what later calls see.
        assert_eq!(oracle.usd_price(ReferenceAsset::Eth).await, 1999.0);
    }
}
