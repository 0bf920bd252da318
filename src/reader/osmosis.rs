//! Osmosis chain reader.
//!
//! Reserves come from the GAMM module over the chain's LCD REST interface
//! instead of a contract call; balances from the bank module. OSMO's own
//! USD price is derived canonically from the on-chain OSMO/USDC pool with
//! the same reserve-ratio math used everywhere else, with the quote API as
//! the fallback path when that pool read fails.

use anyhow::{bail, Context, Result};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::OsmosisSettings;
use crate::models::{ChainKey, ChainTokenSnapshot, PoolReserves};
use crate::oracle::{PriceOracle, ReferenceAsset};
use crate::pricing;
use crate::reader::ReaderError;
use crate::utils::amount_str_to_f64;

/// OSMO's bank denom; a protocol constant, like its 6 decimals.
const OSMO_DENOM: &str = "uosmo";

/// Timeout for LCD requests; converts a hung endpoint into a per-chain error
const LCD_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

// ============================================
// LCD Response Models
// ============================================
//
// Explicit serde shapes for the two consumed endpoints. Decoding fails
// loudly on a shape change instead of trusting structure.

#[derive(Debug, Deserialize)]
struct PoolResponse {
    pool: GammPool,
}

#[derive(Debug, Deserialize)]
struct GammPool {
    #[serde(default)]
    pool_assets: Vec<PoolAsset>,
}

#[derive(Debug, Deserialize)]
struct PoolAsset {
    token: Coin,
}

#[derive(Debug, Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Coin,
}

pub struct OsmosisChainReader {
    chain_name: String,
    name: String,
    http: reqwest::Client,
    lcd_url: String,
    pool_id: u64,
    token_denom: String,
    token_decimals: u8,
    osmo_decimals: u8,
    osmo_usdc_pool_id: u64,
    usdc_denom: String,
    usdc_decimals: u8,
    oracle: Arc<PriceOracle>,
}

impl OsmosisChainReader {
    pub fn new(settings: &OsmosisSettings, oracle: Arc<PriceOracle>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(LCD_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build LCD HTTP client")?;

        Ok(Self {
            chain_name: settings.chain_name.clone(),
            name: settings.name.clone(),
            http,
            lcd_url: settings.lcd_url.trim_end_matches('/').to_string(),
            pool_id: settings.pool_id,
            token_denom: settings.token_denom.clone(),
            token_decimals: settings.token_decimals,
            osmo_decimals: settings.osmo_decimals,
            osmo_usdc_pool_id: settings.osmo_usdc_pool_id,
            usdc_denom: settings.usdc_denom.clone(),
            usdc_decimals: settings.usdc_decimals,
            oracle,
        })
    }

    pub fn key(&self) -> ChainKey {
        ChainKey::Cosmos(self.chain_name.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce this chain's snapshot. Never fails outward: any error in the
    /// pipeline is contained in the snapshot's error slot.
    pub async fn snapshot(&self, holder: Option<&str>) -> ChainTokenSnapshot {
        match self.read(holder).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{}: chain read failed: {:#}", self.name, e);
                ChainTokenSnapshot::failed(self.key(), self.name.clone(), format!("{e:#}"))
            },
        }
    }

    async fn read(&self, holder: Option<&str>) -> Result<ChainTokenSnapshot> {
        let osmo_price = self.osmo_price_usd().await;

        let pool = self.fetch_pool(self.pool_id).await?;
        let reserves = extract_reserves(
            &pool,
            &self.token_denom,
            self.token_decimals,
            OSMO_DENOM,
            self.osmo_decimals,
        )?;

        let price_usd = pricing::spot_price_usd(&reserves, osmo_price);
        let tvl_usd =
            price_usd.and_then(|price| pricing::pool_tvl_usd(&reserves, osmo_price, price));

        let balance = match holder {
            Some(address) => self.fetch_balance(address).await?,
            None => 0.0,
        };

        Ok(ChainTokenSnapshot::new(self.key(), self.name.clone(), price_usd, tvl_usd, balance))
    }

    /// OSMO's USD price: on-chain OSMO/USDC pool first, quote API second.
    async fn osmo_price_usd(&self) -> f64 {
        match self.read_osmo_pool_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    "{}: OSMO/USDC pool price unavailable, falling back to quote API: {:#}",
                    self.name, e
                );
                self.oracle.usd_price(ReferenceAsset::Osmo).await
            },
        }
    }

    async fn read_osmo_pool_price(&self) -> Result<f64> {
        let pool = self.fetch_pool(self.osmo_usdc_pool_id).await?;

        // OSMO takes the tracked slot here, USDC at $1.00 the reference:
        // the same ratio function prices both PAGE and OSMO itself.
        let reserves = extract_reserves(
            &pool,
            OSMO_DENOM,
            self.osmo_decimals,
            &self.usdc_denom,
            self.usdc_decimals,
        )?;

        pricing::spot_price_usd(&reserves, 1.0)
            .context("OSMO/USDC pool produced no usable price")
    }

    async fn fetch_pool(&self, pool_id: u64) -> Result<GammPool> {
        let url = format!("{}/osmosis/gamm/v1beta1/pools/{}", self.lcd_url, pool_id);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("LCD request for pool {pool_id} failed"))?;

        if !response.status().is_success() {
            bail!("LCD returned {} for pool {}", response.status(), pool_id);
        }

        let body: PoolResponse = response
            .json()
            .await
            .with_context(|| format!("Malformed LCD response for pool {pool_id}"))?;

        Ok(body.pool)
    }

    async fn fetch_balance(&self, holder: &str) -> Result<f64> {
        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
            self.lcd_url, holder, self.token_denom
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("LCD balance request failed")?;

        if !response.status().is_success() {
            bail!("LCD returned {} for balance query", response.status());
        }

        let body: BalanceResponse =
            response.json().await.context("Malformed LCD balance response")?;

        amount_str_to_f64(&body.balance.amount, self.token_decimals)
            .with_context(|| format!("Unparseable balance amount {:?}", body.balance.amount))
    }
}

/// Pick the tracked and reference sides out of a two-asset GAMM pool by
/// denom, decimal-adjusting each side with its own decimal count.
fn extract_reserves(
    pool: &GammPool,
    tracked_denom: &str,
    tracked_decimals: u8,
    reference_denom: &str,
    reference_decimals: u8,
) -> Result<PoolReserves> {
    if pool.pool_assets.len() != 2 {
        return Err(ReaderError::InvalidPoolStructure(pool.pool_assets.len()).into());
    }

    let asset = |denom: &str| pool.pool_assets.iter().find(|a| a.token.denom == denom);

    let tracked = asset(tracked_denom)
        .ok_or_else(|| ReaderError::TokenNotFoundInPool(tracked_denom.to_string()))?;
    let reference = asset(reference_denom)
        .ok_or_else(|| ReaderError::TokenNotFoundInPool(reference_denom.to_string()))?;

    let token_reserve = amount_str_to_f64(&tracked.token.amount, tracked_decimals)
        .with_context(|| format!("Unparseable pool amount for {tracked_denom}"))?;
    let reference_reserve = amount_str_to_f64(&reference.token.amount, reference_decimals)
        .with_context(|| format!("Unparseable pool amount for {reference_denom}"))?;

    Ok(PoolReserves { token_reserve, reference_reserve })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_DENOM: &str =
        "ibc/23A62409E4AD8133116C249B1FA38EED30E500A115D7B153109462CD82C1CD99";

    fn gamm_pool(assets: &[(&str, &str)]) -> GammPool {
        GammPool {
            pool_assets: assets
                .iter()
                .map(|(denom, amount)| PoolAsset {
                    token: Coin { denom: denom.to_string(), amount: amount.to_string() },
                })
                .collect(),
        }
    }

    #[test]
    fn test_decode_lcd_pool_response() {
        let raw = r#"{
            "pool": {
                "@type": "/osmosis.gamm.v1beta1.Pool",
                "id": "862",
                "pool_assets": [
                    {
                        "token": {
                            "denom": "ibc/23A62409E4AD8133116C249B1FA38EED30E500A115D7B153109462CD82C1CD99",
                            "amount": "800000000"
                        },
                        "weight": "536870912000000"
                    },
                    {
                        "token": { "denom": "uosmo", "amount": "4000000" },
                        "weight": "536870912000000"
                    }
                ]
            }
        }"#;

        let decoded: PoolResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.pool.pool_assets.len(), 2);
        assert_eq!(decoded.pool.pool_assets[1].token.denom, "uosmo");
        assert_eq!(decoded.pool.pool_assets[1].token.amount, "4000000");
    }

    #[test]
    fn test_decode_lcd_balance_response() {
        let raw = r#"{ "balance": { "denom": "uosmo", "amount": "2500000" } }"#;
        let decoded: BalanceResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.balance.amount, "2500000");
    }

    #[test]
    fn test_extract_reserves_applies_per_asset_decimals() {
        // 800000000 at 8 decimals -> 8.0 PAGE; 4000000 at 6 decimals -> 4.0 OSMO.
        let pool = gamm_pool(&[(PAGE_DENOM, "800000000"), ("uosmo", "4000000")]);
        let reserves = extract_reserves(&pool, PAGE_DENOM, 8, "uosmo", 6).unwrap();

        assert_eq!(reserves.token_reserve, 8.0);
        assert_eq!(reserves.reference_reserve, 4.0);

        // Spot-check the full scenario: OSMO at $0.50 -> $0.25 per PAGE.
        assert_eq!(pricing::spot_price_usd(&reserves, 0.50), Some(0.25));
    }

    #[test]
    fn test_extract_reserves_rejects_wrong_asset_count() {
        let pool = gamm_pool(&[
            (PAGE_DENOM, "800000000"),
            ("uosmo", "4000000"),
            ("uion", "1000"),
        ]);
        let err = extract_reserves(&pool, PAGE_DENOM, 8, "uosmo", 6).unwrap_err();

        match err.downcast_ref::<ReaderError>() {
            Some(ReaderError::InvalidPoolStructure(count)) => assert_eq!(*count, 3),
            other => panic!("expected InvalidPoolStructure, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_reserves_rejects_missing_denom() {
        let pool = gamm_pool(&[("uion", "800000000"), ("uosmo", "4000000")]);
        let err = extract_reserves(&pool, PAGE_DENOM, 8, "uosmo", 6).unwrap_err();

        match err.downcast_ref::<ReaderError>() {
            Some(ReaderError::TokenNotFoundInPool(denom)) => assert_eq!(denom, PAGE_DENOM),
            other => panic!("expected TokenNotFoundInPool, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_reserves_rejects_garbage_amount() {
        let pool = gamm_pool(&[(PAGE_DENOM, "not-a-number"), ("uosmo", "4000000")]);
        assert!(extract_reserves(&pool, PAGE_DENOM, 8, "uosmo", 6).is_err());
    }
}
