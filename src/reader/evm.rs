//! Generic EVM chain reader.
//!
//! Reads the PAGE/wrapped-native V2 pair on one EVM chain and derives the
//! per-chain snapshot. All four configured chains run through this one
//! implementation; only the settings differ.

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, ProviderBuilder};
use anyhow::{anyhow, Context, Result};
use log::warn;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::abis::{IERC20, IUniswapV2Pair};
use crate::config::EvmChainSettings;
use crate::models::{ChainKey, ChainTokenSnapshot, PoolReserves};
use crate::oracle::{PriceOracle, ReferenceAsset};
use crate::pricing;
use crate::reader::ReaderError;
use crate::utils::u256_to_f64;

/// Maximum retries for the reserve read
const MAX_RETRIES: u32 = 3;

/// Delay between retries (exponential backoff base)
const RETRY_DELAY_MS: u64 = 100;

/// Timeout for individual RPC calls; converts a hung provider into a
/// per-chain error instead of stalling the whole refresh cycle
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(12);

pub struct EvmChainReader {
    chain_id: u64,
    name: String,
    provider: DynProvider,
    pair_address: Address,
    token_address: Address,
    token_decimals: u8,
    reference_decimals: u8,
    /// Static token-order flag; consulted only when the live read fails.
    token_is_token0: Option<bool>,
    /// Cache of the pair's token0/token1 addresses. Pair composition is
    /// immutable, so this saves two RPC reads per cycle; the TTL bounds
    /// the entry lifetime rather than correctness.
    pair_tokens: Cache<Address, (Address, Address)>,
    oracle: Arc<PriceOracle>,
}

impl EvmChainReader {
    pub fn new(settings: &EvmChainSettings, oracle: Arc<PriceOracle>) -> Result<Self> {
        let url = Url::parse(&settings.rpc_url)
            .with_context(|| format!("Invalid RPC URL for chain {}", settings.name))?;

        let client = ProviderBuilder::new().connect_http(url);
        let provider = DynProvider::new(client);

        let pair_address: Address = settings
            .pair_address
            .parse()
            .with_context(|| format!("Invalid pair address for chain {}", settings.name))?;
        let token_address: Address = settings
            .token_address
            .parse()
            .with_context(|| format!("Invalid token address for chain {}", settings.name))?;

        if settings.token_decimals > 24 || settings.reference_decimals > 24 {
            return Err(anyhow!(
                "Unreasonable decimal count configured for chain {}",
                settings.name
            ));
        }

        let pair_tokens = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Ok(Self {
            chain_id: settings.chain_id,
            name: settings.name.clone(),
            provider,
            pair_address,
            token_address,
            token_decimals: settings.token_decimals,
            reference_decimals: settings.reference_decimals,
            token_is_token0: settings.token_is_token0,
            pair_tokens,
            oracle,
        })
    }

    pub fn key(&self) -> ChainKey {
        ChainKey::Evm(self.chain_id)
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
        // The oracle is infallible (cache -> stale -> fallback), so the ETH
        // quote never fails this chain.
        let reference_price = self.oracle.usd_price(ReferenceAsset::Eth).await;

        let (reserve0, reserve1) = self.fetch_reserves_with_retry().await?;
        let token_is_token0 = self.resolve_token_order().await?;

        let (raw_token, raw_reference) =
            if token_is_token0 { (reserve0, reserve1) } else { (reserve1, reserve0) };

        let reserves = PoolReserves {
            token_reserve: u256_to_f64(raw_token, self.token_decimals),
            reference_reserve: u256_to_f64(raw_reference, self.reference_decimals),
        };

        let price_usd = pricing::spot_price_usd(&reserves, reference_price);
        let tvl_usd =
            price_usd.and_then(|price| pricing::pool_tvl_usd(&reserves, reference_price, price));

        let balance = match holder {
            Some(address) => self.fetch_balance(address).await?,
            None => 0.0,
        };

        Ok(ChainTokenSnapshot::new(self.key(), self.name.clone(), price_usd, tvl_usd, balance))
    }

    async fn fetch_reserves_with_retry(&self) -> Result<(U256, U256)> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.fetch_reserves().await {
                Ok(reserves) => return Ok(reserves),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(attempt));
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("getReserves failed")))
    }

    async fn fetch_reserves(&self) -> Result<(U256, U256)> {
        let pair = IUniswapV2Pair::new(self.pair_address, &self.provider);

        let reserves = tokio::time::timeout(RPC_CALL_TIMEOUT, pair.getReserves().call())
            .await
            .context("getReserves timed out")?
            .context("getReserves call failed")?;

        Ok((
            U256::from(reserves.reserve0.to::<u128>()),
            U256::from(reserves.reserve1.to::<u128>()),
        ))
    }

    /// Determine whether the tracked token sits in the pair's reserve0 slot.
    ///
    /// Prefers comparing the pair's live token addresses against the tracked
    /// token; a pool redeploy with flipped ordering would make a static flag
    /// silently invert the price. The configured flag is only the fallback
    /// when the live read is unavailable.
    async fn resolve_token_order(&self) -> Result<bool> {
        match self.fetch_pair_tokens().await {
            Ok((token0, token1)) => {
                if self.token_address == token0 {
                    Ok(true)
                } else if self.token_address == token1 {
                    Ok(false)
                } else {
                    Err(ReaderError::TokenNotFoundInPool(self.token_address.to_string()).into())
                }
            },
            Err(e) => {
                warn!(
                    "{}: token0/token1 read failed, falling back to configured token order: {:#}",
                    self.name, e
                );
                self.token_is_token0
                    .ok_or_else(|| anyhow!("Token order unavailable: live read failed and no token_is_token0 configured"))
            },
        }
    }

    async fn fetch_pair_tokens(&self) -> Result<(Address, Address)> {
        if let Some(tokens) = self.pair_tokens.get(&self.pair_address).await {
            return Ok(tokens);
        }

        let pair = IUniswapV2Pair::new(self.pair_address, &self.provider);

        let token0 = tokio::time::timeout(RPC_CALL_TIMEOUT, pair.token0().call())
            .await
            .context("token0 timed out")?
            .context("token0 call failed")?;
        let token1 = tokio::time::timeout(RPC_CALL_TIMEOUT, pair.token1().call())
            .await
            .context("token1 timed out")?
            .context("token1 call failed")?;

        self.pair_tokens.insert(self.pair_address, (token0, token1)).await;

        Ok((token0, token1))
    }

    async fn fetch_balance(&self, holder: &str) -> Result<f64> {
        let address: Address = holder.parse().context("Invalid holder address")?;

        let token = IERC20::new(self.token_address, &self.provider);
        let raw = tokio::time::timeout(RPC_CALL_TIMEOUT, token.balanceOf(address).call())
            .await
            .context("balanceOf timed out")?
            .context("balanceOf call failed")?;

        Ok(u256_to_f64(raw, self.token_decimals))
    }
}
