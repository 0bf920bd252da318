use config::{Config, ConfigError, File};
use serde::Deserialize;

/// One EVM chain entry in the chain table.
///
/// Every EVM chain (Ethereum, Optimism, Polygon, Base) is described by the
/// same four facts: where to reach it, which V2-style pair holds the
/// PAGE/wrapped-native liquidity, and where the PAGE contract lives. One
/// generic reader consumes this; there is no per-chain code.
#[derive(Debug, Deserialize, Clone)]
pub struct EvmChainSettings {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub pair_address: String,
    pub token_address: String,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
    /// Decimals of the wrapped-native reference asset in the pair.
    #[serde(default = "default_reference_decimals")]
    pub reference_decimals: u8,
    /// Static token-order flag. Only consulted when the live token0()/token1()
    /// read fails; a stale flag silently inverts the price, so live detection
    /// always wins when available.
    #[serde(default)]
    pub token_is_token0: Option<bool>,
}

/// Osmosis chain configuration.
///
/// Reserves come from the GAMM module over LCD REST rather than a contract
/// call. Decimal counts are protocol constants, not queried.
#[derive(Debug, Deserialize, Clone)]
pub struct OsmosisSettings {
    #[serde(default = "default_osmosis_chain_name")]
    pub chain_name: String,
    #[serde(default = "default_osmosis_name")]
    pub name: String,
    pub lcd_url: String,
    /// GAMM pool id of the PAGE/OSMO pool.
    pub pool_id: u64,
    /// IBC denom of the tracked token on Osmosis.
    pub token_denom: String,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
    #[serde(default = "default_osmo_decimals")]
    pub osmo_decimals: u8,
    /// GAMM pool id of the OSMO/USDC pool used to derive OSMO's own USD price.
    pub osmo_usdc_pool_id: u64,
    /// IBC denom of USDC on Osmosis.
    pub usdc_denom: String,
    #[serde(default = "default_usdc_decimals")]
    pub usdc_decimals: u8,
}

/// Reference-asset quote API configuration.
///
/// The fallback constants are the documented last resort when the quote API
/// is unreachable and no cached value exists; downstream pricing never
/// hard-fails on a quote outage.
#[derive(Debug, Deserialize, Clone)]
pub struct OracleSettings {
    #[serde(default = "default_quote_url")]
    pub quote_url: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_eth_fallback_price")]
    pub eth_fallback_price: f64,
    #[serde(default = "default_osmo_fallback_price")]
    pub osmo_fallback_price: f64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            eth_fallback_price: default_eth_fallback_price(),
            osmo_fallback_price: default_osmo_fallback_price(),
        }
    }
}

/// Fixed supply constants for market-cap derivation.
///
/// These are process-wide configuration, never derived from chain data.
#[derive(Debug, Deserialize, Clone)]
pub struct SupplySettings {
    #[serde(default = "default_total_supply")]
    pub total_supply: f64,
    #[serde(default = "default_circulating_supply")]
    pub circulating_supply: f64,
}

impl Default for SupplySettings {
    fn default() -> Self {
        Self {
            total_supply: default_total_supply(),
            circulating_supply: default_circulating_supply(),
        }
    }
}

/// Periodic refresh configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RefreshSettings {
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { interval_secs: default_refresh_interval_secs() }
    }
}

/// Optional holder addresses for balance tracking.
///
/// When absent, every chain reports a balance of 0.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WalletSettings {
    #[serde(default)]
    pub evm_address: Option<String>,
    #[serde(default)]
    pub osmosis_address: Option<String>,
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub evm_chains: Vec<EvmChainSettings>,
    #[serde(default)]
    pub osmosis: Option<OsmosisSettings>,
    #[serde(default)]
    pub oracle: OracleSettings,
    #[serde(default)]
    pub supply: SupplySettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub wallet: WalletSettings,
}

fn default_token_decimals() -> u8 {
    8 // PAGE
}

fn default_reference_decimals() -> u8 {
    18 // wrapped-native EVM assets
}

fn default_osmosis_chain_name() -> String {
    "osmosis-1".to_string()
}

fn default_osmosis_name() -> String {
    "Osmosis".to_string()
}

fn default_osmo_decimals() -> u8 {
    6
}

fn default_usdc_decimals() -> u8 {
    6
}

fn default_quote_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_eth_fallback_price() -> f64 {
    1800.0
}

fn default_osmo_fallback_price() -> f64 {
    0.38
}

fn default_total_supply() -> f64 {
    100_000_000.0
}

fn default_circulating_supply() -> f64 {
    42_500_000.0
}

fn default_refresh_interval_secs() -> u64 {
    60
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
