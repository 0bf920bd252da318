//! Pool pricing arithmetic and sanity bounds.
//!
//! Every USD figure in the system comes out of this module: the reserve-ratio
//! spot price, the two-sided pool TVL, the TVL-weighted cross-chain average,
//! and the market cap derived from it. Chain readers only fetch and
//! decimal-adjust reserves; the math lives here so the EVM and Osmosis paths
//! (and the tests) share one implementation.
//!
//! The validation bounds exist to catch decimal-count mismatches, which
//! corrupt prices by orders of magnitude instead of failing loudly. A price
//! rejected here becomes `None` on the chain snapshot, never a zero.

use crate::models::{ChainTokenSnapshot, PoolReserves};

// ============================================
// Sanity Bounds
// ============================================

/// Maximum reasonable token price in USD.
/// No legitimate token costs more than $1 million per unit.
pub const MAX_TOKEN_USD_PRICE: f64 = 1e6;

/// Minimum reasonable token price in USD.
/// Anything below a trillionth of a dollar indicates a decimal error.
pub const MIN_TOKEN_USD_PRICE: f64 = 1e-12;

/// Maximum reasonable TVL in USD for a single pool.
/// $100 billion covers the largest DeFi pools with margin.
pub const MAX_TVL_USD: f64 = 1e11;

/// Maximum multiplier of the reference asset price for the tracked token.
/// The token shouldn't be worth more than 100,000x ETH/OSMO.
/// This catches inversion errors where the reserve ratio is flipped.
pub const MAX_REFERENCE_MULTIPLIER: f64 = 1e5;

/// Validate a USD price is within reasonable absolute bounds.
/// Returns Some(price) if valid, None if invalid.
#[inline]
pub fn validate_usd_price(price: f64) -> Option<f64> {
    if price.is_finite() && price >= MIN_TOKEN_USD_PRICE && price <= MAX_TOKEN_USD_PRICE {
        Some(price)
    } else {
        None
    }
}

/// Validate a USD TVL is within reasonable bounds.
/// Returns Some(tvl) if valid, None if invalid.
#[inline]
pub fn validate_usd_tvl(tvl: f64) -> Option<f64> {
    if tvl.is_finite() && tvl >= 0.0 && tvl <= MAX_TVL_USD {
        Some(tvl)
    } else {
        None
    }
}

/// Validate a token's USD price relative to the reference asset price.
///
/// This catches inversion and decimal errors where a token is calculated to
/// be worth millions of dollars due to using the wrong direction of the
/// reserve ratio or the wrong decimal count.
#[inline]
pub fn validate_usd_price_relative(token_usd: f64, reference_price_usd: f64) -> Option<f64> {
    let price = validate_usd_price(token_usd)?;

    if reference_price_usd > 0.0 {
        let multiplier = price / reference_price_usd;
        if multiplier > MAX_REFERENCE_MULTIPLIER {
            return None;
        }
    }

    Some(price)
}

// ============================================
// Pool Pricing
// ============================================

/// Compute the tracked token's USD spot price from pool reserves.
///
/// Standard constant-product ratio pricing:
///
/// ```text
/// price = reference_price_usd * reference_reserve / token_reserve
/// ```
///
/// Reserves must already be decimal-adjusted (see [`crate::utils`]). A pool
/// with an empty tracked-token side has no defined price: returns None,
/// never NaN or infinity. The result passes through both absolute and
/// relative sanity bounds.
pub fn spot_price_usd(reserves: &PoolReserves, reference_price_usd: f64) -> Option<f64> {
    if reserves.token_reserve <= 0.0 || !reserves.token_reserve.is_finite() {
        return None;
    }
    if reserves.reference_reserve < 0.0 || !reserves.reference_reserve.is_finite() {
        return None;
    }
    if reference_price_usd <= 0.0 || !reference_price_usd.is_finite() {
        return None;
    }

    let price = reference_price_usd * reserves.reference_reserve / reserves.token_reserve;
    validate_usd_price_relative(price, reference_price_usd)
}

/// Compute the pool's USD TVL as the explicit sum of both sides.
///
/// ```text
/// tvl = reference_reserve * reference_price_usd + token_reserve * token_price_usd
/// ```
///
/// For a balanced pool this equals 2x the reference side, but the two-term
/// sum stays correct for pools that drift away from 50/50.
pub fn pool_tvl_usd(
    reserves: &PoolReserves,
    reference_price_usd: f64,
    token_price_usd: f64,
) -> Option<f64> {
    if reference_price_usd <= 0.0 || token_price_usd <= 0.0 {
        return None;
    }

    let tvl = reserves.reference_reserve * reference_price_usd
        + reserves.token_reserve * token_price_usd;
    validate_usd_tvl(tvl)
}

// ============================================
// Cross-Chain Aggregation
// ============================================

/// Calculate the TVL-weighted average price across chain snapshots.
///
/// Formula: `SUM(price_i * tvl_i) / SUM(tvl_i)` over snapshots where both
/// price and TVL are present. A chain with a missing price or TVL
/// contributes zero weight; a missing value is never treated as a zero
/// price.
///
/// Returns None if no snapshot carries both values (avoids division by
/// zero). The weighted sum is commutative, so the merge order of snapshots
/// does not affect the result.
pub fn weighted_average_price<'a>(
    snapshots: impl IntoIterator<Item = &'a ChainTokenSnapshot>,
) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut total_tvl = 0.0;

    for snapshot in snapshots {
        let (Some(price), Some(tvl)) = (snapshot.price_usd, snapshot.tvl_usd) else {
            continue;
        };

        if price <= 0.0 || tvl <= 0.0 {
            continue;
        }

        weighted_sum += price * tvl;
        total_tvl += tvl;
    }

    if total_tvl <= 0.0 {
        return None;
    }

    validate_usd_price(weighted_sum / total_tvl)
}

/// Sum the TVLs of all snapshots that have one.
///
/// Returns None when every snapshot is missing its TVL: an all-unreachable
/// fleet of chains has no total, which is different from a total of zero.
pub fn total_tvl_usd<'a>(
    snapshots: impl IntoIterator<Item = &'a ChainTokenSnapshot>,
) -> Option<f64> {
    let mut total = None;

    for snapshot in snapshots {
        if let Some(tvl) = snapshot.tvl_usd {
            *total.get_or_insert(0.0) += tvl;
        }
    }

    total
}

/// Derive market cap from the weighted price and the fixed supply constant.
///
/// Supply is configuration, not derived data; the result is illustrative,
/// not authoritative.
pub fn market_cap_usd(weighted_price_usd: Option<f64>, total_supply: f64) -> Option<f64> {
    let price = weighted_price_usd?;
    let cap = price * total_supply;
    if cap.is_finite() && cap >= 0.0 {
        Some(cap)
    } else {
        None
    }
}
