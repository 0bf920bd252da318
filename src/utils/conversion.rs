//! Type conversion utilities.
//!
//! Functions for converting raw on-chain integer amounts (U256 reserves,
//! LCD string amounts) to decimal-adjusted f64 values with proper decimal
//! handling and precision preservation.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::str::FromStr;

// ============================================
// U256 Conversions
// ============================================

/// Convert U256 to f64 with decimal adjustment using BigDecimal for precision.
///
/// This function uses BigDecimal for precise conversion of large U256 values,
/// avoiding precision loss that occurs when directly converting to f64.
///
/// # Arguments
/// * `value` - The U256 value to convert
/// * `decimals` - The number of decimal places to adjust by
///
/// # Returns
/// * The adjusted f64 value, or 0.0 if conversion fails
///
/// # Example
/// ```ignore
/// let value = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let adjusted = u256_to_f64(value, 18); // Returns 1.0
/// ```
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// Convert U256 to f64 with decimal adjustment, returning Option for error handling.
///
/// Uses BigDecimal for precise conversion of large U256 values.
/// Returns None if the value cannot be converted to a valid f64.
pub fn u256_to_f64_safe(value: U256, decimals: u8) -> Option<f64> {
    // Convert U256 to BigDecimal via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);
    let big_value = BigDecimal::from(big_int);

    // Apply decimal adjustment
    let adjusted = big_value / big_pow10(decimals);

    // Convert to f64
    let result = adjusted.to_f64()?;

    // Validate result is finite
    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

// ============================================
// String to f64 Conversions
// ============================================

/// Parse a string representation of an integer amount to f64 with decimal adjustment.
///
/// Uses BigDecimal for precise conversion. Cosmos LCD endpoints return all
/// token amounts as decimal strings, so this is the decode path for every
/// reserve and balance read from Osmosis.
///
/// # Arguments
/// * `value_str` - The string representation of the raw amount
/// * `decimals` - The number of decimal places to adjust by
///
/// # Returns
/// * `Some(f64)` if parsing succeeds and value is valid, `None` otherwise
pub fn amount_str_to_f64(value_str: &str, decimals: u8) -> Option<f64> {
    let big_value = BigDecimal::from_str(value_str).ok()?;

    let adjusted = big_value / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() && result >= 0.0 {
        Some(result)
    } else {
        None
    }
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_decimal_scaling() {
        assert_eq!(u256_to_f64(U256::from(1_000_000_000_000_000_000u128), 18), 1.0);
        assert_eq!(u256_to_f64(U256::from(100_000_000u64), 8), 1.0);
        assert_eq!(u256_to_f64(U256::from(1_500_000u64), 6), 1.5);
        assert_eq!(u256_to_f64(U256::ZERO, 18), 0.0);
    }

    #[test]
    fn test_amount_str_decimal_scaling() {
        assert_eq!(amount_str_to_f64("4000000", 6), Some(4.0));
        assert_eq!(amount_str_to_f64("800000000", 8), Some(8.0));
        assert_eq!(amount_str_to_f64("0", 6), Some(0.0));
        assert_eq!(amount_str_to_f64("not a number", 6), None);
        assert_eq!(amount_str_to_f64("-5", 6), None);
    }

    #[test]
    fn test_decimal_round_trip() {
        // Scaling a raw integer down and back up recovers the original value
        // for each decimal count used across the configured chains.
        for &(raw, decimals) in
            &[(1_500_000u128, 6u8), (800_000_000, 8), (50_000_000_000_000_000_000, 18)]
        {
            let adjusted = u256_to_f64(U256::from(raw), decimals);
            let recovered = (adjusted * 10f64.powi(decimals as i32)).round() as u128;
            assert_eq!(recovered, raw, "round trip failed for decimals={decimals}");
        }
    }

    #[test]
    fn test_large_values_do_not_lose_magnitude() {
        // 2^112 - 1 is the largest possible V2 reserve slot.
        let max_reserve = (U256::from(1u8) << 112) - U256::from(1u8);
        let adjusted = u256_to_f64(max_reserve, 18);
        assert!(adjusted.is_finite());
        assert!(adjusted > 1e15);
    }
}
