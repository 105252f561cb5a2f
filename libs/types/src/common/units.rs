//! Conversion between raw token units and human-readable decimals
//!
//! Amounts stay `U256` everywhere in the engine; these helpers exist for
//! logs, events and reports only.

use ethers::types::U256;
use ethers::utils::format_units;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Format a raw amount with the token's decimals, e.g. `1500000` @ 6 → `"1.500000"`
pub fn format_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, u32::from(decimals)).unwrap_or_else(|_| amount.to_string())
}

/// Convert a raw amount into a `Decimal`
///
/// Returns `None` when the value does not fit the 96-bit mantissa of `Decimal`.
pub fn to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    let formatted = format_units(amount, u32::from(decimals)).ok()?;
    Decimal::from_str(&formatted).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(U256::from(1_500_000u64), 6), "1.500000");
        let one_and_half = U256::exp10(18) + U256::exp10(17) * 5;
        assert_eq!(
            format_amount(one_and_half, 18),
            "1.500000000000000000"
        );
    }

    #[test]
    fn test_to_decimal() {
        let profit = U256::from(1_500_000_000_000_000u64);
        assert_eq!(to_decimal(profit, 18), Some(dec!(0.0015)));
        assert_eq!(to_decimal(U256::MAX, 0), None);
    }
}
