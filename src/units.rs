//! Token amount conversion and display formatting
//!
//! On-chain amounts are integers in the token's smallest denomination
//! ("micro" units). Conversion in both directions goes through
//! `rust_decimal` so that no value is ever rounded through a float.

use crate::error::{TxError, TxResult};

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal places used by native tokens and most cw20 tokens
pub const MICRO_DECIMALS: u32 = 6;

fn scale_factor(decimals: u32) -> TxResult<Decimal> {
    10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| TxError::Build(format!("unsupported decimal places: {}", decimals)))
}

/// Parse a decimal amount, rejecting anything that is not a plain number
pub fn parse_amount(amount: &str) -> TxResult<Decimal> {
    Decimal::from_str(amount.trim())
        .map_err(|e| TxError::Build(format!("invalid amount {:?}: {}", amount, e)))
}

/// Convert a human-readable amount into an integer base-unit string.
///
/// Fails if the amount is negative or carries more fractional digits than
/// the token supports.
pub fn microfy(amount: &str, decimals: u32) -> TxResult<String> {
    let value = parse_amount(amount)?.normalize();

    if value.is_sign_negative() && !value.is_zero() {
        return Err(TxError::Build(format!("negative amount: {}", amount)));
    }
    if value.scale() > decimals {
        return Err(TxError::Build(format!(
            "amount {} has more than {} decimal places",
            amount, decimals
        )));
    }

    let base = value
        .checked_mul(scale_factor(decimals)?)
        .ok_or_else(|| TxError::Build(format!("amount too large: {}", amount)))?;

    Ok(base.normalize().to_string())
}

/// Convert a base-unit amount into a human-readable decimal
pub fn demicrofy(base: &str, decimals: u32) -> TxResult<Decimal> {
    let value = Decimal::from_str(base.trim())
        .map_err(|e| TxError::Parse(format!("invalid base-unit amount {:?}: {}", base, e)))?;

    value
        .checked_div(scale_factor(decimals)?)
        .map(|v| v.normalize())
        .ok_or_else(|| TxError::Parse(format!("cannot scale amount {}", base)))
}

/// Floor a base-unit amount to an integer string
pub fn floor_units(amount: &str) -> TxResult<String> {
    Ok(parse_amount(amount)?.floor().normalize().to_string())
}

/// Display an amount with at most `decimals` fractional digits, truncating
/// the rest, with thousands separators on the integer part.
pub fn format_output(value: Decimal, decimals: u32) -> String {
    let truncated = value
        .round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
        .normalize();
    let text = truncated.to_string();

    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let grouped = group_thousands(int_part);
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Display an amount with up to `max_decimals` digits, no grouping
pub fn format_fluid(value: Decimal, max_decimals: u32) -> String {
    value
        .round_dp_with_strategy(max_decimals, RoundingStrategy::ToZero)
        .normalize()
        .to_string()
}

/// Display a ratio as a percentage with two decimals, e.g. `0.4523` -> `45.23`
pub fn format_rate(rate: Decimal) -> TxResult<String> {
    let percent = rate
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| TxError::Parse(format!("rate out of range: {}", rate)))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok(format!("{:.2}", percent))
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microfy() {
        assert_eq!(microfy("10", 6).unwrap(), "10000000");
        assert_eq!(microfy("12.345", 6).unwrap(), "12345000");
        assert_eq!(microfy("0.000001", 6).unwrap(), "1");
        assert_eq!(microfy("1.5", 18).unwrap(), "1500000000000000000");
        assert_eq!(microfy("0", 6).unwrap(), "0");
    }

    #[test]
    fn test_microfy_rejects_bad_input() {
        assert!(microfy("-1", 6).is_err());
        assert!(microfy("abc", 6).is_err());
        assert!(microfy("0.0000001", 6).is_err());
        assert!(microfy("", 6).is_err());
    }

    #[test]
    fn test_round_trip_is_exact() {
        for amount in ["12.345", "0.1", "1000000.000001", "7"] {
            let base = microfy(amount, 6).unwrap();
            let back = demicrofy(&base, 6).unwrap();
            assert_eq!(back.to_string(), amount);
        }
    }

    #[test]
    fn test_demicrofy() {
        assert_eq!(demicrofy("9500000", 6).unwrap().to_string(), "9.5");
        assert_eq!(demicrofy("1", 6).unwrap().to_string(), "0.000001");
        assert_eq!(demicrofy("1500", 0).unwrap().to_string(), "1500");
        assert!(demicrofy("not-a-number", 6).is_err());
    }

    #[test]
    fn test_format_output() {
        let value = Decimal::from_str("1234567.1234567").unwrap();
        assert_eq!(format_output(value, 6), "1,234,567.123456");
        assert_eq!(format_output(Decimal::from_str("9.5").unwrap(), 6), "9.5");
        assert_eq!(format_output(Decimal::from(100), 6), "100");
        assert_eq!(format_output(Decimal::from_str("-1000.5").unwrap(), 2), "-1,000.5");
    }

    #[test]
    fn test_format_rate_and_fluid() {
        assert_eq!(format_rate(Decimal::from_str("0.452345").unwrap()).unwrap(), "45.23");
        assert_eq!(format_rate(Decimal::ZERO).unwrap(), "0.00");
        assert!(matches!(format_rate(Decimal::MAX), Err(TxError::Parse(_))));
        assert_eq!(
            format_fluid(Decimal::from_str("1.0123456789").unwrap(), 6),
            "1.012345"
        );
    }

    #[test]
    fn test_floor_units() {
        assert_eq!(floor_units("150000.9").unwrap(), "150000");
        assert_eq!(floor_units("42").unwrap(), "42");
    }
}
