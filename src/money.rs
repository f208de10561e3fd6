//! # Money Module
//!
//! Amounts are stored as signed integers in the currency's minor unit
//! (cents for SGD, whole yen for JPY). Conversion from user text goes
//! through [`Decimal`], never through floating point.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

/// Currencies a user can keep their ledger in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Sgd,
    Usd,
    Eur,
    Gbp,
    Aud,
    Myr,
    Jpy,
    Krw,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Sgd => "SGD",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Aud => "AUD",
            Currency::Myr => "MYR",
            Currency::Jpy => "JPY",
            Currency::Krw => "KRW",
        }
    }

    /// Number of digits after the decimal point in the minor unit
    pub const fn fraction_digits(self) -> u32 {
        match self {
            Currency::Jpy | Currency::Krw => 0,
            _ => 2,
        }
    }

    fn scale(self) -> i64 {
        10i64.pow(self.fraction_digits())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SGD" => Ok(Currency::Sgd),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "AUD" => Ok(Currency::Aud),
            "MYR" => Ok(Currency::Myr),
            "JPY" => Ok(Currency::Jpy),
            "KRW" => Ok(Currency::Krw),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Signed amount in minor units of `currency`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    pub minor: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Major-unit decimal string without the currency code, e.g. `12.34` or `-5`
    pub fn major_string(&self) -> String {
        let digits = self.currency.fraction_digits();
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        if digits == 0 {
            return format!("{sign}{abs}");
        }
        let scale = self.currency.scale().unsigned_abs();
        let width = digits as usize;
        format!("{sign}{}.{:0width$}", abs / scale, abs % scale)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency.code(), self.major_string())
    }
}

/// Converts a matched amount token (`-1,234.565`) into minor units.
///
/// Grouping commas are dropped. Extra fractional digits are rounded half
/// away from zero at the currency's precision.
pub fn parse_minor_units(token: &str, currency: Currency) -> Result<Money, ParseError> {
    let out_of_range = || ParseError::AmountOutOfRange(token.to_string());

    let cleaned: String = token.trim().chars().filter(|c| *c != ',').collect();
    let unsigned = cleaned.strip_prefix('-').unwrap_or(&cleaned);
    if !unsigned.starts_with(|c: char| c.is_ascii_digit())
        || !unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return Err(ParseError::NoAmountFound);
    }

    let value = Decimal::from_str(&cleaned).map_err(|_| out_of_range())?;
    let minor = value
        .round_dp_with_strategy(
            currency.fraction_digits(),
            RoundingStrategy::MidpointAwayFromZero,
        )
        .checked_mul(Decimal::from(currency.scale()))
        .and_then(|scaled| scaled.to_i64())
        .ok_or_else(out_of_range)?;

    Ok(Money::new(minor, currency))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_digit_currency() {
        assert_eq!(parse_minor_units("12.34", Currency::Sgd).unwrap().minor, 1234);
        assert_eq!(parse_minor_units("12", Currency::Sgd).unwrap().minor, 1200);
        assert_eq!(parse_minor_units("12.3", Currency::Sgd).unwrap().minor, 1230);
        assert_eq!(parse_minor_units("1,234.5", Currency::Sgd).unwrap().minor, 123450);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(parse_minor_units("0.125", Currency::Usd).unwrap().minor, 13);
        assert_eq!(parse_minor_units("0.124", Currency::Usd).unwrap().minor, 12);
        assert_eq!(parse_minor_units("-0.125", Currency::Usd).unwrap().minor, -13);
        assert_eq!(parse_minor_units("-0.124", Currency::Usd).unwrap().minor, -12);
    }

    #[test]
    fn test_zero_digit_currency() {
        assert_eq!(parse_minor_units("1500", Currency::Jpy).unwrap().minor, 1500);
        assert_eq!(parse_minor_units("1500.5", Currency::Jpy).unwrap().minor, 1501);
        assert_eq!(parse_minor_units("1500.4", Currency::Jpy).unwrap().minor, 1500);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let result = parse_minor_units("99999999999999999999", Currency::Sgd);
        assert!(matches!(result, Err(ParseError::AmountOutOfRange(_))));
    }

    #[test]
    fn test_too_many_digits_is_out_of_range() {
        let token = "9".repeat(40);
        assert!(matches!(
            parse_minor_units(&token, Currency::Sgd),
            Err(ParseError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(1234, Currency::Sgd).to_string(), "SGD 12.34");
        assert_eq!(Money::new(-5, Currency::Sgd).to_string(), "SGD -0.05");
        assert_eq!(Money::new(1500, Currency::Jpy).to_string(), "JPY 1500");
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!("sgd".parse::<Currency>().unwrap(), Currency::Sgd);
        assert!("XYZ".parse::<Currency>().is_err());
    }
}
