//! # Amount Parser Module
//!
//! Splits free-text expense messages such as `12.34 lunch with friends` into
//! the amount token and a description.
//!
//! ## Rules
//!
//! - The first maximal match of a signed decimal number wins
//!   (optional `-`, digits with optional `,` grouping, optional fraction)
//! - Everything after that match, trimmed, is the description, including any
//!   later numbers
//! - Description length is checked separately by [`validate_description`]

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::errors::ParseError;
use crate::money::{parse_minor_units, Currency, Money};

const AMOUNT_PATTERN: &str = r"-?\d[\d,]*(?:\.\d+)?";

lazy_static! {
    static ref AMOUNT_REGEX: Regex =
        Regex::new(AMOUNT_PATTERN).expect("Amount pattern should be valid");
}

/// Result of splitting a message into its amount and description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAmount {
    /// The matched amount text, exactly as typed (e.g. "1,234.50")
    pub amount: String,
    /// Trimmed text following the amount
    pub description: String,
}

/// An amount converted to the user's currency, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpense {
    pub amount: Money,
    pub description: String,
}

/// Locate the first amount in `text` and split off the description.
///
/// # Examples
///
/// ```
/// use expense_tracker::amount_parser::parse;
///
/// let parsed = parse("12.34 lunch with friends").unwrap();
/// assert_eq!(parsed.amount, "12.34");
/// assert_eq!(parsed.description, "lunch with friends");
/// ```
pub fn parse(text: &str) -> Result<ParsedAmount, ParseError> {
    let found = AMOUNT_REGEX.find(text).ok_or(ParseError::NoAmountFound)?;
    let description = text[found.end()..].trim().to_string();

    trace!(amount = found.as_str(), description = %description, "Parsed amount");

    Ok(ParsedAmount {
        amount: found.as_str().to_string(),
        description,
    })
}

/// Reject descriptions longer than `max_len` characters
pub fn validate_description(description: &str, max_len: usize) -> Result<(), ParseError> {
    let actual = description.chars().count();
    if actual > max_len {
        return Err(ParseError::DescriptionTooLong {
            max: max_len,
            actual,
        });
    }
    Ok(())
}

/// Full pipeline used by the bot: split, validate the description, convert to minor units
pub fn parse_expense(
    text: &str,
    currency: Currency,
    max_description_len: usize,
) -> Result<ParsedExpense, ParseError> {
    let parsed = parse(text)?;
    validate_description(&parsed.description, max_description_len)?;
    let amount = parse_minor_units(&parsed.amount, currency)?;
    Ok(ParsedExpense {
        amount,
        description: parsed.description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        let parsed = parse("12.34 lunch with friends").unwrap();
        assert_eq!(parsed.amount, "12.34");
        assert_eq!(parsed.description, "lunch with friends");
    }

    #[test]
    fn test_no_amount() {
        assert_eq!(parse("lunch with friends"), Err(ParseError::NoAmountFound));
        assert_eq!(parse(""), Err(ParseError::NoAmountFound));
    }

    #[test]
    fn test_first_match_wins() {
        let parsed = parse("coffee 4.50 and 2 cookies").unwrap();
        assert_eq!(parsed.amount, "4.50");
        assert_eq!(parsed.description, "and 2 cookies");
    }

    #[test]
    fn test_negative_and_grouped() {
        let parsed = parse("-1,234.56 refund").unwrap();
        assert_eq!(parsed.amount, "-1,234.56");
        assert_eq!(parsed.description, "refund");
    }

    #[test]
    fn test_amount_only() {
        let parsed = parse("  42  ").unwrap();
        assert_eq!(parsed.amount, "42");
        assert_eq!(parsed.description, "");
    }

    #[test]
    fn test_description_limit_counts_characters() {
        assert!(validate_description("café", 4).is_ok());
        assert_eq!(
            validate_description("abcdef", 5),
            Err(ParseError::DescriptionTooLong { max: 5, actual: 6 })
        );
    }

    #[test]
    fn test_parse_expense_converts_to_minor_units() {
        let expense = parse_expense("12.34 lunch", Currency::Sgd, 50).unwrap();
        assert_eq!(expense.amount, Money::new(1234, Currency::Sgd));
        assert_eq!(expense.description, "lunch");
    }
}
